//! HTTP API.
//!
//! Routes are nested under `/api/`. Everything except health and login sits
//! behind the middleware stack: Auth → Audit → Handler.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
