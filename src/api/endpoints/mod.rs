//! API endpoint handlers, one module per resource.
//!
//! Handlers stay thin: parse, hand the work to `ApiContext::blocking`,
//! shape the JSON. Business rules live in `patients`, `accounts` and
//! `pipeline::processor`.

pub mod auth;
pub mod health;
pub mod operators;
pub mod patients;
pub mod reports;
pub mod tests;
