//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: bearer token to operator
//! 2. Audit logger: logs after auth, has the operator id

pub mod audit;
pub mod auth;
