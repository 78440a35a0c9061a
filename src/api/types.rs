//! Shared types for the API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::{Operator, Requester};

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run synchronous pipeline or database work on the blocking pool with
    /// a connection of its own.
    pub async fn blocking<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&CoreState, &rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || {
            let conn = core.open_db()?;
            work(core.as_ref(), &conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
    }
}

// ═══════════════════════════════════════════════════════════
// Operator context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated operator, injected into request extensions by the auth
/// middleware after the bearer token resolved to a live session.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub operator: Operator,
    /// Raw bearer token, kept so logout can revoke it.
    pub token: String,
}

impl OperatorContext {
    pub fn operator_id(&self) -> Uuid {
        self.operator.id
    }

    pub fn requester(&self) -> Requester {
        Requester::from(&self.operator)
    }
}

/// Parse a path id. Malformed ids read as not found, like any other
/// record the caller cannot see.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| crate::pipeline::DiagnosticError::NotFoundOrForbidden.into())
}
