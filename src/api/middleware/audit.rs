//! Audit logging middleware.
//!
//! Logs every API request with operator id, method, path and response
//! status. Successful mutating requests also land in the activity log.
//! Runs innermost (after auth has injected `OperatorContext`).

use axum::extract::MatchedPath;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, OperatorContext};
use crate::db::repository::{self, ActivityEntry};

/// Log API access for the audit trail.
/// Accesses `ApiContext` from request extensions.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let operator_id = req
        .extensions()
        .get::<OperatorContext>()
        .map(OperatorContext::operator_id);

    let response = next.run(req).await;
    let status = response.status();

    tracing::info!(
        %method,
        path = %path,
        status = status.as_u16(),
        operator_id = operator_id.map(|id| id.to_string()).unwrap_or_default(),
        "API request"
    );

    if is_mutation(&method) && status.is_success() {
        if let Some(ctx) = ctx {
            let entry = ActivityEntry {
                timestamp: chrono::Utc::now().naive_utc(),
                operator_id,
                action: format!("{method} {route}"),
                details: Some(path),
            };
            let result = ctx
                .blocking(move |_, conn| Ok(repository::insert_activity(conn, &entry)?))
                .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to write activity log entry");
            }
        }
    }

    response
}

fn is_mutation(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
