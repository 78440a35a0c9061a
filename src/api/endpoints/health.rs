//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub classes: Vec<String>,
}

/// `GET /api/health`: liveness plus the classes the loaded model reports.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let classes = ctx.core.processor().classifier().classes().labels().to_vec();

    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        classes,
    }))
}
