//! Login, logout and the current operator.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::accounts;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OperatorContext};
use crate::db::repository::{self, ActivityEntry};
use crate::models::Operator;

const RECENT_ACTIVITY_LIMIT: u32 = 20;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub is_admin: bool,
    pub expires_at: String,
}

/// `POST /api/login`: exchange credentials for a bearer token.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest("Username and password are required".into()));
    }

    let grant = ctx
        .blocking(move |core, conn| {
            let now = chrono::Utc::now().naive_utc();
            let grant = accounts::login(
                conn,
                &request.username,
                &request.password,
                core.session_ttl(),
                now,
            )?;
            let entry = ActivityEntry {
                timestamp: now,
                operator_id: Some(grant.operator.id),
                action: "login".into(),
                details: None,
            };
            if let Err(e) = repository::insert_activity(conn, &entry) {
                tracing::warn!(error = %e, "Failed to record login activity");
            }
            Ok(grant)
        })
        .await?;

    Ok(Json(LoginResponse {
        access_token: grant.access_token,
        token_type: "bearer",
        is_admin: grant.operator.is_admin,
        expires_at: grant.expires_at.and_utc().to_rfc3339(),
    }))
}

/// `POST /api/logout`: revoke the presented token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
) -> Result<StatusCode, ApiError> {
    let token = op.token.clone();
    ctx.blocking(move |_, conn| Ok(accounts::logout(conn, &token)?))
        .await?;
    tracing::info!(operator_id = %op.operator_id(), "Session closed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct MeResponse {
    pub operator: Operator,
    pub recent_activity: Vec<ActivityEntry>,
}

/// `GET /api/operators/me`: the authenticated operator and their latest actions.
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
) -> Result<Json<MeResponse>, ApiError> {
    let operator_id = op.operator_id();
    let recent_activity = ctx
        .blocking(move |_, conn| {
            Ok(repository::list_activity_for_operator(
                conn,
                &operator_id,
                RECENT_ACTIVITY_LIMIT,
            )?)
        })
        .await?;

    Ok(Json(MeResponse {
        operator: op.operator,
        recent_activity,
    }))
}
