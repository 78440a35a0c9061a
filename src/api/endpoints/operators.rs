//! Operator account management.
//!
//! - `POST /api/operators`: admin-only account creation
//! - `PUT /api/operators/me`: change one's own display name

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::accounts::{self, NewOperator};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OperatorContext};
use crate::models::{Operator, OperatorPatch};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOperatorRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_admin: bool,
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Json(request): Json<CreateOperatorRequest>,
) -> Result<(StatusCode, Json<Operator>), ApiError> {
    if !op.operator.is_admin {
        tracing::warn!(operator_id = %op.operator_id(), "Non-admin tried to create an operator");
        return Err(ApiError::Forbidden("Admin access required".into()));
    }

    let new = NewOperator {
        username: request.username,
        display_name: request.display_name,
        password: request.password,
        is_admin: request.is_admin,
    };
    let operator = ctx
        .blocking(move |core, conn| {
            let now = chrono::Utc::now().naive_utc();
            let iterations = core.settings().password_iterations;
            Ok(accounts::create_operator_with(conn, new, iterations, now)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(operator)))
}

pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Json(patch): Json<OperatorPatch>,
) -> Result<Json<Operator>, ApiError> {
    let operator_id = op.operator_id();
    let operator = ctx
        .blocking(move |_, conn| {
            let now = chrono::Utc::now().naive_utc();
            Ok(accounts::update_profile(conn, &operator_id, patch, now)?)
        })
        .await?;
    Ok(Json(operator))
}
