//! Report endpoints.
//!
//! - `GET /api/report/download/:id`: render the PDF and stream it back
//! - `POST /api/report/export/:id`: render into the exports directory

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, OperatorContext};
use crate::pipeline::processor::report_file_name;

pub async fn download(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    // Rendered fully before anything is sent; failures never produce a partial body.
    let pdf = ctx
        .blocking(move |core, conn| {
            let now = chrono::Utc::now().naive_utc();
            Ok(core.processor().render_report(conn, &id, &requester, now)?)
        })
        .await?;

    let disposition = format!("attachment; filename={}", report_file_name(&id));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub report_path: String,
}

pub async fn export(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
) -> Result<Json<ExportResponse>, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    let path = ctx
        .blocking(move |core, conn| {
            let now = chrono::Utc::now().naive_utc();
            Ok(core
                .processor()
                .export_report(conn, &id, &requester, core.exports_dir(), now)?)
        })
        .await?;
    Ok(Json(ExportResponse {
        report_path: path.to_string_lossy().into_owned(),
    }))
}
