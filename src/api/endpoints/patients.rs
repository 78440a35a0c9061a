//! Patient record endpoints.
//!
//! - `POST /api/patients`: register
//! - `GET /api/patients?limit&offset`: page through visible patients
//! - `GET /api/patients/:id`: detail
//! - `PUT /api/patients/:id`: partial update
//! - `DELETE /api/patients/:id`: delete with tests and images

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, OperatorContext};
use crate::models::{NewPatient, Patient, PatientPatch};
use crate::patients::{self, PatientPage};

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Json(new): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let requester = op.requester();
    let patient = ctx
        .blocking(move |_, conn| {
            let now = chrono::Utc::now().naive_utc();
            Ok(patients::create_patient(conn, &requester, new, now)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PatientPage>, ApiError> {
    let requester = op.requester();
    let page = ctx
        .blocking(move |_, conn| {
            Ok(patients::list_patients(conn, &requester, query.limit, query.offset)?)
        })
        .await?;
    Ok(Json(page))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    let patient = ctx
        .blocking(move |_, conn| Ok(patients::load_accessible_patient(conn, &id, &requester)?))
        .await?;
    Ok(Json(patient))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(patch): Json<PatientPatch>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    let patient = ctx
        .blocking(move |_, conn| {
            let now = chrono::Utc::now().naive_utc();
            Ok(patients::update_patient(conn, &id, &requester, patch, now)?)
        })
        .await?;
    Ok(Json(patient))
}

#[derive(Serialize)]
pub struct DeletePatientResponse {
    pub deleted: bool,
    pub images_removed: usize,
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
) -> Result<Json<DeletePatientResponse>, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    let images_removed = ctx
        .blocking(move |core, conn| {
            Ok(core.processor().delete_patient(conn, &id, &requester)?)
        })
        .await?;
    Ok(Json(DeletePatientResponse {
        deleted: true,
        images_removed,
    }))
}
