//! Diagnostic test endpoints.
//!
//! - `POST /api/tests`: multipart upload {patientId, image}; classify and record
//! - `GET /api/tests/:id`: one test
//! - `GET /api/tests/patient/:patient_id`: a patient's tests, newest first
//! - `PATCH /api/tests/:id`: set or clear the comment
//! - `DELETE /api/tests/:id`: remove the test and its image

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, OperatorContext};
use crate::models::{DiagnosticTest, PredictionSet, TestPatch};
use crate::pipeline::preprocess::check_extension;
use crate::pipeline::processor::ImageUpload;
use crate::pipeline::DiagnosticError;

#[derive(Serialize)]
pub struct CreateTestResponse {
    pub test_id: Uuid,
    pub patient_id: Uuid,
    pub result: String,
    pub confidence: f64,
    pub all_predictions: PredictionSet,
}

impl From<DiagnosticTest> for CreateTestResponse {
    fn from(test: DiagnosticTest) -> Self {
        Self {
            test_id: test.id,
            patient_id: test.patient_id,
            result: test.top_label,
            confidence: test.top_confidence,
            all_predictions: test.predictions,
        }
    }
}

/// A stored test as clients see it. Server-side file paths stay private;
/// `has_report` says whether an export exists.
#[derive(Serialize)]
pub struct TestView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub operator_id: Uuid,
    pub conducted_at: NaiveDateTime,
    pub top_label: String,
    pub top_confidence: f64,
    pub predictions: PredictionSet,
    pub comment: Option<String>,
    pub has_report: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<DiagnosticTest> for TestView {
    fn from(test: DiagnosticTest) -> Self {
        Self {
            id: test.id,
            patient_id: test.patient_id,
            operator_id: test.operator_id,
            conducted_at: test.conducted_at,
            top_label: test.top_label,
            top_confidence: test.top_confidence,
            predictions: test.predictions,
            comment: test.comment,
            has_report: test.report_path.is_some(),
            created_at: test.created_at,
            updated_at: test.updated_at,
        }
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
}

async fn read_image(field: Field<'_>) -> Result<(String, Vec<u8>), ApiError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Image field has no file name".into()))?;
    // Reject by extension before buffering the body.
    check_extension(&file_name)?;
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok((file_name, bytes.to_vec()))
}

/// `POST /api/tests`: run an uploaded radiograph through the pipeline.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateTestResponse>), ApiError> {
    let mut patient_id: Option<String> = None;
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("patientId") | Some("patient_id") => {
                patient_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("image") => image = Some(read_image(field).await?),
            _ => {}
        }
    }

    let patient_id = patient_id.ok_or_else(|| ApiError::BadRequest("Missing patientId".into()))?;
    let patient_id = Uuid::parse_str(patient_id.trim())
        .map_err(|_| ApiError::BadRequest("patientId is not a valid id".into()))?;
    let (file_name, bytes) = image.ok_or_else(|| ApiError::BadRequest("Missing image".into()))?;
    if bytes.is_empty() {
        return Err(DiagnosticError::ImageDecode("empty upload".into()).into());
    }

    let requester = op.requester();
    let test = ctx
        .blocking(move |core, conn| {
            let upload = ImageUpload {
                file_name: &file_name,
                bytes: &bytes,
            };
            let now = chrono::Utc::now().naive_utc();
            Ok(core
                .processor()
                .create_test(conn, &requester, &patient_id, upload, now)?)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(test.into())))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
) -> Result<Json<TestView>, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    let test = ctx
        .blocking(move |core, conn| Ok(core.processor().get_test(conn, &id, &requester)?))
        .await?;
    Ok(Json(test.into()))
}

pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<TestView>>, ApiError> {
    let patient_id = parse_id(&patient_id)?;
    let requester = op.requester();
    let tests = ctx
        .blocking(move |core, conn| {
            Ok(core
                .processor()
                .list_tests_for_patient(conn, &patient_id, &requester)?)
        })
        .await?;
    Ok(Json(tests.into_iter().map(TestView::from).collect()))
}

/// Only the comment is client-editable; report paths are set by export.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentPatch {
    pub comment: Option<String>,
}

pub async fn patch(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(body): Json<CommentPatch>,
) -> Result<Json<TestView>, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    let patch = TestPatch {
        comment: body.comment,
        report_path: None,
    };
    let test = ctx
        .blocking(move |core, conn| {
            let now = chrono::Utc::now().naive_utc();
            Ok(core.processor().patch_test(conn, &id, &requester, patch, now)?)
        })
        .await?;
    Ok(Json(test.into()))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(op): Extension<OperatorContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let requester = op.requester();
    ctx.blocking(move |core, conn| Ok(core.processor().delete_test(conn, &id, &requester)?))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
