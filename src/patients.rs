//! Patient record management, scoped to the requesting operator.
//!
//! Non-admin operators only ever see their own patients. A patient owned by
//! someone else is reported exactly like a missing one.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::{NewPatient, Patient, PatientPatch, Requester};
use crate::pipeline::DiagnosticError;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Serialize)]
pub struct PatientPage {
    pub patients: Vec<Patient>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

fn invalid(err: DatabaseError) -> DiagnosticError {
    match err {
        DatabaseError::ConstraintViolation(msg) => DiagnosticError::InvalidInput(msg),
        other => other.into(),
    }
}

/// Load a patient the requester may act on.
pub fn load_accessible_patient(
    conn: &Connection,
    id: &Uuid,
    requester: &Requester,
) -> Result<Patient, DiagnosticError> {
    match repository::get_patient(conn, id)? {
        Some(patient) if requester.can_access(&patient.operator_id) => Ok(patient),
        _ => Err(DiagnosticError::NotFoundOrForbidden),
    }
}

pub fn create_patient(
    conn: &Connection,
    requester: &Requester,
    new: NewPatient,
    now: NaiveDateTime,
) -> Result<Patient, DiagnosticError> {
    new.validate().map_err(invalid)?;
    let patient = new.into_patient(requester.operator_id, now);
    repository::insert_patient(conn, &patient)?;
    tracing::info!(patient_id = %patient.id, operator_id = %requester.operator_id, "Patient registered");
    Ok(patient)
}

pub fn list_patients(
    conn: &Connection,
    requester: &Requester,
    limit: Option<u32>,
    offset: Option<u32>,
) -> Result<PatientPage, DiagnosticError> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0);
    let owner = (!requester.is_admin).then_some(&requester.operator_id);

    let patients = repository::list_patients(conn, owner, limit, offset)?;
    let total = repository::count_patients(conn, owner)?;
    Ok(PatientPage {
        patients,
        total,
        limit,
        offset,
    })
}

pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    requester: &Requester,
    patch: PatientPatch,
    now: NaiveDateTime,
) -> Result<Patient, DiagnosticError> {
    if patch.is_empty() {
        return Err(DiagnosticError::InvalidInput("No fields to update".into()));
    }
    let mut patient = load_accessible_patient(conn, id, requester)?;
    patch.apply(&mut patient, now).map_err(invalid)?;
    repository::update_patient(conn, &patient)?;
    Ok(patient)
}
