use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_ts, is_unique_violation, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{BloodType, Gender};
use crate::models::Patient;

const DATE_FORMAT: &str = "%Y-%m-%d";

const PATIENT_COLUMNS: &str = "id, operator_id, name, date_of_birth, gender, address, phone,
    emergency_contact, blood_type, allergies, notes, created_at, updated_at";

fn map_phone_conflict(err: rusqlite::Error, phone: &str) -> DatabaseError {
    if is_unique_violation(&err) {
        DatabaseError::ConstraintViolation(format!("Phone number already registered: {phone}"))
    } else {
        err.into()
    }
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, operator_id, name, date_of_birth, gender, address, phone,
         emergency_contact, blood_type, allergies, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            patient.id.to_string(),
            patient.operator_id.to_string(),
            patient.name,
            patient.date_of_birth.format(DATE_FORMAT).to_string(),
            patient.gender.as_str(),
            patient.address,
            patient.phone,
            patient.emergency_contact,
            patient.blood_type.map(|b| b.as_str()),
            patient.allergies,
            patient.notes,
            format_ts(&patient.created_at),
            format_ts(&patient.updated_at),
        ],
    )
    .map_err(|e| map_phone_conflict(e, &patient.phone))?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            PatientRow::from_row,
        )
        .optional()?;
    row.map(PatientRow::into_patient).transpose()
}

/// Patients ordered by name. `owner = None` lists every patient (admin view).
pub fn list_patients(
    conn: &Connection,
    owner: Option<&Uuid>,
    limit: u32,
    offset: u32,
) -> Result<Vec<Patient>, DatabaseError> {
    let owner = owner.map(|id| id.to_string());
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE (?1 IS NULL OR operator_id = ?1)
         ORDER BY name COLLATE NOCASE, created_at
         LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt
        .query_map(params![owner, limit, offset], PatientRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PatientRow::into_patient).collect()
}

pub fn count_patients(conn: &Connection, owner: Option<&Uuid>) -> Result<u64, DatabaseError> {
    let owner = owner.map(|id| id.to_string());
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE (?1 IS NULL OR operator_id = ?1)",
        params![owner],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Overwrite every mutable column of an existing patient.
pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE patients SET name = ?2, date_of_birth = ?3, gender = ?4, address = ?5,
             phone = ?6, emergency_contact = ?7, blood_type = ?8, allergies = ?9, notes = ?10,
             updated_at = ?11
             WHERE id = ?1",
            params![
                patient.id.to_string(),
                patient.name,
                patient.date_of_birth.format(DATE_FORMAT).to_string(),
                patient.gender.as_str(),
                patient.address,
                patient.phone,
                patient.emergency_contact,
                patient.blood_type.map(|b| b.as_str()),
                patient.allergies,
                patient.notes,
                format_ts(&patient.updated_at),
            ],
        )
        .map_err(|e| map_phone_conflict(e, &patient.phone))?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a patient. Their tests go with them through the foreign key cascade.
pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

struct PatientRow {
    id: String,
    operator_id: String,
    name: String,
    date_of_birth: String,
    gender: String,
    address: Option<String>,
    phone: String,
    emergency_contact: Option<String>,
    blood_type: Option<String>,
    allergies: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            operator_id: row.get(1)?,
            name: row.get(2)?,
            date_of_birth: row.get(3)?,
            gender: row.get(4)?,
            address: row.get(5)?,
            phone: row.get(6)?,
            emergency_contact: row.get(7)?,
            blood_type: row.get(8)?,
            allergies: row.get(9)?,
            notes: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_patient(self) -> Result<Patient, DatabaseError> {
        let date_of_birth = NaiveDate::parse_from_str(&self.date_of_birth, DATE_FORMAT)
            .map_err(|e| DatabaseError::InvalidValue {
                field: "patients.date_of_birth".into(),
                reason: format!("{}: {e}", self.date_of_birth),
            })?;
        Ok(Patient {
            id: parse_uuid("patients.id", &self.id)?,
            operator_id: parse_uuid("patients.operator_id", &self.operator_id)?,
            name: self.name,
            date_of_birth,
            gender: self.gender.parse::<Gender>()?,
            address: self.address,
            phone: self.phone,
            emergency_contact: self.emergency_contact,
            blood_type: self
                .blood_type
                .as_deref()
                .map(str::parse::<BloodType>)
                .transpose()?,
            allergies: self.allergies,
            notes: self.notes,
            created_at: parse_ts("patients.created_at", &self.created_at)?,
            updated_at: parse_ts("patients.updated_at", &self.updated_at)?,
        })
    }
}
