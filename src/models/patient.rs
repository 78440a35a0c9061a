use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BloodType, Gender};
use crate::db::DatabaseError;

/// E.164-style phone numbers: optional '+', no leading zero, 2 to 15 digits.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: Option<String>,
    pub phone: String,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<BloodType>,
    pub allergies: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Registration payload for a new patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: String,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<BloodType>,
    pub allergies: Option<String>,
    pub notes: Option<String>,
}

impl NewPatient {
    pub fn validate(&self) -> Result<(), DatabaseError> {
        validate_name(&self.name)?;
        validate_phone(&self.phone)?;
        Ok(())
    }

    pub fn into_patient(self, operator_id: Uuid, now: NaiveDateTime) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            operator_id,
            name: self.name.trim().to_string(),
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address,
            phone: self.phone,
            emergency_contact: self.emergency_contact,
            blood_type: self.blood_type,
            allergies: self.allergies,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a patient. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<BloodType>,
    pub allergies: Option<String>,
    pub notes: Option<String>,
}

impl PatientPatch {
    pub fn is_empty(&self) -> bool {
        let Self {
            name,
            date_of_birth,
            gender,
            phone,
            address,
            emergency_contact,
            blood_type,
            allergies,
            notes,
        } = self;
        name.is_none()
            && date_of_birth.is_none()
            && gender.is_none()
            && phone.is_none()
            && address.is_none()
            && emergency_contact.is_none()
            && blood_type.is_none()
            && allergies.is_none()
            && notes.is_none()
    }

    /// Merge present fields into `patient`. Validation runs before anything changes.
    pub fn apply(self, patient: &mut Patient, now: NaiveDateTime) -> Result<(), DatabaseError> {
        let Self {
            name,
            date_of_birth,
            gender,
            phone,
            address,
            emergency_contact,
            blood_type,
            allergies,
            notes,
        } = self;

        if let Some(n) = &name {
            validate_name(n)?;
        }
        if let Some(p) = &phone {
            validate_phone(p)?;
        }

        if let Some(n) = name {
            patient.name = n.trim().to_string();
        }
        if let Some(d) = date_of_birth {
            patient.date_of_birth = d;
        }
        if let Some(g) = gender {
            patient.gender = g;
        }
        if let Some(p) = phone {
            patient.phone = p;
        }
        if let Some(a) = address {
            patient.address = Some(a);
        }
        if let Some(e) = emergency_contact {
            patient.emergency_contact = Some(e);
        }
        if let Some(b) = blood_type {
            patient.blood_type = Some(b);
        }
        if let Some(a) = allergies {
            patient.allergies = Some(a);
        }
        if let Some(n) = notes {
            patient.notes = Some(n);
        }
        patient.updated_at = now;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), DatabaseError> {
    if name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "Patient name must not be empty".into(),
        ));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), DatabaseError> {
    if !PHONE_PATTERN.is_match(phone) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "Invalid phone number: {phone}"
        )));
    }
    Ok(())
}
