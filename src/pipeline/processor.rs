//! Diagnostic test orchestrator.
//!
//! Write path: extension check → ownership check → decode → infer →
//! aggregate → store image → insert record. Everything up to the image write
//! happens in memory, so a rejected upload leaves nothing behind. If the
//! insert fails the freshly stored image is removed again.
//!
//! Read path: load record (owner or admin) → check the stored result still
//! matches its predictions → visualization → report.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::aggregate::aggregate;
use super::classifier::Classifier;
use super::image_store::ImageStore;
use super::preprocess::{check_extension, preprocess_bytes};
use super::DiagnosticError;
use crate::db::repository;
use crate::models::{DiagnosticTest, Requester, TestPatch};
use crate::patients::load_accessible_patient;
use crate::report::{self, ReportDocument};

/// An uploaded radiograph as received from the client.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

pub struct TestProcessor {
    classifier: Arc<dyn Classifier>,
    images: ImageStore,
}

impl TestProcessor {
    pub fn new(classifier: Arc<dyn Classifier>, images: ImageStore) -> Self {
        Self { classifier, images }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Classify an upload and record it against `patient_id`.
    pub fn create_test(
        &self,
        conn: &Connection,
        requester: &Requester,
        patient_id: &Uuid,
        upload: ImageUpload<'_>,
        now: NaiveDateTime,
    ) -> Result<DiagnosticTest, DiagnosticError> {
        let ext = check_extension(upload.file_name)?;
        load_accessible_patient(conn, patient_id, requester)?;

        let tensor = preprocess_bytes(upload.bytes, self.classifier.input_spec())?;
        let predictions = self.classifier.infer(&tensor)?;
        let top = aggregate(&predictions, self.classifier.classes().len())?;

        let image_path = self.images.save(upload.bytes, &ext)?;
        let test = DiagnosticTest {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            operator_id: requester.operator_id,
            image_path: image_path.to_string_lossy().into_owned(),
            conducted_at: now,
            top_label: top.label,
            top_confidence: top.confidence,
            predictions,
            comment: None,
            report_path: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = insert_in_transaction(conn, &test) {
            self.images.discard(&image_path);
            return Err(e);
        }

        tracing::info!(
            test_id = %test.id,
            patient_id = %test.patient_id,
            result = %test.top_label,
            confidence = test.top_confidence,
            "Diagnostic test recorded"
        );
        Ok(test)
    }

    /// Delete one test and its image.
    pub fn delete_test(
        &self,
        conn: &Connection,
        id: &Uuid,
        requester: &Requester,
    ) -> Result<(), DiagnosticError> {
        let test = self.get_test(conn, id, requester)?;
        repository::delete_test(conn, &test.id)?;
        self.images.discard(Path::new(&test.image_path));
        tracing::info!(test_id = %test.id, "Diagnostic test deleted");
        Ok(())
    }

    /// Delete a patient, every test recorded for them and every backing image.
    /// Returns the number of images removed.
    pub fn delete_patient(
        &self,
        conn: &Connection,
        patient_id: &Uuid,
        requester: &Requester,
    ) -> Result<usize, DiagnosticError> {
        // Take the write lock before collecting paths so no test can be
        // recorded for this patient between the read and the cascade.
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let patient = load_accessible_patient(&tx, patient_id, requester)?;
        let paths = repository::image_paths_for_patient(&tx, &patient.id)?;
        repository::delete_patient(&tx, &patient.id)?;
        tx.commit()?;

        let mut removed = 0;
        for path in &paths {
            match self.images.remove(Path::new(path)) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(path = %path, error = %e, "Failed to remove stored image"),
            }
        }
        tracing::info!(patient_id = %patient.id, tests = paths.len(), "Patient deleted");
        Ok(removed)
    }

    /// Assemble the report for a test. Everything is regenerated from the
    /// stored record and image; nothing cached is reused.
    pub fn report_document(
        &self,
        conn: &Connection,
        id: &Uuid,
        requester: &Requester,
        generated_at: NaiveDateTime,
    ) -> Result<ReportDocument, DiagnosticError> {
        let test = self.get_test(conn, id, requester)?;
        let patient = repository::get_patient(conn, &test.patient_id)?
            .ok_or(DiagnosticError::NotFoundOrForbidden)?;
        let visualization =
            report::render_visualization(Path::new(&test.image_path), &test.predictions)?;
        Ok(ReportDocument::build(&test, &patient, visualization, generated_at))
    }

    /// Render the report PDF in memory.
    pub fn render_report(
        &self,
        conn: &Connection,
        id: &Uuid,
        requester: &Requester,
        generated_at: NaiveDateTime,
    ) -> Result<Vec<u8>, DiagnosticError> {
        let document = self.report_document(conn, id, requester, generated_at)?;
        report::render_pdf(&document)
    }

    /// Render the report into `exports_dir` and record its path on the test.
    pub fn export_report(
        &self,
        conn: &Connection,
        id: &Uuid,
        requester: &Requester,
        exports_dir: &Path,
        now: NaiveDateTime,
    ) -> Result<PathBuf, DiagnosticError> {
        let pdf = self.render_report(conn, id, requester, now)?;

        std::fs::create_dir_all(exports_dir)?;
        let target = exports_dir.join(report_file_name(id));
        let mut tmp = tempfile::NamedTempFile::new_in(exports_dir)?;
        tmp.write_all(&pdf)?;
        tmp.persist(&target).map_err(|e| e.error)?;

        let patch = TestPatch {
            comment: None,
            report_path: Some(target.to_string_lossy().into_owned()),
        };
        self.patch_test(conn, id, requester, patch, now)?;
        tracing::info!(test_id = %id, path = %target.display(), "Report exported");
        Ok(target)
    }

    /// Load a test the requester may see: they recorded it, they own the
    /// patient, or they are an admin. Anything else looks like a missing id.
    pub fn get_test(
        &self,
        conn: &Connection,
        id: &Uuid,
        requester: &Requester,
    ) -> Result<DiagnosticTest, DiagnosticError> {
        let test = repository::get_test(conn, id)?.ok_or(DiagnosticError::NotFoundOrForbidden)?;
        if !requester.can_access(&test.operator_id) {
            load_accessible_patient(conn, &test.patient_id, requester)?;
        }
        self.verify_stored(test)
    }

    /// All tests for a patient, most recent first.
    pub fn list_tests_for_patient(
        &self,
        conn: &Connection,
        patient_id: &Uuid,
        requester: &Requester,
    ) -> Result<Vec<DiagnosticTest>, DiagnosticError> {
        let patient = load_accessible_patient(conn, patient_id, requester)?;
        repository::list_tests_for_patient(conn, &patient.id)?
            .into_iter()
            .map(|test| self.verify_stored(test))
            .collect()
    }

    /// Update the comment or report reference of a test. Results stay untouched.
    pub fn patch_test(
        &self,
        conn: &Connection,
        id: &Uuid,
        requester: &Requester,
        patch: TestPatch,
        now: NaiveDateTime,
    ) -> Result<DiagnosticTest, DiagnosticError> {
        if patch.is_empty() {
            return Err(DiagnosticError::InvalidInput("No fields to update".into()));
        }
        let mut test = self.get_test(conn, id, requester)?;
        patch.apply(&mut test, now);
        repository::update_test_annotations(conn, &test)?;
        Ok(test)
    }

    /// A stored record must still carry one score per known class, and its
    /// headline must be the arg-max of those scores.
    fn verify_stored(&self, test: DiagnosticTest) -> Result<DiagnosticTest, DiagnosticError> {
        let top = aggregate(&test.predictions, self.classifier.classes().len())?;
        if top.label != test.top_label || (top.confidence - test.top_confidence).abs() > 1e-9 {
            tracing::error!(
                test_id = %test.id,
                stored = %test.top_label,
                recomputed = %top.label,
                "Stored result disagrees with its predictions"
            );
            return Err(DiagnosticError::MalformedPrediction(format!(
                "stored result {} does not match predictions (top {})",
                test.top_label, top.label
            )));
        }
        Ok(test)
    }
}

fn insert_in_transaction(conn: &Connection, test: &DiagnosticTest) -> Result<(), DiagnosticError> {
    let tx = conn.unchecked_transaction()?;
    repository::insert_test(&tx, test)?;
    tx.commit()?;
    Ok(())
}

/// `report_{id}.pdf`
pub fn report_file_name(id: &Uuid) -> String {
    format!("report_{id}.pdf")
}
