use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prediction::PredictionSet;

/// A persisted chest X-ray classification: the image, every class score and
/// the derived top result. Only `comment` and `report_path` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticTest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub operator_id: Uuid,
    pub image_path: String,
    pub conducted_at: NaiveDateTime,
    pub top_label: String,
    pub top_confidence: f64,
    pub predictions: PredictionSet,
    pub comment: Option<String>,
    pub report_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The mutable part of a test. Absent fields are left untouched;
/// an empty string clears the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestPatch {
    pub comment: Option<String>,
    pub report_path: Option<String>,
}

impl TestPatch {
    pub fn is_empty(&self) -> bool {
        let Self {
            comment,
            report_path,
        } = self;
        comment.is_none() && report_path.is_none()
    }

    pub fn apply(self, test: &mut DiagnosticTest, now: NaiveDateTime) {
        let Self {
            comment,
            report_path,
        } = self;
        if let Some(c) = comment {
            test.comment = non_empty(c);
        }
        if let Some(r) = report_path {
            test.report_path = non_empty(r);
        }
        test.updated_at = now;
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassScore;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample() -> DiagnosticTest {
        DiagnosticTest {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            operator_id: Uuid::new_v4(),
            image_path: "uploads/a.png".into(),
            conducted_at: at(8),
            top_label: "Normal".into(),
            top_confidence: 0.92,
            predictions: PredictionSet::new(vec![
                ClassScore::new("Normal", 0.92),
                ClassScore::new("Pneumonia", 0.08),
            ]),
            comment: None,
            report_path: None,
            created_at: at(8),
            updated_at: at(8),
        }
    }

    #[test]
    fn patch_sets_comment_and_keeps_results() {
        let mut test = sample();
        let before = test.clone();
        TestPatch {
            comment: Some("Follow-up in 3 months".into()),
            report_path: None,
        }
        .apply(&mut test, at(10));

        assert_eq!(test.comment.as_deref(), Some("Follow-up in 3 months"));
        assert_eq!(test.top_label, before.top_label);
        assert_eq!(test.top_confidence, before.top_confidence);
        assert_eq!(test.predictions, before.predictions);
        assert_eq!(test.updated_at, at(10));
    }

    #[test]
    fn empty_string_clears_comment() {
        let mut test = sample();
        test.comment = Some("old".into());
        TestPatch {
            comment: Some("  ".into()),
            report_path: None,
        }
        .apply(&mut test, at(9));
        assert!(test.comment.is_none());
    }

    #[test]
    fn result_fields_are_not_patchable() {
        let raw = r#"{"top_label":"COVID"}"#;
        assert!(serde_json::from_str::<TestPatch>(raw).is_err());
    }
}
