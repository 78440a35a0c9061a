//! Structured report content, independent of the PDF layout.

use chrono::NaiveDateTime;

use crate::models::{format_percent, DiagnosticTest, Patient};

pub const REPORT_TITLE: &str = "Chest X-ray Diagnostic Report";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub heading: String,
    pub rows: Vec<ReportRow>,
}

impl ReportSection {
    fn new(heading: &str) -> Self {
        Self {
            heading: heading.into(),
            rows: Vec::new(),
        }
    }

    fn row(mut self, label: &str, value: impl Into<String>) -> Self {
        self.rows.push(ReportRow {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    fn optional_row(self, label: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => self.row(label, v),
            _ => self,
        }
    }
}

/// Everything a report shows. `generated_at` only feeds the footer, so two
/// documents for the same test differ in nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub sections: Vec<ReportSection>,
    pub visualization_png: Vec<u8>,
    pub generated_at: NaiveDateTime,
}

impl ReportDocument {
    pub fn build(
        test: &DiagnosticTest,
        patient: &Patient,
        visualization_png: Vec<u8>,
        generated_at: NaiveDateTime,
    ) -> Self {
        let patient_section = ReportSection::new("Patient Information")
            .row("Name", patient.name.as_str())
            .row("Patient ID", patient.id.to_string())
            .row("Date of Birth", patient.date_of_birth.format("%Y-%m-%d").to_string())
            .row("Gender", patient.gender.as_str())
            .row("Phone", patient.phone.as_str())
            .row(
                "Address",
                patient
                    .address
                    .as_deref()
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or("N/A"),
            )
            .optional_row("Blood Type", patient.blood_type.map(|b| b.as_str()))
            .optional_row("Allergies", patient.allergies.as_deref());

        let test_section = ReportSection::new("Test Details")
            .row("Test ID", test.id.to_string())
            .row("Conducted", test.conducted_at.format("%Y-%m-%d %H:%M").to_string())
            .row("Result", test.top_label.as_str())
            .row("Confidence", format_percent(test.top_confidence))
            .optional_row("Comment", test.comment.as_deref());

        let scores_section = test
            .predictions
            .ranked()
            .into_iter()
            .fold(ReportSection::new("Class Scores"), |section, score| {
                section.row(&score.label, score.percent())
            });

        Self {
            title: REPORT_TITLE.into(),
            sections: vec![patient_section, test_section, scores_section],
            visualization_png,
            generated_at,
        }
    }

    pub fn footer(&self) -> String {
        format!("Generated on {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))
    }

    /// Title and section text, one line per row.
    pub fn body_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.heading);
            out.push('\n');
            for row in &section.rows {
                out.push_str(&row.label);
                out.push_str(": ");
                out.push_str(&row.value);
                out.push('\n');
            }
        }
        out
    }

    /// Full text as it appears in the report, footer included.
    pub fn text_content(&self) -> String {
        format!("{}\n{}\n", self.body_text(), self.footer())
    }
}
