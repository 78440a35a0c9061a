//! Per-class classifier scores and their stored JSON form.
//!
//! The stored form is a JSON array of `{"label": .., "confidence": ..}` objects
//! in class-index order. Reading it back is schema-checked: unknown fields,
//! wrong types, empty labels and confidences outside [0, 1] are rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictionCodecError {
    #[error("Stored predictions are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Class {index} has an empty label")]
    EmptyLabel { index: usize },

    #[error("Confidence for '{label}' out of range: {value}")]
    ConfidenceOutOfRange { label: String, value: f64 },
}

/// One class label with the model's confidence for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassScore {
    pub label: String,
    pub confidence: f64,
}

impl ClassScore {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Confidence rendered the way reports show it, e.g. `92.00%`.
    pub fn percent(&self) -> String {
        format_percent(self.confidence)
    }
}

/// Ordered per-class scores, one entry per known class, in class-index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionSet(Vec<ClassScore>);

impl PredictionSet {
    pub fn new(scores: Vec<ClassScore>) -> Self {
        Self(scores)
    }

    pub fn scores(&self) -> &[ClassScore] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassScore> {
        self.0.iter()
    }

    /// Scores sorted by descending confidence for display.
    /// Equal confidences keep class-index order. `self` is left untouched.
    pub fn ranked(&self) -> Vec<&ClassScore> {
        let mut ranked: Vec<&ClassScore> = self.0.iter().collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked
    }

    /// Check every entry has a label and a confidence in [0, 1].
    pub fn validate(&self) -> Result<(), PredictionCodecError> {
        for (index, score) in self.0.iter().enumerate() {
            if score.label.trim().is_empty() {
                return Err(PredictionCodecError::EmptyLabel { index });
            }
            if !score.confidence.is_finite() || !(0.0..=1.0).contains(&score.confidence) {
                return Err(PredictionCodecError::ConfidenceOutOfRange {
                    label: score.label.clone(),
                    value: score.confidence,
                });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, PredictionCodecError> {
        self.validate()?;
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, PredictionCodecError> {
        let scores: Vec<ClassScore> = serde_json::from_str(raw)?;
        let set = Self(scores);
        set.validate()?;
        Ok(set)
    }
}

impl<'a> IntoIterator for &'a PredictionSet {
    type Item = &'a ClassScore;
    type IntoIter = std::slice::Iter<'a, ClassScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Two-decimal percentage: 0.92 -> "92.00%".
pub fn format_percent(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}
