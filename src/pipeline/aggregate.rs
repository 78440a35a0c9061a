use serde::Serialize;

use super::DiagnosticError;
use crate::models::PredictionSet;

/// The arg-max of a prediction set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopResult {
    pub label: String,
    pub confidence: f64,
}

/// Pick the highest-confidence class. Exact ties go to the earlier class in
/// index order. Scores are taken as-is, never renormalized.
pub fn aggregate(
    predictions: &PredictionSet,
    expected_classes: usize,
) -> Result<TopResult, DiagnosticError> {
    if predictions.is_empty() {
        return Err(DiagnosticError::MalformedPrediction("no class scores".into()));
    }
    if predictions.len() != expected_classes {
        return Err(DiagnosticError::MalformedPrediction(format!(
            "{} scores for {expected_classes} classes",
            predictions.len()
        )));
    }
    predictions
        .validate()
        .map_err(|e| DiagnosticError::MalformedPrediction(e.to_string()))?;

    let mut best = &predictions.scores()[0];
    for score in predictions.iter().skip(1) {
        if score.confidence > best.confidence {
            best = score;
        }
    }
    Ok(TopResult {
        label: best.label.clone(),
        confidence: best.confidence,
    })
}
