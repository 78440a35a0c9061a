//! Chest X-ray classifier: class index, input contract, validated inference.
//!
//! The model itself is a black box that maps one preprocessed tensor to one
//! raw score per class. `ClassifierModel` wraps a scoring engine together with
//! the class index it was trained against and refuses to hand out anything
//! that does not line up with that index: wrong length, NaN or scores outside
//! [0, 1] are inference failures, never defaults.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use super::preprocess::ImageTensor;
use super::DiagnosticError;
use crate::models::{ClassScore, PredictionSet};

/// Weights bundle inside the model directory.
pub const MODEL_FILE: &str = "model.onnx";
/// Class-index table inside the model directory.
pub const CLASS_INDEX_FILE: &str = "class_dict.csv";

/// Side length of the square input the classifier was trained on.
pub const INPUT_SIZE: u32 = 224;
pub const INPUT_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Class index not found: {0}")]
    ClassIndexNotFound(PathBuf),

    #[error("Malformed class index: {0}")]
    MalformedClassIndex(String),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("This build has no inference engine (enable the `onnx` feature)")]
    EngineUnavailable,
}

// ═══════════════════════════════════════════════════════════
// Input contract
// ═══════════════════════════════════════════════════════════

/// How raw 8-bit channel values are scaled before they reach the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// Raw values in [0, 255]. EfficientNet graphs rescale internally.
    Passthrough,
    /// [0, 1]
    UnitScale,
    /// [-1, 1]
    Symmetric,
    /// `(v / 255 - mean[c]) / std[c]` per channel.
    MeanStd { mean: [f32; 3], std: [f32; 3] },
}

impl Normalization {
    pub fn apply(&self, channel: usize, value: u8) -> f32 {
        let v = f32::from(value);
        match self {
            Self::Passthrough => v,
            Self::UnitScale => v / 255.0,
            Self::Symmetric => v / 127.5 - 1.0,
            Self::MeanStd { mean, std } => (v / 255.0 - mean[channel]) / std[channel],
        }
    }

    /// Inclusive bounds of values this scheme can produce for `channel`.
    pub fn bounds(&self, channel: usize) -> (f32, f32) {
        (self.apply(channel, 0), self.apply(channel, 255))
    }
}

/// Shape and scaling the classifier expects. HWC layout, RGB order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSpec {
    pub size: u32,
    pub normalization: Normalization,
}

impl InputSpec {
    /// EfficientNet-B0 family: 224x224, raw pixel values.
    pub fn efficientnet_b0() -> Self {
        Self {
            size: INPUT_SIZE,
            normalization: Normalization::Passthrough,
        }
    }

    /// Flat element count of one input tensor.
    pub fn element_count(&self) -> usize {
        self.size as usize * self.size as usize * INPUT_CHANNELS
    }
}

// ═══════════════════════════════════════════════════════════
// Class index
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct ClassRow {
    class_index: usize,
    #[serde(rename = "class")]
    label: String,
}

/// Stable class id to label mapping. Ids are exactly `0..len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    labels: Vec<String>,
}

impl ClassIndex {
    pub fn from_labels<S: Into<String>>(
        labels: impl IntoIterator<Item = S>,
    ) -> Result<Self, LoadError> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(LoadError::MalformedClassIndex("no classes defined".into()));
        }
        if let Some(pos) = labels.iter().position(|l| l.trim().is_empty()) {
            return Err(LoadError::MalformedClassIndex(format!(
                "class {pos} has an empty label"
            )));
        }
        Ok(Self { labels })
    }

    /// Read a CSV table with `class_index` and `class` columns.
    /// Rows may come in any order; extra columns are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows: Vec<ClassRow> = Vec::new();
        for (line, record) in csv_reader.deserialize::<ClassRow>().enumerate() {
            let row = record.map_err(|e| {
                LoadError::MalformedClassIndex(format!("row {}: {e}", line + 1))
            })?;
            rows.push(row);
        }
        rows.sort_by_key(|r| r.class_index);

        for (expected, row) in rows.iter().enumerate() {
            if row.class_index != expected {
                return Err(LoadError::MalformedClassIndex(format!(
                    "class ids must be contiguous from 0, found {} where {expected} was expected",
                    row.class_index
                )));
            }
        }
        Self::from_labels(rows.into_iter().map(|r| r.label))
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path)
            .map_err(|_| LoadError::ClassIndexNotFound(path.to_path_buf()))?;
        Self::from_reader(file)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

// ═══════════════════════════════════════════════════════════
// Classifier
// ═══════════════════════════════════════════════════════════

/// Raw scoring backend: one tensor in, one score per class out.
pub trait ScoreEngine: Send + Sync {
    fn score(&self, tensor: &ImageTensor) -> Result<Vec<f32>, DiagnosticError>;
}

/// Shared, read-only classification capability.
pub trait Classifier: Send + Sync {
    fn input_spec(&self) -> &InputSpec;
    fn classes(&self) -> &ClassIndex;
    fn infer(&self, tensor: &ImageTensor) -> Result<PredictionSet, DiagnosticError>;
}

pub struct ClassifierModel<E> {
    engine: E,
    classes: ClassIndex,
    input: InputSpec,
}

impl<E: ScoreEngine> ClassifierModel<E> {
    pub fn new(engine: E, classes: ClassIndex, input: InputSpec) -> Self {
        Self {
            engine,
            classes,
            input,
        }
    }
}

impl<E: ScoreEngine> Classifier for ClassifierModel<E> {
    fn input_spec(&self) -> &InputSpec {
        &self.input
    }

    fn classes(&self) -> &ClassIndex {
        &self.classes
    }

    fn infer(&self, tensor: &ImageTensor) -> Result<PredictionSet, DiagnosticError> {
        if tensor.data().len() != self.input.element_count() {
            return Err(DiagnosticError::Inference(format!(
                "input tensor has {} elements, model expects {}",
                tensor.data().len(),
                self.input.element_count()
            )));
        }

        let scores = self.engine.score(tensor)?;
        if scores.len() != self.classes.len() {
            return Err(DiagnosticError::Inference(format!(
                "model produced {} scores for {} classes",
                scores.len(),
                self.classes.len()
            )));
        }

        let mut out = Vec::with_capacity(scores.len());
        for (label, &score) in self.classes.labels().iter().zip(&scores) {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(DiagnosticError::Inference(format!(
                    "score for '{label}' out of range: {score}"
                )));
            }
            out.push(ClassScore::new(label.clone(), f64::from(score)));
        }
        tracing::debug!(classes = out.len(), "Inference complete");
        Ok(PredictionSet::new(out))
    }
}

/// Engine returning fixed scores regardless of input. Used for tests and
/// for wiring checks without a model on disk.
pub struct StubEngine {
    scores: Vec<f32>,
}

impl StubEngine {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }
}

impl ScoreEngine for StubEngine {
    fn score(&self, _tensor: &ImageTensor) -> Result<Vec<f32>, DiagnosticError> {
        Ok(self.scores.clone())
    }
}

/// Build a classifier over a `StubEngine` from `(label, score)` pairs.
pub fn stub_classifier(pairs: &[(&str, f32)]) -> Result<Arc<dyn Classifier>, LoadError> {
    let classes = ClassIndex::from_labels(pairs.iter().map(|(label, _)| *label))?;
    let engine = StubEngine::new(pairs.iter().map(|(_, score)| *score).collect());
    Ok(Arc::new(ClassifierModel::new(
        engine,
        classes,
        InputSpec::efficientnet_b0(),
    )))
}

// ═══════════════════════════════════════════════════════════
// ONNX engine, behind the `onnx` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx")]
mod onnx {
    use super::{DiagnosticError, ImageTensor, LoadError, ScoreEngine, INPUT_CHANNELS};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// ONNX Runtime session for the exported Keras classifier.
    ///
    /// `Session::run` needs `&mut self`, so concurrent requests queue on the
    /// mutex. One session per process.
    pub struct OnnxEngine {
        session: Mutex<Session>,
    }

    impl OnnxEngine {
        pub fn load(model_path: &Path) -> Result<Self, LoadError> {
            if !model_path.exists() {
                return Err(LoadError::ModelNotFound(model_path.to_path_buf()));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| LoadError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| LoadError::ModelInit(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e: ort::Error| LoadError::ModelInit(format!("ONNX load failed: {e}")))?;

            tracing::info!("ONNX classifier loaded from {}", model_path.display());

            Ok(Self {
                session: Mutex::new(session),
            })
        }
    }

    impl ScoreEngine for OnnxEngine {
        fn score(&self, tensor: &ImageTensor) -> Result<Vec<f32>, DiagnosticError> {
            use ort::value::TensorRef;

            let (height, width) = tensor.dimensions();
            let shape = vec![1i64, i64::from(height), i64::from(width), INPUT_CHANNELS as i64];
            let input = TensorRef::from_array_view((shape, tensor.data()))
                .map_err(|e| DiagnosticError::Inference(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| DiagnosticError::Inference("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| DiagnosticError::Inference(format!("ONNX inference failed: {e}")))?;

            // Output shape: [1, num_classes]
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| DiagnosticError::Inference(format!("Output extraction: {e}")))?;

            if shape.len() != 2 || shape[0] != 1 {
                return Err(DiagnosticError::Inference(format!(
                    "Unexpected output shape: {shape:?}, expected [1, classes]"
                )));
            }
            Ok(data.to_vec())
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;

/// Load the production classifier from `model_dir`. Fails if either the
/// weights or the class index is missing or malformed.
pub fn load_classifier(model_dir: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
    let classes = ClassIndex::load(&model_dir.join(CLASS_INDEX_FILE))?;
    tracing::info!(classes = classes.len(), "Class index loaded");

    #[cfg(feature = "onnx")]
    {
        let engine = OnnxEngine::load(&model_dir.join(MODEL_FILE))?;
        Ok(Arc::new(ClassifierModel::new(
            engine,
            classes,
            InputSpec::efficientnet_b0(),
        )))
    }

    #[cfg(not(feature = "onnx"))]
    {
        let model_path = model_dir.join(MODEL_FILE);
        if !model_path.exists() {
            return Err(LoadError::ModelNotFound(model_path));
        }
        drop(classes);
        Err(LoadError::EngineUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_tensor() -> ImageTensor {
        ImageTensor::filled(INPUT_SIZE, 0.0)
    }

    #[test]
    fn class_index_parses_unordered_rows_with_extra_columns() {
        let csv = "class_index,class,height,width\n2,Tuberculosis,224,224\n0,COVID,224,224\n1,Normal,224,224\n";
        let index = ClassIndex::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.labels(), ["COVID", "Normal", "Tuberculosis"]);
        assert_eq!(index.label(1), Some("Normal"));
        assert_eq!(index.label(3), None);
    }

    #[test]
    fn class_index_rejects_gaps_and_duplicates() {
        let gap = "class_index,class\n0,COVID\n2,Normal\n";
        assert!(matches!(
            ClassIndex::from_reader(gap.as_bytes()),
            Err(LoadError::MalformedClassIndex(_))
        ));
        let dup = "class_index,class\n0,COVID\n0,Normal\n";
        assert!(ClassIndex::from_reader(dup.as_bytes()).is_err());
    }

    #[test]
    fn class_index_rejects_missing_columns_and_empty_tables() {
        assert!(ClassIndex::from_reader("id,name\n0,COVID\n".as_bytes()).is_err());
        assert!(ClassIndex::from_reader("class_index,class\n".as_bytes()).is_err());
        assert!(ClassIndex::from_reader("class_index,class\n0,\n".as_bytes()).is_err());
    }

    #[test]
    fn missing_class_index_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_classifier(dir.path()).err().unwrap();
        assert!(matches!(err, LoadError::ClassIndexNotFound(_)));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn build_without_engine_refuses_to_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CLASS_INDEX_FILE), "class_index,class\n0,Normal\n").unwrap();
        assert!(matches!(
            load_classifier(dir.path()),
            Err(LoadError::ModelNotFound(_))
        ));
        std::fs::write(dir.path().join(MODEL_FILE), b"weights").unwrap();
        assert!(matches!(
            load_classifier(dir.path()),
            Err(LoadError::EngineUnavailable)
        ));
    }

    #[test]
    fn infer_pairs_scores_with_labels_in_index_order() {
        let model = stub_classifier(&[("Normal", 0.92), ("Pneumonia", 0.05), ("COVID", 0.03)])
            .unwrap();
        let set = model.infer(&blank_tensor()).unwrap();
        let labels: Vec<&str> = set.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Normal", "Pneumonia", "COVID"]);
        assert!((set.scores()[0].confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn wrong_score_count_is_inference_error() {
        let classes = ClassIndex::from_labels(["A", "B", "C"]).unwrap();
        let model = ClassifierModel::new(
            StubEngine::new(vec![0.5, 0.5]),
            classes,
            InputSpec::efficientnet_b0(),
        );
        assert!(matches!(
            model.infer(&blank_tensor()),
            Err(DiagnosticError::Inference(_))
        ));
    }

    #[test]
    fn non_finite_and_out_of_range_scores_rejected() {
        for bad in [f32::NAN, f32::INFINITY, 1.5, -0.1] {
            let model = stub_classifier(&[("A", 0.2), ("B", bad)]).unwrap();
            assert!(matches!(
                model.infer(&blank_tensor()),
                Err(DiagnosticError::Inference(_))
            ));
        }
    }

    #[test]
    fn wrong_tensor_size_is_inference_error() {
        let model = stub_classifier(&[("A", 1.0)]).unwrap();
        let small = ImageTensor::filled(16, 0.0);
        assert!(matches!(
            model.infer(&small),
            Err(DiagnosticError::Inference(_))
        ));
    }

    #[test]
    fn normalization_bounds() {
        assert_eq!(Normalization::Passthrough.bounds(0), (0.0, 255.0));
        assert_eq!(Normalization::UnitScale.bounds(1), (0.0, 1.0));
        assert_eq!(Normalization::Symmetric.bounds(2), (-1.0, 1.0));
        let imagenet = Normalization::MeanStd {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        };
        let (lo, hi) = imagenet.bounds(0);
        assert!(lo < 0.0 && hi > 2.0);
    }
}
