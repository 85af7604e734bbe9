use facetally_core::ClassifierError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("model file not found: {0} — place the ONNX models in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl From<VisionError> for ClassifierError {
    fn from(e: VisionError) -> Self {
        ClassifierError::Model(e.to_string())
    }
}
