//! facetally-vision — Face detection and demographic classification.
//!
//! Uses SCRFD for face detection and separate age, gender and race heads,
//! all running via ONNX Runtime for CPU inference.

pub mod attributes;
pub mod classifier;
pub mod detector;
pub mod error;

pub use attributes::TensorLayout;
pub use classifier::{OnnxClassifier, VisionConfig};
pub use detector::{FaceBox, FaceDetector};
pub use error::VisionError;

use ort::session::Session;
use std::path::Path;

/// Open an ONNX model, failing with `ModelNotFound` when the file is absent.
pub(crate) fn load_session(
    model_path: &Path,
    intra_threads: usize,
    name: &str,
) -> Result<Session, VisionError> {
    if !model_path.exists() {
        return Err(VisionError::ModelNotFound(model_path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)?;

    tracing::info!(
        model = name,
        path = %model_path.display(),
        inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded model"
    );

    Ok(session)
}
