//! Classifier adapter boundary.

use crate::types::FailureKind;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("unreadable image: {0}")]
    CorruptImage(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifierError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ClassifierError::NoFaceDetected | ClassifierError::Model(_) => {
                FailureKind::Classification
            }
            ClassifierError::CorruptImage(_) | ClassifierError::Io(_) => FailureKind::Io,
        }
    }
}

/// Raw per-image answer from a classifier, before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawAnalysis {
    /// Apparent age in years, not yet rounded.
    pub age: f32,
    /// Gender category → confidence in [0, 100].
    pub gender: Vec<(String, f32)>,
    /// Race category → confidence in [0, 100].
    pub race: Vec<(String, f32)>,
}

/// Predicts age, gender and race for one image.
///
/// Implementations own whatever model state they need; calls are made one
/// image at a time.
pub trait Classifier {
    fn classify(&mut self, path: &Path) -> Result<RawAnalysis, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for &mut C {
    fn classify(&mut self, path: &Path) -> Result<RawAnalysis, ClassifierError> {
        (**self).classify(path)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&mut self, path: &Path) -> Result<RawAnalysis, ClassifierError> {
        (**self).classify(path)
    }
}
