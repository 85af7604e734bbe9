//! Age, gender and race classification heads.
//!
//! Each head takes a 224×224 RGB face crop scaled to [0, 1] and returns a
//! softmax distribution: 101 age classes (one per year), two gender classes
//! and six race classes, in the category order of the session vocabulary.

use crate::error::VisionError;
use crate::load_session;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Deserialize;
use std::path::Path;

pub const ATTRIBUTE_INPUT_SIZE: u32 = 224;
pub const AGE_CLASSES: usize = 101;

/// Memory layout of the head's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// (1, 224, 224, 3), as exported from Keras.
    #[default]
    Nhwc,
    /// (1, 3, 224, 224)
    Nchw,
}

impl std::str::FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(format!("unknown tensor layout '{other}' (expected nhwc or nchw)")),
        }
    }
}

/// Resize a face crop to the head input size and scale pixels to [0, 1].
pub fn face_tensor(face: &RgbImage, layout: TensorLayout) -> Array4<f32> {
    let size = ATTRIBUTE_INPUT_SIZE as usize;
    let resized = imageops::resize(
        face,
        ATTRIBUTE_INPUT_SIZE,
        ATTRIBUTE_INPUT_SIZE,
        FilterType::Triangle,
    );

    let mut tensor = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, size, size, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, size, size)),
    };
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let v = pixel.0[c] as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
            }
        }
    }
    tensor
}

/// Expected value of the age distribution.
pub fn apparent_age(probs: &[f32]) -> Result<f32, VisionError> {
    if probs.len() != AGE_CLASSES {
        return Err(VisionError::InferenceFailed(format!(
            "expected {AGE_CLASSES} age classes, got {}",
            probs.len()
        )));
    }
    Ok(probs.iter().enumerate().map(|(years, p)| years as f32 * p).sum())
}

/// Pair class probabilities with their labels as percentages in [0, 100].
pub fn percentages(probs: &[f32], labels: &[String]) -> Result<Vec<(String, f32)>, VisionError> {
    if probs.len() != labels.len() {
        return Err(VisionError::InferenceFailed(format!(
            "expected {} classes, got {}",
            labels.len(),
            probs.len()
        )));
    }
    Ok(labels
        .iter()
        .zip(probs)
        .map(|(label, p)| (label.clone(), (p * 100.0).clamp(0.0, 100.0)))
        .collect())
}

/// One classification head.
pub struct AttributeModel {
    session: Session,
    name: &'static str,
}

impl AttributeModel {
    pub fn load(
        model_path: &Path,
        intra_threads: usize,
        name: &'static str,
    ) -> Result<Self, VisionError> {
        let session = load_session(model_path, intra_threads, name)?;
        Ok(Self { session, name })
    }

    /// Run the head and return its flattened output distribution.
    pub fn run(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, VisionError> {
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, probs) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::InferenceFailed(format!("{} output: {e}", self.name)))?;
        Ok(probs.to_vec())
    }
}
