//! SCRFD face detector over RGB images via ONNX Runtime.
//!
//! Letterboxes the image to 640×640, decodes the anchor-free score/bbox
//! outputs of the three strides and suppresses overlaps with greedy NMS.
//! Landmark outputs, when present, are ignored.

use crate::error::VisionError;
use crate::load_session;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// A detected face in original image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box.
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        let inter_w = (right - self.x.max(other.x)).max(0.0);
        let inter_h = (bottom - self.y.max(other.y)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    /// Clamp to a `width`×`height` image and return the pixel rectangle
    /// `(x, y, w, h)`, or `None` when nothing of the box is inside.
    pub fn pixel_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0.0).floor() as u32;
        let y0 = self.y.max(0.0).floor() as u32;
        let x1 = ((self.x + self.width).ceil().max(0.0) as u32).min(width);
        let y1 = ((self.y + self.height).ceil().max(0.0) as u32).min(height);
        (x1 > x0 && y1 > y0).then(|| (x0, y0, x1 - x0, y1 - y0))
    }
}

/// Scale and padding applied when fitting an image into the model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: usize,
    pad_y: usize,
}

impl Letterbox {
    fn fit(width: u32, height: u32) -> (Self, u32, u32) {
        let target = SCRFD_INPUT_SIZE as f32;
        let scale = (target / width as f32).min(target / height as f32);
        let new_w = ((width as f32 * scale).round() as usize).clamp(1, SCRFD_INPUT_SIZE);
        let new_h = ((height as f32 * scale).round() as usize).clamp(1, SCRFD_INPUT_SIZE);
        let lb = Self {
            scale,
            pad_x: (SCRFD_INPUT_SIZE - new_w) / 2,
            pad_y: (SCRFD_INPUT_SIZE - new_h) / 2,
        };
        (lb, new_w as u32, new_h as u32)
    }

    /// Map a point from model-input space back to the original image.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Score and bbox output positions for one stride.
type StrideOutputs = (usize, usize);

pub struct FaceDetector {
    session: Session,
    threshold: f32,
    /// Output positions for strides [8, 16, 32].
    stride_outputs: [StrideOutputs; 3],
}

impl FaceDetector {
    /// Load the SCRFD model. Faces scoring at or below `threshold` are discarded.
    pub fn load(
        model_path: &Path,
        intra_threads: usize,
        threshold: f32,
    ) -> Result<Self, VisionError> {
        let session = load_session(model_path, intra_threads, "SCRFD")?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 6 {
            return Err(VisionError::InferenceFailed(format!(
                "SCRFD model requires at least 6 outputs (3 strides × score/bbox), got {}",
                names.len()
            )));
        }
        let stride_outputs = map_outputs(&names);
        tracing::debug!(?stride_outputs, "SCRFD output mapping");

        Ok(Self {
            session,
            threshold,
            stride_outputs,
        })
    }

    /// Detect faces, most confident first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, VisionError> {
        let (input, letterbox) = preprocess(image);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        let strides = SCRFD_STRIDES.iter().zip(self.stride_outputs.iter());
        for (&stride, &(score_idx, bbox_idx)) in strides {
            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            candidates.extend(decode_stride(scores, bboxes, stride, &letterbox, self.threshold));
        }

        let faces = nms(candidates, SCRFD_NMS_THRESHOLD);
        tracing::debug!(faces = faces.len(), "SCRFD detection done");
        Ok(faces)
    }
}

/// Resolve score/bbox output positions, by name ("score_8", "bbox_8", ...)
/// when the export names them, positionally otherwise.
fn map_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideOutputs>> = SCRFD_STRIDES
        .iter()
        .map(|&s| Some((find("score", s)?, find("bbox", s)?)))
        .collect();

    match named {
        Some(v) => [v[0], v[1], v[2]],
        None => [(0, 3), (1, 4), (2, 5)],
    }
}

/// Letterbox an RGB image into a normalized NCHW tensor.
/// Padding is left at zero, which is the normalized mean.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (letterbox, new_w, new_h) = Letterbox::fit(image.width(), image.height());
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, SCRFD_INPUT_SIZE, SCRFD_INPUT_SIZE));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (x as usize + letterbox.pad_x, y as usize + letterbox.pad_y);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel.0[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, letterbox)
}

/// Decode one stride level: anchors sit at grid points, two per cell, and
/// bbox outputs are left/top/right/bottom distances in stride units.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<FaceBox> {
    let grid_w = SCRFD_INPUT_SIZE / stride;
    let anchors = grid_w * (SCRFD_INPUT_SIZE / stride) * SCRFD_ANCHORS_PER_CELL;
    let s = stride as f32;

    (0..anchors.min(scores.len()))
        .filter(|&i| scores[i] > threshold)
        .filter_map(|i| {
            let d = bboxes.get(i * 4..i * 4 + 4)?;
            let cell = i / SCRFD_ANCHORS_PER_CELL;
            let cx = (cell % grid_w) as f32 * s;
            let cy = (cell / grid_w) as f32 * s;

            let (x1, y1) = letterbox.unmap(cx - d[0] * s, cy - d[1] * s);
            let (x2, y2) = letterbox.unmap(cx + d[2] * s, cy + d[3] * s);
            Some(FaceBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: scores[i],
            })
        })
        .collect()
}

/// Greedy non-maximum suppression, most confident first.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut keep: Vec<FaceBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| k.iou(&det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}
