//! ONNX-backed implementation of the classifier adapter.

use crate::attributes::{self, AttributeModel, TensorLayout};
use crate::detector::FaceDetector;
use crate::error::VisionError;
use facetally_core::{Categories, Classifier, ClassifierError, RawAnalysis};
use image::imageops;
use image::RgbImage;
use std::path::{Path, PathBuf};

pub const DETECTOR_MODEL: &str = "det_10g.onnx";
pub const AGE_MODEL: &str = "age.onnx";
pub const GENDER_MODEL: &str = "gender.onnx";
pub const RACE_MODEL: &str = "race.onnx";

/// Model locations and inference settings.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub model_dir: PathBuf,
    /// Crop to the most confident detected face; fail when none is found.
    /// When off, the whole image is classified.
    pub detect_faces: bool,
    pub detection_threshold: f32,
    pub intra_threads: usize,
    pub layout: TensorLayout,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detect_faces: true,
            detection_threshold: 0.5,
            intra_threads: 2,
            layout: TensorLayout::default(),
        }
    }
}

impl VisionConfig {
    pub fn model_path(&self, file: &str) -> PathBuf {
        self.model_dir.join(file)
    }

    /// Every model file this configuration needs.
    pub fn required_models(&self) -> Vec<PathBuf> {
        let mut files = vec![AGE_MODEL, GENDER_MODEL, RACE_MODEL];
        if self.detect_faces {
            files.insert(0, DETECTOR_MODEL);
        }
        files.into_iter().map(|f| self.model_path(f)).collect()
    }

    pub fn missing_models(&self) -> Vec<PathBuf> {
        self.required_models().into_iter().filter(|p| !p.exists()).collect()
    }
}

/// Face detector plus age, gender and race heads.
pub struct OnnxClassifier {
    detector: Option<FaceDetector>,
    age: AttributeModel,
    gender: AttributeModel,
    race: AttributeModel,
    categories: Categories,
    layout: TensorLayout,
}

impl OnnxClassifier {
    /// Load every model named by `config`. Fails fast on the first missing
    /// or unloadable model.
    pub fn load(config: &VisionConfig, categories: Categories) -> Result<Self, VisionError> {
        let detector = if config.detect_faces {
            Some(FaceDetector::load(
                &config.model_path(DETECTOR_MODEL),
                config.intra_threads,
                config.detection_threshold,
            )?)
        } else {
            tracing::info!("face detection disabled; classifying whole images");
            None
        };

        let threads = config.intra_threads;
        Ok(Self {
            detector,
            age: AttributeModel::load(&config.model_path(AGE_MODEL), threads, "age")?,
            gender: AttributeModel::load(&config.model_path(GENDER_MODEL), threads, "gender")?,
            race: AttributeModel::load(&config.model_path(RACE_MODEL), threads, "race")?,
            categories,
            layout: config.layout,
        })
    }

    /// Classify an already decoded image (e.g. a video frame).
    pub fn classify_image(&mut self, image: &RgbImage) -> Result<RawAnalysis, ClassifierError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::CorruptImage("empty image".into()));
        }

        let face = self.face_crop(image)?;
        let input = attributes::face_tensor(&face, self.layout);

        let age = attributes::apparent_age(&self.age.run(&input)?)?;
        let gender = attributes::percentages(&self.gender.run(&input)?, self.categories.gender())?;
        let race = attributes::percentages(&self.race.run(&input)?, self.categories.race())?;

        Ok(RawAnalysis { age, gender, race })
    }

    fn face_crop(&mut self, image: &RgbImage) -> Result<RgbImage, ClassifierError> {
        let Some(detector) = self.detector.as_mut() else {
            return Ok(image.clone());
        };

        let faces = detector.detect(image)?;
        let (x, y, w, h) = faces
            .first()
            .and_then(|f| f.pixel_rect(image.width(), image.height()))
            .ok_or(ClassifierError::NoFaceDetected)?;
        tracing::debug!(faces = faces.len(), x, y, w, h, "face selected");

        Ok(imageops::crop_imm(image, x, y, w, h).to_image())
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, path: &Path) -> Result<RawAnalysis, ClassifierError> {
        let image = open_rgb(path)?;
        self.classify_image(&image)
    }
}

/// Decode an image file to RGB, separating I/O failures from decode failures.
pub fn open_rgb(path: &Path) -> Result<RgbImage, ClassifierError> {
    match image::open(path) {
        Ok(img) => Ok(img.to_rgb8()),
        Err(image::ImageError::IoError(e)) => Err(ClassifierError::Io(e)),
        Err(e) => Err(ClassifierError::CorruptImage(e.to_string())),
    }
}
