//! Raw classifier response → canonical [`AnalysisRecord`].
//!
//! Normalization never fails: every problem with a response becomes a
//! `Failed` record carrying the reason, so one bad image cannot abort a batch.

use crate::categories::{Categories, ScoreError, ScoreMap};
use crate::classifier::{ClassifierError, RawAnalysis};
use crate::types::{AnalysisRecord, Attribute, Demographics, FailureKind};

/// Builds analysis records against a fixed category vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    categories: Categories,
}

impl Normalizer {
    pub fn new(categories: Categories) -> Self {
        Self { categories }
    }

    /// Convert one classifier answer into a record.
    ///
    /// `elapsed_seconds` is the caller-measured duration of the classifier
    /// call; negative or non-finite values are dropped.
    pub fn normalize(
        &self,
        raw: Result<RawAnalysis, ClassifierError>,
        source_id: impl Into<String>,
        elapsed_seconds: Option<f64>,
    ) -> AnalysisRecord {
        let source_id = source_id.into();
        let elapsed = elapsed_seconds.filter(|t| t.is_finite() && *t >= 0.0);

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => return AnalysisRecord::failed(source_id, e.kind(), e.to_string(), elapsed),
        };

        match self.demographics(&raw) {
            Ok(demographics) => AnalysisRecord::success(source_id, demographics, elapsed),
            Err((kind, reason)) => AnalysisRecord::failed(source_id, kind, reason, elapsed),
        }
    }

    fn demographics(&self, raw: &RawAnalysis) -> Result<Demographics, (FailureKind, String)> {
        if !raw.age.is_finite() || raw.age < 0.0 {
            return Err((FailureKind::Malformed, format!("invalid age: {}", raw.age)));
        }
        let age = raw.age.round() as u32;

        let gender = attribute("gender", self.categories.gender(), &raw.gender)?;
        let race = attribute("race", self.categories.race(), &raw.race)?;

        Ok(Demographics::new(age, gender, race))
    }
}

fn attribute(
    name: &str,
    vocabulary: &[String],
    raw: &[(String, f32)],
) -> Result<Attribute, (FailureKind, String)> {
    let scores = ScoreMap::from_raw(vocabulary, raw).map_err(|e| {
        let kind = match e {
            ScoreError::Empty => FailureKind::EmptyScores,
            _ => FailureKind::Malformed,
        };
        (kind, format!("{name}: {e}"))
    })?;

    Attribute::from_scores(scores).ok_or_else(|| {
        (
            FailureKind::EmptyScores,
            format!("{name}: {}", ScoreError::Empty),
        )
    })
}
