use crate::categories::ScoreMap;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether classification produced a result for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Success,
    Failed,
}

/// Why an image has no demographic result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The classifier could not produce a result (no face, model failure).
    Classification,
    /// The classifier answered, but a score mapping was empty.
    EmptyScores,
    /// The input image could not be read or decoded.
    Io,
    /// The classifier answered with values outside the expected domain.
    Malformed,
}

/// One classified attribute (gender or race): the dominant label, its
/// confidence and the full score mapping it was selected from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    label: String,
    confidence: f32,
    scores: ScoreMap,
}

impl Attribute {
    /// Select the dominant label of `scores`. Returns `None` when empty.
    pub fn from_scores(scores: ScoreMap) -> Option<Self> {
        let (label, confidence) = scores.dominant()?;
        let label = label.to_string();
        Some(Self {
            label,
            confidence,
            scores,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Confidence of the dominant label, in [0, 100].
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn scores(&self) -> &ScoreMap {
        &self.scores
    }
}

/// Demographic result for one successfully classified image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Demographics {
    age: u32,
    gender: Attribute,
    race: Attribute,
}

impl Demographics {
    pub fn new(age: u32, gender: Attribute, race: Attribute) -> Self {
        Self { age, gender, race }
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn gender(&self) -> &Attribute {
        &self.gender
    }

    pub fn race(&self) -> &Attribute {
        &self.race
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(Demographics),
    Failed { kind: FailureKind, reason: String },
}

/// Canonical analysis record, one per processed image. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    source_id: String,
    captured_at: DateTime<Utc>,
    processing_time_seconds: Option<f64>,
    #[serde(flatten)]
    outcome: Outcome,
}

impl AnalysisRecord {
    pub fn success(
        source_id: impl Into<String>,
        demographics: Demographics,
        processing_time_seconds: Option<f64>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            captured_at: Utc::now(),
            processing_time_seconds,
            outcome: Outcome::Success(demographics),
        }
    }

    pub fn failed(
        source_id: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
        processing_time_seconds: Option<f64>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            captured_at: Utc::now(),
            processing_time_seconds,
            outcome: Outcome::Failed {
                kind,
                reason: reason.into(),
            },
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn processing_time_seconds(&self) -> Option<f64> {
        self.processing_time_seconds
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn status(&self) -> Status {
        match self.outcome {
            Outcome::Success(_) => Status::Success,
            Outcome::Failed { .. } => Status::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn demographics(&self) -> Option<&Demographics> {
        match &self.outcome {
            Outcome::Success(d) => Some(d),
            Outcome::Failed { .. } => None,
        }
    }

    /// Failure kind and reason, for failed records.
    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failed { kind, reason } => Some((*kind, reason.as_str())),
        }
    }

    pub fn age(&self) -> Option<u32> {
        self.demographics().map(Demographics::age)
    }

    pub fn gender_label(&self) -> Option<&str> {
        self.demographics().map(|d| d.gender().label())
    }

    pub fn gender_confidence(&self) -> Option<f32> {
        self.demographics().map(|d| d.gender().confidence())
    }

    pub fn gender_scores(&self) -> Option<&ScoreMap> {
        self.demographics().map(|d| d.gender().scores())
    }

    pub fn race_label(&self) -> Option<&str> {
        self.demographics().map(|d| d.race().label())
    }

    pub fn race_confidence(&self) -> Option<f32> {
        self.demographics().map(|d| d.race().confidence())
    }

    pub fn race_scores(&self) -> Option<&ScoreMap> {
        self.demographics().map(|d| d.race().scores())
    }
}
