//! Analysis session: classify → time → normalize → accumulate.

use crate::accumulator::{Accumulator, SessionStats};
use crate::categories::Categories;
use crate::classifier::{Classifier, ClassifierError, RawAnalysis};
use crate::normalize::Normalizer;
use crate::types::AnalysisRecord;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

/// One analysis session: a classifier plus the records it produced.
///
/// Images are classified one at a time in call order. Every call yields
/// exactly one record, successful or failed.
pub struct AnalysisSession<C> {
    id: Uuid,
    classifier: C,
    normalizer: Normalizer,
    accumulator: Accumulator,
}

impl<C: Classifier> AnalysisSession<C> {
    pub fn new(classifier: C, categories: Categories) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "analysis session created");
        Self {
            id,
            classifier,
            normalizer: Normalizer::new(categories),
            accumulator: Accumulator::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Classify an image file, using its file name as the source id.
    pub fn analyze_path(&mut self, path: &Path) -> &AnalysisRecord {
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.analyze_as(source_id, path)
    }

    /// Classify an image file under an explicit source id.
    pub fn analyze_as(&mut self, source_id: impl Into<String>, path: &Path) -> &AnalysisRecord {
        self.analyze_with(source_id, |classifier| classifier.classify(path))
    }

    /// Run an arbitrary classification call (e.g. on an in-memory frame)
    /// under the session's timing and normalization.
    pub fn analyze_with<F>(&mut self, source_id: impl Into<String>, classify: F) -> &AnalysisRecord
    where
        F: FnOnce(&mut C) -> Result<RawAnalysis, ClassifierError>,
    {
        let source_id = source_id.into();
        let start = Instant::now();
        let raw = classify(&mut self.classifier);
        let elapsed = start.elapsed().as_secs_f64();

        let record = self.normalizer.normalize(raw, source_id, Some(elapsed));
        match record.failure() {
            None => tracing::debug!(
                source = record.source_id(),
                elapsed_secs = elapsed,
                age = ?record.age(),
                gender = ?record.gender_label(),
                race = ?record.race_label(),
                "image analyzed"
            ),
            Some((kind, reason)) => tracing::warn!(
                source = record.source_id(),
                ?kind,
                reason,
                "image analysis failed"
            ),
        }

        self.accumulator.append(record)
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        self.accumulator.all()
    }

    pub fn stats(&self) -> SessionStats {
        self.accumulator.stats()
    }

    /// Drop all records and reset statistics. The classifier is kept.
    pub fn clear(&mut self) {
        tracing::debug!(session = %self.id, records = self.accumulator.len(), "session cleared");
        self.accumulator.clear();
    }

    pub fn classifier_mut(&mut self) -> &mut C {
        &mut self.classifier
    }
}
