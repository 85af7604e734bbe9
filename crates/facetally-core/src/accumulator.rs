//! Append-only record store with running session statistics.

use crate::types::AnalysisRecord;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Snapshot of the running session statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SessionStats {
    /// All records, successful or failed.
    pub total_processed: usize,
    pub success_count: usize,
    /// Records carrying a processing time.
    pub timed_count: usize,
    /// Mean processing time over timed records; `None` when there are none.
    pub avg_processing_time: Option<f64>,
    /// `success_count / total_processed`; `None` when nothing was processed.
    pub success_rate: Option<f64>,
}

impl SessionStats {
    pub fn failure_count(&self) -> usize {
        self.total_processed - self.success_count
    }
}

/// Ordered, append-only store of analysis records.
///
/// Statistics are updated incrementally on [`append`](Self::append); the mean
/// processing time uses the count of timed records as its denominator, so
/// records without a timing value never skew it.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    records: Vec<AnalysisRecord>,
    success_count: usize,
    timed_count: usize,
    avg_processing_time: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return a reference to the stored copy.
    pub fn append(&mut self, record: AnalysisRecord) -> &AnalysisRecord {
        if record.is_success() {
            self.success_count += 1;
        }
        if let Some(elapsed) = record.processing_time_seconds() {
            self.timed_count += 1;
            let n = self.timed_count as f64;
            self.avg_processing_time = (self.avg_processing_time * (n - 1.0) + elapsed) / n;
        }

        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Drop every record and reset the statistics.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Full history in insertion order.
    pub fn all(&self) -> &[AnalysisRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> SessionStats {
        let total = self.records.len();
        SessionStats {
            total_processed: total,
            success_count: self.success_count,
            timed_count: self.timed_count,
            avg_processing_time: (self.timed_count > 0).then_some(self.avg_processing_time),
            success_rate: (total > 0).then(|| self.success_count as f64 / total as f64),
        }
    }
}

/// Clone-safe handle to an [`Accumulator`] for multiple writers.
///
/// Every operation takes the lock for its whole duration, so `append` and
/// `clear` are serialized and readers never observe a partial update.
#[derive(Debug, Clone, Default)]
pub struct SharedAccumulator {
    inner: Arc<Mutex<Accumulator>>,
}

impl SharedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Accumulator> {
        // Updates never panic midway; a poisoned guard still holds consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, record: AnalysisRecord) {
        self.lock().append(record);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> SessionStats {
        self.lock().stats()
    }

    /// Copy of the full history in insertion order.
    pub fn all(&self) -> Vec<AnalysisRecord> {
        self.lock().all().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{Categories, ScoreMap};
    use crate::types::{Attribute, Demographics, FailureKind};

    fn success(id: &str, elapsed: Option<f64>) -> AnalysisRecord {
        let cats = Categories::default();
        let gender = ScoreMap::from_raw(cats.gender(), &[("Man".to_string(), 90.0)]).unwrap();
        let race = ScoreMap::from_raw(cats.race(), &[("white".to_string(), 80.0)]).unwrap();
        let demo = Demographics::new(
            30,
            Attribute::from_scores(gender).unwrap(),
            Attribute::from_scores(race).unwrap(),
        );
        AnalysisRecord::success(id, demo, elapsed)
    }

    fn failure(id: &str, elapsed: Option<f64>) -> AnalysisRecord {
        AnalysisRecord::failed(id, FailureKind::Classification, "no face detected", elapsed)
    }

    #[test]
    fn test_empty_stats() {
        let acc = Accumulator::new();
        let stats = acc.stats();
        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.avg_processing_time, None);
        assert_eq!(stats.success_rate, None);
    }

    #[test]
    fn test_total_counts_failures() {
        let mut acc = Accumulator::new();
        acc.append(success("a", None));
        acc.append(failure("b", None));
        acc.append(failure("c", None));
        let stats = acc.stats();
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.failure_count(), 2);
        assert!((stats.success_rate.unwrap() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_incremental_mean_ignores_untimed() {
        let mut acc = Accumulator::new();
        acc.append(success("a", Some(2.0)));
        acc.append(failure("b", Some(4.0)));
        acc.append(success("c", Some(6.0)));
        assert!((acc.stats().avg_processing_time.unwrap() - 4.0).abs() < 1e-9);

        acc.append(success("d", None));
        let stats = acc.stats();
        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.timed_count, 3);
        assert!((stats.avg_processing_time.unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_insertion_order_and_duplicates() {
        let mut acc = Accumulator::new();
        acc.append(success("same.jpg", None));
        acc.append(failure("other.jpg", None));
        acc.append(success("same.jpg", None));
        let ids: Vec<&str> = acc.all().iter().map(|r| r.source_id()).collect();
        assert_eq!(ids, vec!["same.jpg", "other.jpg", "same.jpg"]);
    }

    #[test]
    fn test_append_returns_stored_record() {
        let mut acc = Accumulator::new();
        let stored = acc.append(failure("x.jpg", Some(0.1)));
        assert_eq!(stored.source_id(), "x.jpg");
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut acc = Accumulator::new();
        acc.append(success("a", Some(3.0)));
        acc.append(failure("b", Some(5.0)));
        acc.clear();

        let stats = acc.stats();
        assert!(acc.is_empty());
        assert_eq!(stats, SessionStats::default());
        assert_eq!(stats.success_rate, None);

        // Post-clear appends must not see pre-clear timings.
        acc.append(success("c", Some(1.0)));
        assert!((acc.stats().avg_processing_time.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(acc.stats().total_processed, 1);
    }

    #[test]
    fn test_shared_accumulator_concurrent_appends() {
        let shared = SharedAccumulator::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        shared.append(success(&format!("{t}-{i}"), Some(2.0)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = shared.stats();
        assert_eq!(stats.total_processed, 100);
        assert_eq!(stats.timed_count, 100);
        assert!((stats.avg_processing_time.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(shared.all().len(), 100);

        shared.clear();
        assert!(shared.is_empty());
        assert_eq!(shared.stats().total_processed, 0);
    }
}
