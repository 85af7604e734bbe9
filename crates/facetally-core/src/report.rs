//! Aggregate reports over a sequence of analysis records.
//!
//! Failed records never enter a demographic aggregate; they only count
//! towards totals.

use crate::types::{AnalysisRecord, Attribute, Demographics, Status};
use serde::Serialize;
use std::collections::BTreeMap;

/// One equal-width age bin. The last bin of a histogram is closed on the
/// right so the maximum age is always counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgeBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AgeHistogram {
    pub bins: Vec<AgeBin>,
}

impl AgeHistogram {
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Count and mean confidence of one label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelStats {
    pub count: usize,
    pub mean_confidence: f64,
}

/// Summary over a record sequence. Every `Option` field is `None` when no
/// record succeeded, never a computed zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SummaryStatistics {
    /// All records, including failures.
    pub count: usize,
    pub successful: usize,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub age_mean: Option<f64>,
    /// Sample standard deviation; needs at least two successes.
    pub age_stddev: Option<f64>,
    pub most_common_gender: Option<String>,
    pub most_common_race: Option<String>,
    pub avg_gender_confidence: Option<f64>,
    pub avg_race_confidence: Option<f64>,
    pub avg_processing_time: Option<f64>,
    pub min_processing_time: Option<f64>,
    pub max_processing_time: Option<f64>,
}

/// Flat export row. Failed records leave every demographic column empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRow {
    pub source_id: String,
    pub age: Option<u32>,
    pub gender_label: Option<String>,
    pub gender_confidence: Option<f32>,
    pub race_label: Option<String>,
    pub race_confidence: Option<f32>,
    pub status: Status,
}

fn successes(records: &[AnalysisRecord]) -> impl Iterator<Item = &Demographics> + '_ {
    records.iter().filter_map(AnalysisRecord::demographics)
}

/// Bucket the ages of successful records into `bins` equal-width bins
/// spanning `[min, max]`.
///
/// When every age is equal the range is widened by half a year on each side.
/// A `bins` of zero is treated as one.
pub fn age_distribution(records: &[AnalysisRecord], bins: usize) -> AgeHistogram {
    let ages: Vec<f64> = successes(records).map(|d| d.age() as f64).collect();
    if ages.is_empty() {
        return AgeHistogram::default();
    }

    let bins = bins.max(1);
    let mut lo = ages.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = ages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<AgeBin> = (0..bins)
        .map(|i| AgeBin {
            lower: lo + i as f64 * width,
            upper: if i + 1 == bins { hi } else { lo + (i + 1) as f64 * width },
            count: 0,
        })
        .collect();

    for age in ages {
        // floor() can land one bin off an interior edge; the reported edges win.
        let mut idx = (((age - lo) / width).floor() as usize).min(bins - 1);
        while idx + 1 < bins && age >= out[idx + 1].lower {
            idx += 1;
        }
        while idx > 0 && age < out[idx].lower {
            idx -= 1;
        }
        out[idx].count += 1;
    }

    AgeHistogram { bins: out }
}

fn label_distribution<'a, F>(records: &'a [AnalysisRecord], pick: F) -> BTreeMap<String, LabelStats>
where
    F: Fn(&'a Demographics) -> &'a Attribute,
{
    let mut sums: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for attr in successes(records).map(pick) {
        let entry = sums.entry(attr.label().to_string()).or_default();
        entry.0 += 1;
        entry.1 += attr.confidence() as f64;
    }

    sums.into_iter()
        .map(|(label, (count, sum))| {
            (
                label,
                LabelStats {
                    count,
                    mean_confidence: sum / count as f64,
                },
            )
        })
        .collect()
}

/// Successful records grouped by gender label.
pub fn gender_distribution(records: &[AnalysisRecord]) -> BTreeMap<String, LabelStats> {
    label_distribution(records, Demographics::gender)
}

/// Successful records grouped by race label.
pub fn race_distribution(records: &[AnalysisRecord]) -> BTreeMap<String, LabelStats> {
    label_distribution(records, Demographics::race)
}

/// Most frequent label; ties go to the lexicographically first label.
fn most_common(distribution: &BTreeMap<String, LabelStats>) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for (label, stats) in distribution {
        match best {
            Some((_, count)) if stats.count <= count => {}
            _ => best = Some((label, stats.count)),
        }
    }
    best.map(|(label, _)| label.clone())
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn summary_statistics(records: &[AnalysisRecord]) -> SummaryStatistics {
    let ok: Vec<&AnalysisRecord> = records.iter().filter(|r| r.is_success()).collect();

    let ages: Vec<f64> = successes(records).map(|d| d.age() as f64).collect();
    let gender_conf: Vec<f64> = successes(records)
        .map(|d| d.gender().confidence() as f64)
        .collect();
    let race_conf: Vec<f64> = successes(records)
        .map(|d| d.race().confidence() as f64)
        .collect();
    let times: Vec<f64> = ok
        .iter()
        .filter_map(|r| r.processing_time_seconds())
        .collect();

    SummaryStatistics {
        count: records.len(),
        successful: ok.len(),
        age_min: successes(records).map(Demographics::age).min(),
        age_max: successes(records).map(Demographics::age).max(),
        age_mean: mean(&ages),
        age_stddev: sample_stddev(&ages),
        most_common_gender: most_common(&gender_distribution(records)),
        most_common_race: most_common(&race_distribution(records)),
        avg_gender_confidence: mean(&gender_conf),
        avg_race_confidence: mean(&race_conf),
        avg_processing_time: mean(&times),
        min_processing_time: times.iter().copied().reduce(f64::min),
        max_processing_time: times.iter().copied().reduce(f64::max),
    }
}

/// One row per record, in insertion order.
pub fn to_flat_table(records: &[AnalysisRecord]) -> Vec<FlatRow> {
    records
        .iter()
        .map(|r| FlatRow {
            source_id: r.source_id().to_string(),
            age: r.age(),
            gender_label: r.gender_label().map(str::to_string),
            gender_confidence: r.gender_confidence(),
            race_label: r.race_label().map(str::to_string),
            race_confidence: r.race_confidence(),
            status: r.status(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, RawAnalysis};
    use crate::normalize::Normalizer;

    fn ok(
        id: &str,
        age: f32,
        gender: (&str, f32),
        race: (&str, f32),
        elapsed: Option<f64>,
    ) -> AnalysisRecord {
        let raw = RawAnalysis {
            age,
            gender: vec![(gender.0.to_string(), gender.1)],
            race: vec![(race.0.to_string(), race.1)],
        };
        Normalizer::default().normalize(Ok(raw), id, elapsed)
    }

    fn failed(id: &str) -> AnalysisRecord {
        Normalizer::default().normalize(Err(ClassifierError::NoFaceDetected), id, Some(0.5))
    }

    fn scenario() -> Vec<AnalysisRecord> {
        vec![
            ok("a.jpg", 25.0, ("Man", 92.0), ("asian", 81.0), Some(1.0)),
            ok("b.jpg", 40.0, ("Woman", 88.0), ("white", 70.0), Some(3.0)),
            failed("c.jpg"),
        ]
    }

    #[test]
    fn test_scenario_age_distribution() {
        let hist = age_distribution(&scenario(), 2);
        assert_eq!(hist.bins.len(), 2);
        assert!((hist.bins[0].lower - 25.0).abs() < 1e-9);
        assert!((hist.bins[0].upper - 32.5).abs() < 1e-9);
        assert!((hist.bins[1].lower - 32.5).abs() < 1e-9);
        assert!((hist.bins[1].upper - 40.0).abs() < 1e-9);
        assert_eq!(hist.bins[0].count, 1);
        assert_eq!(hist.bins[1].count, 1);
        assert_eq!(hist.total(), 2);
    }

    #[test]
    fn test_scenario_gender_distribution() {
        let dist = gender_distribution(&scenario());
        assert_eq!(dist.len(), 2);
        assert_eq!(dist["Man"].count, 1);
        assert!((dist["Man"].mean_confidence - 92.0).abs() < 1e-6);
        assert_eq!(dist["Woman"].count, 1);
        assert!((dist["Woman"].mean_confidence - 88.0).abs() < 1e-6);
    }

    #[test]
    fn test_scenario_summary() {
        let s = summary_statistics(&scenario());
        assert_eq!(s.count, 3);
        assert_eq!(s.successful, 2);
        assert_eq!(s.age_min, Some(25));
        assert_eq!(s.age_max, Some(40));
        assert!((s.age_mean.unwrap() - 32.5).abs() < 1e-9);
        // sample stddev of [25, 40] = sqrt(112.5)
        assert!((s.age_stddev.unwrap() - 112.5f64.sqrt()).abs() < 1e-9);
        assert!((s.avg_gender_confidence.unwrap() - 90.0).abs() < 1e-6);
        assert!((s.avg_race_confidence.unwrap() - 75.5).abs() < 1e-6);
        // The failed record's 0.5s timing is excluded.
        assert!((s.avg_processing_time.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(s.min_processing_time, Some(1.0));
        assert_eq!(s.max_processing_time, Some(3.0));
        // Tie between Man and Woman resolves lexicographically.
        assert_eq!(s.most_common_gender.as_deref(), Some("Man"));
    }

    #[test]
    fn test_race_distribution_means() {
        let records = vec![
            ok("1", 20.0, ("Man", 90.0), ("black", 60.0), None),
            ok("2", 22.0, ("Man", 90.0), ("black", 80.0), None),
            ok("3", 24.0, ("Man", 90.0), ("indian", 99.0), None),
        ];
        let dist = race_distribution(&records);
        assert_eq!(dist["black"].count, 2);
        assert!((dist["black"].mean_confidence - 70.0).abs() < 1e-6);
        assert_eq!(dist["indian"].count, 1);
        assert_eq!(summary_statistics(&records).most_common_race.as_deref(), Some("black"));
    }

    #[test]
    fn test_all_failed_summary_is_not_applicable() {
        let records = vec![failed("x"), failed("y"), failed("z")];
        let s = summary_statistics(&records);
        assert_eq!(s.count, 3);
        assert_eq!(s.successful, 0);
        assert_eq!(s.age_min, None);
        assert_eq!(s.age_max, None);
        assert_eq!(s.age_mean, None);
        assert_eq!(s.age_stddev, None);
        assert_eq!(s.most_common_gender, None);
        assert_eq!(s.most_common_race, None);
        assert_eq!(s.avg_gender_confidence, None);
        assert_eq!(s.avg_race_confidence, None);
        assert_eq!(s.avg_processing_time, None);
        assert_eq!(s.min_processing_time, None);
        assert_eq!(s.max_processing_time, None);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(age_distribution(&[], 10).is_empty());
        assert!(age_distribution(&[failed("x")], 10).is_empty());
        assert!(gender_distribution(&[]).is_empty());
        assert_eq!(summary_statistics(&[]).count, 0);
        assert!(to_flat_table(&[]).is_empty());
    }

    #[test]
    fn test_age_distribution_single_age() {
        let records = vec![
            ok("1", 30.0, ("Man", 90.0), ("asian", 90.0), None),
            ok("2", 30.0, ("Man", 90.0), ("asian", 90.0), None),
        ];
        let hist = age_distribution(&records, 4);
        assert_eq!(hist.bins.len(), 4);
        assert!((hist.bins[0].lower - 29.5).abs() < 1e-9);
        assert!((hist.bins[3].upper - 30.5).abs() < 1e-9);
        assert_eq!(hist.total(), 2);
    }

    #[test]
    fn test_age_distribution_zero_bins() {
        let hist = age_distribution(&scenario(), 0);
        assert_eq!(hist.bins.len(), 1);
        assert_eq!(hist.total(), 2);
    }

    fn ages(values: impl IntoIterator<Item = u32>) -> Vec<AnalysisRecord> {
        values
            .into_iter()
            .map(|age| ok("x.jpg", age as f32, ("Man", 90.0), ("asian", 90.0), None))
            .collect()
    }

    fn contains(bin: &AgeBin, age: f64, last: bool) -> bool {
        bin.lower <= age && (age < bin.upper || (last && age <= bin.upper))
    }

    #[test]
    fn test_age_on_interior_edge_lands_in_its_bin() {
        let hist = age_distribution(&ages([0, 9, 18]), 14);
        let nine = hist
            .bins
            .iter()
            .position(|b| contains(b, 9.0, false))
            .unwrap();
        assert_eq!(hist.bins[nine].count, 1);
        assert_eq!(hist.total(), 3);
    }

    #[test]
    fn test_age_bins_count_only_ages_within_their_edges() {
        let records = ages(0..=100);
        for bins in 1..=24 {
            let hist = age_distribution(&records, bins);
            let last = hist.bins.len() - 1;
            for (i, bin) in hist.bins.iter().enumerate() {
                let expected = (0..=100u32)
                    .filter(|&a| contains(bin, a as f64, i == last))
                    .count();
                assert_eq!(bin.count, expected, "bins={bins} bin={i} {bin:?}");
            }
            assert_eq!(hist.total(), 101);
        }
    }

    #[test]
    fn test_single_success_has_no_stddev() {
        let records = vec![ok("1", 50.0, ("Woman", 70.0), ("white", 60.0), None)];
        let s = summary_statistics(&records);
        assert_eq!(s.age_mean, Some(50.0));
        assert_eq!(s.age_stddev, None);
        assert_eq!(s.avg_processing_time, None);
    }

    #[test]
    fn test_flat_table_preserves_order_and_failures() {
        let records = scenario();
        let rows = to_flat_table(&records);
        assert_eq!(rows.len(), 3);
        let ids: Vec<&str> = rows.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a.jpg", "b.jpg", "c.jpg"]);

        assert_eq!(rows[0].age, Some(25));
        assert_eq!(rows[0].gender_label.as_deref(), Some("Man"));
        assert_eq!(rows[1].race_label.as_deref(), Some("white"));

        let fail = &rows[2];
        assert_eq!(fail.status, Status::Failed);
        assert_eq!(fail.age, None);
        assert_eq!(fail.gender_label, None);
        assert_eq!(fail.gender_confidence, None);
        assert_eq!(fail.race_label, None);
        assert_eq!(fail.race_confidence, None);
    }
}
