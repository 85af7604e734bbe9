//! Plain-text rendering of records, statistics and distributions.

use facetally_core::report::{AgeHistogram, LabelStats, SummaryStatistics};
use facetally_core::{AnalysisRecord, ScoreMap, SessionStats};
use std::collections::BTreeMap;

const NOT_APPLICABLE: &str = "N/A";

fn or_na<T>(value: Option<T>, fmt: impl Fn(T) -> String) -> String {
    value.map(fmt).unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

fn seconds(t: f64) -> String {
    format!("{t:.2}s")
}

fn percent(p: f64) -> String {
    format!("{p:.1}%")
}

/// Join lines into a block, each line newline-terminated.
fn block(lines: Vec<String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}

fn scores(lines: &mut Vec<String>, title: &str, scores: &ScoreMap) {
    lines.push(format!("    {title}:"));
    lines.extend(
        scores
            .iter()
            .map(|(name, score)| format!("      • {name}: {score:.1}%")),
    );
}

/// Detailed per-image result: age, labels with confidence and every score.
pub fn record(record: &AnalysisRecord) -> String {
    let Some(d) = record.demographics() else {
        let reason = record.failure().map(|(_, r)| r).unwrap_or_default();
        return block(vec![format!("✗ {}: {reason}", record.source_id())]);
    };

    let mut lines = vec![
        format!("✓ {}", record.source_id()),
        format!("    Age: {} years", d.age()),
        format!(
            "    Gender: {} ({:.1}% confidence)",
            d.gender().label(),
            d.gender().confidence()
        ),
        format!(
            "    Race/Ethnicity: {} ({:.1}% confidence)",
            d.race().label(),
            d.race().confidence()
        ),
        format!(
            "    Analyzed at: {}",
            record.captured_at().format("%Y-%m-%d %H:%M:%S UTC")
        ),
    ];
    scores(&mut lines, "Gender scores", d.gender().scores());
    scores(&mut lines, "Race scores", d.race().scores());
    block(lines)
}

pub fn performance(stats: &SessionStats) -> String {
    block(vec![
        "Performance".to_string(),
        format!("  Total processed:     {}", stats.total_processed),
        format!(
            "  Avg processing time: {}",
            or_na(stats.avg_processing_time, seconds)
        ),
        format!(
            "  Success rate:        {}",
            or_na(stats.success_rate, |r| percent(r * 100.0))
        ),
    ])
}

pub fn summary(s: &SummaryStatistics) -> String {
    let range = match (s.age_min, s.age_max) {
        (Some(lo), Some(hi)) => format!("{lo}-{hi}"),
        _ => NOT_APPLICABLE.to_string(),
    };
    block(vec![
        "Summary".to_string(),
        format!("  Total images:          {}", s.count),
        format!("  Successful:            {}", s.successful),
        format!("  Age range:             {range}"),
        format!(
            "  Average age:           {}",
            or_na(s.age_mean, |a| format!("{a:.1} years"))
        ),
        format!(
            "  Age std dev:           {}",
            or_na(s.age_stddev, |a| format!("{a:.1}"))
        ),
        format!(
            "  Most common gender:    {}",
            s.most_common_gender.as_deref().unwrap_or(NOT_APPLICABLE)
        ),
        format!(
            "  Avg gender confidence: {}",
            or_na(s.avg_gender_confidence, percent)
        ),
        format!(
            "  Most common race:      {}",
            s.most_common_race.as_deref().unwrap_or(NOT_APPLICABLE)
        ),
        format!(
            "  Avg race confidence:   {}",
            or_na(s.avg_race_confidence, percent)
        ),
        format!(
            "  Processing time:       avg {} / min {} / max {}",
            or_na(s.avg_processing_time, seconds),
            or_na(s.min_processing_time, seconds),
            or_na(s.max_processing_time, seconds),
        ),
    ])
}

pub fn age_histogram(hist: &AgeHistogram) -> String {
    let mut lines = vec!["Age distribution".to_string()];
    if hist.is_empty() {
        lines.push(format!("  {NOT_APPLICABLE}"));
        return block(lines);
    }
    let widest = hist.bins.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    lines.extend(hist.bins.iter().map(|bin| {
        let bar = "#".repeat(bin.count * 30 / widest);
        format!(
            "  {:>5.1}–{:<5.1} {:>4} {bar}",
            bin.lower, bin.upper, bin.count
        )
    }));
    block(lines)
}

pub fn distribution(title: &str, dist: &BTreeMap<String, LabelStats>) -> String {
    let mut lines = vec![title.to_string()];
    if dist.is_empty() {
        lines.push(format!("  {NOT_APPLICABLE}"));
        return block(lines);
    }
    lines.extend(dist.iter().map(|(label, stats)| {
        format!(
            "  {label:<16} {:>4}  (avg confidence {:.1}%)",
            stats.count, stats.mean_confidence
        )
    }));
    block(lines)
}
