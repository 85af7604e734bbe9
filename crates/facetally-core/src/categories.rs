//! Category vocabularies, ordered score maps and dominant-label selection.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Gender categories in canonical order.
pub const GENDER_CATEGORIES: [&str; 2] = ["Woman", "Man"];

/// Race categories in canonical order.
pub const RACE_CATEGORIES: [&str; 6] = [
    "asian",
    "indian",
    "black",
    "white",
    "middle eastern",
    "latino hispanic",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("no classification scores returned")]
    Empty,
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("duplicate category '{0}'")]
    DuplicateCategory(String),
    #[error("score for '{category}' out of range [0, 100]: {value}")]
    OutOfRange { category: String, value: f32 },
}

/// The fixed gender and race vocabularies of a session.
///
/// The order of each list is the canonical order used for tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categories {
    gender: Vec<String>,
    race: Vec<String>,
}

impl Categories {
    pub fn new(gender: Vec<String>, race: Vec<String>) -> Self {
        Self { gender, race }
    }

    pub fn gender(&self) -> &[String] {
        &self.gender
    }

    pub fn race(&self) -> &[String] {
        &self.race
    }
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            gender: GENDER_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            race: RACE_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Category → confidence mapping, kept in canonical vocabulary order.
///
/// Every score lies in [0, 100].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreMap {
    entries: Vec<(String, f32)>,
}

impl ScoreMap {
    /// Re-key a raw classifier mapping into `vocabulary` order.
    ///
    /// Categories the classifier did not report score 0. Categories outside
    /// the vocabulary, duplicates and out-of-range values are rejected.
    pub fn from_raw(vocabulary: &[String], raw: &[(String, f32)]) -> Result<Self, ScoreError> {
        if raw.is_empty() {
            return Err(ScoreError::Empty);
        }

        let mut slots: Vec<Option<f32>> = vec![None; vocabulary.len()];
        for (category, value) in raw {
            let pos = vocabulary
                .iter()
                .position(|v| v == category)
                .ok_or_else(|| ScoreError::UnknownCategory(category.clone()))?;
            // NaN fails the range check too.
            if !(0.0..=100.0).contains(value) {
                return Err(ScoreError::OutOfRange {
                    category: category.clone(),
                    value: *value,
                });
            }
            if slots[pos].replace(*value).is_some() {
                return Err(ScoreError::DuplicateCategory(category.clone()));
            }
        }

        let entries = vocabulary
            .iter()
            .zip(slots)
            .map(|(name, score)| (name.clone(), score.unwrap_or(0.0)))
            .collect();
        Ok(Self { entries })
    }

    pub fn get(&self, category: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.entries.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-scoring category, first in canonical order on ties.
    pub fn dominant(&self) -> Option<(&str, f32)> {
        argmax(self.iter())
    }
}

impl Serialize for ScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, score) in &self.entries {
            map.serialize_entry(name, score)?;
        }
        map.end()
    }
}

/// Return the key with the maximal value.
///
/// Only a strictly greater value replaces the current best, so ties resolve
/// to the first key yielded by the iterator. Returns `None` for empty input.
pub fn argmax<'a, I>(scores: I) -> Option<(&'a str, f32)>
where
    I: IntoIterator<Item = (&'a str, f32)>,
{
    let mut best: Option<(&'a str, f32)> = None;
    for (key, value) in scores {
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((key, value)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, f32)]) -> Vec<(String, f32)> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_argmax_picks_highest() {
        let scores = [("a", 10.0), ("b", 70.0), ("c", 20.0)];
        assert_eq!(argmax(scores), Some(("b", 70.0)));
    }

    #[test]
    fn test_argmax_tie_prefers_first() {
        let scores = [("a", 50.0), ("b", 50.0)];
        assert_eq!(argmax(scores), Some(("a", 50.0)));
    }

    #[test]
    fn test_argmax_empty() {
        assert_eq!(argmax(std::iter::empty()), None);
    }

    #[test]
    fn test_score_map_canonical_order() {
        let cats = Categories::default();
        let scores = raw(&[("Man", 40.0), ("Woman", 60.0)]);
        let map = ScoreMap::from_raw(cats.gender(), &scores).unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Woman", "Man"]);
    }

    #[test]
    fn test_score_map_tie_uses_canonical_order_not_input_order() {
        let cats = Categories::default();
        // Input lists Man first; canonical order lists Woman first.
        let scores = raw(&[("Man", 50.0), ("Woman", 50.0)]);
        let map = ScoreMap::from_raw(cats.gender(), &scores).unwrap();
        assert_eq!(map.dominant(), Some(("Woman", 50.0)));
    }

    #[test]
    fn test_score_map_fills_missing_with_zero() {
        let cats = Categories::default();
        let map = ScoreMap::from_raw(cats.race(), &raw(&[("white", 70.0)])).unwrap();
        assert_eq!(map.len(), RACE_CATEGORIES.len());
        assert_eq!(map.get("asian"), Some(0.0));
        assert_eq!(map.dominant(), Some(("white", 70.0)));
    }

    #[test]
    fn test_score_map_rejects_empty() {
        let cats = Categories::default();
        assert_eq!(ScoreMap::from_raw(cats.gender(), &[]), Err(ScoreError::Empty));
    }

    #[test]
    fn test_score_map_rejects_unknown_category() {
        let cats = Categories::default();
        let err = ScoreMap::from_raw(cats.gender(), &raw(&[("Other", 10.0)])).unwrap_err();
        assert_eq!(err, ScoreError::UnknownCategory("Other".into()));
    }

    #[test]
    fn test_score_map_rejects_out_of_range() {
        let cats = Categories::default();
        assert!(ScoreMap::from_raw(cats.gender(), &raw(&[("Man", 100.5)])).is_err());
        assert!(ScoreMap::from_raw(cats.gender(), &raw(&[("Man", -1.0)])).is_err());
        assert!(ScoreMap::from_raw(cats.gender(), &raw(&[("Man", f32::NAN)])).is_err());
    }

    #[test]
    fn test_score_map_rejects_duplicate() {
        let cats = Categories::default();
        let scores = raw(&[("Man", 10.0), ("Man", 20.0)]);
        let err = ScoreMap::from_raw(cats.gender(), &scores).unwrap_err();
        assert_eq!(err, ScoreError::DuplicateCategory("Man".into()));
    }

    #[test]
    fn test_score_map_serializes_in_order() {
        let cats = Categories::default();
        let scores = raw(&[("Man", 92.0), ("Woman", 8.0)]);
        let map = ScoreMap::from_raw(cats.gender(), &scores).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Woman":8.0,"Man":92.0}"#);
    }
}
