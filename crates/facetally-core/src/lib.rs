//! facetally-core — Demographic analysis records and their aggregation.
//!
//! Turns per-image classifier answers into canonical records, keeps them in
//! an append-only session with running statistics, and derives distributions,
//! summaries and CSV exports from them.

pub mod accumulator;
pub mod batch;
pub mod categories;
pub mod classifier;
pub mod export;
pub mod normalize;
pub mod report;
pub mod session;
pub mod types;

pub use accumulator::{Accumulator, SessionStats, SharedAccumulator};
pub use categories::{argmax, Categories, ScoreMap};
pub use classifier::{Classifier, ClassifierError, RawAnalysis};
pub use normalize::Normalizer;
pub use session::AnalysisSession;
pub use types::{AnalysisRecord, Attribute, Demographics, FailureKind, Outcome, Status};
