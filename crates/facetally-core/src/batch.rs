//! Directory batch mode: classify every image in a folder and write one CSV
//! row per image.

use crate::accumulator::{Accumulator, SessionStats};
use crate::classifier::Classifier;
use crate::export::{self, ExportError};
use crate::session::AnalysisSession;
use crate::types::AnalysisRecord;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Accepted image extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("image folder '{0}' not found")]
    SourceNotFound(PathBuf),
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to list '{path}': {source}")]
    ListDir { path: PathBuf, source: io::Error },
    #[error("failed to create '{path}': {source}")]
    CreateOutput { path: PathBuf, source: io::Error },
    #[error("failed to write '{path}': {source}")]
    WriteOutput { path: PathBuf, source: ExportError },
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    Started { total: usize },
    Processing { index: usize, total: usize, source_id: &'a str },
    Finished { record: &'a AnalysisRecord },
}

#[derive(Debug)]
pub struct BatchReport {
    /// Records produced by this batch, in processing order.
    pub records: Vec<AnalysisRecord>,
    /// Statistics over `records` only, regardless of earlier session use.
    pub stats: SessionStats,
    /// Output file written; `None` when the folder held no images.
    pub output: Option<PathBuf>,
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// List image files directly inside `dir`, sorted by file name.
///
/// A missing or non-directory source is an error; an empty listing is not.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !dir.exists() {
        return Err(BatchError::SourceNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(BatchError::NotADirectory(dir.to_path_buf()));
    }

    let list_err = |source| BatchError::ListDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// Classify every image in `dir` and write the batch CSV to `output`.
///
/// Images are processed in file-name order (see [`list_images`]), so the
/// row order is deterministic regardless of the filesystem's listing order.
/// Structural problems (missing folder, unwritable output) fail before any
/// image is classified. Per-image failures become `Error` rows.
pub fn run_batch<C, F>(
    session: &mut AnalysisSession<C>,
    dir: &Path,
    output: &Path,
    mut on_event: F,
) -> Result<BatchReport, BatchError>
where
    C: Classifier,
    F: FnMut(BatchEvent<'_>),
{
    let images = list_images(dir)?;
    if images.is_empty() {
        tracing::info!(dir = %dir.display(), "no image files found");
        return Ok(BatchReport {
            records: Vec::new(),
            stats: SessionStats::default(),
            output: None,
        });
    }

    let file = File::create(output).map_err(|source| BatchError::CreateOutput {
        path: output.to_path_buf(),
        source,
    })?;

    let total = images.len();
    tracing::info!(dir = %dir.display(), total, "batch started");
    on_event(BatchEvent::Started { total });

    let first = session.records().len();
    for (i, path) in images.iter().enumerate() {
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        on_event(BatchEvent::Processing {
            index: i + 1,
            total,
            source_id: &source_id,
        });
        let record = session.analyze_as(source_id.as_str(), path);
        on_event(BatchEvent::Finished { record });
    }

    let records = session.records()[first..].to_vec();
    export::write_batch_rows(&records, BufWriter::new(file)).map_err(|source| {
        BatchError::WriteOutput {
            path: output.to_path_buf(),
            source,
        }
    })?;

    let mut batch = Accumulator::new();
    for record in &records {
        batch.append(record.clone());
    }
    let stats = batch.stats();
    tracing::info!(
        output = %output.display(),
        rows = records.len(),
        succeeded = stats.success_count,
        "batch written"
    );

    Ok(BatchReport {
        records,
        stats,
        output: Some(output.to_path_buf()),
    })
}
