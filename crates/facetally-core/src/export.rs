//! CSV export of analysis results.
//!
//! Two fixed layouts: the flat table of [`to_flat_table`](crate::report::to_flat_table),
//! and the batch-mode layout where failed images carry the literal `Error`.

use crate::report::FlatRow;
use crate::types::AnalysisRecord;
use std::io;
use thiserror::Error;

/// Header of the flat-table export. Order and names are fixed.
pub const FLAT_TABLE_HEADER: [&str; 6] = [
    "Filename",
    "Age",
    "Gender",
    "Gender Confidence",
    "Race/Ethnicity",
    "Race Confidence",
];

/// Header of the batch-mode output file. Order and names are fixed.
pub const BATCH_HEADER: [&str; 4] = ["Filename", "Gender", "Race/Ethnicity", "Age"];

/// Placeholder written in every demographic cell of a failed batch row.
pub const ERROR_PLACEHOLDER: &str = "Error";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write flat rows as CSV. Failed rows leave demographic cells empty.
pub fn write_flat_table<W: io::Write>(rows: &[FlatRow], writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(FLAT_TABLE_HEADER)?;
    for row in rows {
        wtr.write_record([
            row.source_id.clone(),
            cell(row.age),
            cell(row.gender_label.as_deref()),
            cell(row.gender_confidence),
            cell(row.race_label.as_deref()),
            cell(row.race_confidence),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render the flat table into an in-memory CSV document.
pub fn flat_table_to_string(rows: &[FlatRow]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_flat_table(rows, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Write the batch-mode layout: one row per record, `Error` in every
/// demographic cell of a failed record.
pub fn write_batch_rows<W: io::Write>(
    records: &[AnalysisRecord],
    writer: W,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(BATCH_HEADER)?;
    for record in records {
        let row = match record.demographics() {
            Some(d) => [
                record.source_id().to_string(),
                d.gender().label().to_string(),
                d.race().label().to_string(),
                d.age().to_string(),
            ],
            None => [
                record.source_id().to_string(),
                ERROR_PLACEHOLDER.to_string(),
                ERROR_PLACEHOLDER.to_string(),
                ERROR_PLACEHOLDER.to_string(),
            ],
        };
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, RawAnalysis};
    use crate::normalize::Normalizer;
    use crate::report::to_flat_table;

    fn records() -> Vec<AnalysisRecord> {
        let n = Normalizer::default();
        vec![
            n.normalize(
                Ok(RawAnalysis {
                    age: 25.0,
                    gender: vec![("Man".into(), 92.5)],
                    race: vec![("latino hispanic".into(), 81.0)],
                }),
                "a, b.jpg",
                Some(1.0),
            ),
            n.normalize(Err(ClassifierError::NoFaceDetected), "c.jpg", None),
        ]
    }

    #[test]
    fn test_flat_table_csv() {
        let csv = flat_table_to_string(&to_flat_table(&records())).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Filename,Age,Gender,Gender Confidence,Race/Ethnicity,Race Confidence"
        );
        assert_eq!(lines[1], "\"a, b.jpg\",25,Man,92.5,latino hispanic,81");
        assert_eq!(lines[2], "c.jpg,,,,,");
    }

    #[test]
    fn test_batch_rows_csv() {
        let mut buf = Vec::new();
        write_batch_rows(&records(), &mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Filename,Gender,Race/Ethnicity,Age");
        assert_eq!(lines[1], "\"a, b.jpg\",Man,latino hispanic,25");
        assert_eq!(lines[2], "c.jpg,Error,Error,Error");
    }

    #[test]
    fn test_empty_flat_table_has_header_only() {
        let csv = flat_table_to_string(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
