use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
}

/// One line of `summary.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub config: String,
    pub r2: f64,
}

fn csv_error(path: &Path, source: csv::Error) -> ReportError {
    ReportError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

/// Writes `records` as a headed CSV table, one row per record.
pub fn write_csv_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for record in records {
        writer.serialize(record).map_err(|e| csv_error(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| csv_error(path, csv::Error::from(e)))?;
    Ok(())
}

pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<(), ReportError> {
    write_csv_records(path, rows)
}
