use crate::core::models::sample::{Dataset, DistancePair, Sample};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 6] = ["x", "y", "z1", "z2", "z3", "z4"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Training data '{path}' is missing required column '{column}'")]
    MissingColumn { path: String, column: &'static str },
    #[error("Training data '{path}' contains no samples")]
    Empty { path: String },
}

/// `x, y` are `r12, r23`; `z1` is the energy; `z2..z4` the target forces.
#[derive(Debug, Deserialize)]
struct TrainingRecord {
    x: f64,
    y: f64,
    z1: f64,
    z2: f64,
    z3: f64,
    z4: f64,
}

impl From<TrainingRecord> for Sample {
    fn from(r: TrainingRecord) -> Self {
        Sample {
            coords: DistancePair::new(r.x, r.y),
            energy: r.z1,
            forces: [r.z2, r.z3, r.z4],
        }
    }
}

/// Loads the training CSV. Extra columns are ignored.
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let path_str = || path.to_string_lossy().to_string();
    let file = File::open(path).map_err(|e| DatasetError::Io {
        path: path_str(),
        source: e,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let headers = reader.headers().map_err(|e| DatasetError::Csv {
        path: path_str(),
        source: e,
    })?;
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(DatasetError::Empty { path: path_str() });
    }
    if let Some(column) = REQUIRED_COLUMNS
        .into_iter()
        .find(|c| !headers.iter().any(|h| h == *c))
    {
        return Err(DatasetError::MissingColumn {
            path: path_str(),
            column,
        });
    }

    let mut samples = Vec::new();
    for result in reader.deserialize::<TrainingRecord>() {
        let record = result.map_err(|e| DatasetError::Csv {
            path: path_str(),
            source: e,
        })?;
        samples.push(Sample::from(record));
    }

    if samples.is_empty() {
        return Err(DatasetError::Empty { path: path_str() });
    }
    Ok(Dataset::new(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_dataset_reads_all_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(
            &path,
            "x,y,z1,z2,z3,z4\n1.0,2.0,0.5,0.1,0.2,-0.3\n1.5,2.5,0.6,0.0,0.0,0.0\n",
        )
        .unwrap();
        let data = load_dataset(&path).unwrap();
        assert_eq!(data.len(), 2);
        let first = data.samples()[0];
        assert_eq!(first.coords, DistancePair::new(1.0, 2.0));
        assert_eq!(first.energy, 0.5);
        assert_eq!(first.forces, [0.1, 0.2, -0.3]);
    }

    #[test]
    fn extra_columns_and_reordering_are_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "id,z4,z3,z2,z1,y,x\n7,3,2,1,0.5,0.25,0.75\n").unwrap();
        let data = load_dataset(&path).unwrap();
        assert_eq!(data.samples()[0].forces, [1.0, 2.0, 3.0]);
        assert_eq!(data.samples()[0].coords, DistancePair::new(0.75, 0.25));
    }

    #[test]
    fn missing_column_is_named() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "x,y,z1,z2,z3\n1,2,3,4,5\n").unwrap();
        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { column: "z4", .. }));
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "x,y,z1,z2,z3,z4\n").unwrap();
        assert!(matches!(load_dataset(&path), Err(DatasetError::Empty { .. })));
    }

    #[test]
    fn zero_byte_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "").unwrap();
        assert!(matches!(load_dataset(&path), Err(DatasetError::Empty { .. })));
    }

    #[test]
    fn missing_file_reports_io_error_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
        assert!(err.to_string().contains("absent.csv"));
    }

    #[test]
    fn malformed_value_is_a_csv_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(&path, "x,y,z1,z2,z3,z4\n1,2,abc,4,5,6\n").unwrap();
        assert!(matches!(load_dataset(&path), Err(DatasetError::Csv { .. })));
    }
}
