use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub const TIME_COLUMN: &str = "Time";
pub const POTENTIAL_COLUMN: &str = "Potential";

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Trajectory '{path}' has an unexpected header: {found}")]
    MalformedHeader { path: String, found: String },
}

/// One retained step: time (s), potential and the three positions (Å).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryRow {
    pub time: f64,
    pub potential: f64,
    pub positions: [f64; 3],
}

fn io_error(path: &Path, source: std::io::Error) -> TrajectoryError {
    TrajectoryError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> TrajectoryError {
    TrajectoryError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

fn position_columns(labels: &[String; 3]) -> [String; 3] {
    [
        format!("{}(x1)", labels[0]),
        format!("{}(x2)", labels[1]),
        format!("{}(x3)", labels[2]),
    ]
}

/// Writes `Time, Potential, <l1>(x1), <l2>(x2), <l3>(x3)`.
pub fn write_trajectory_csv(
    path: &Path,
    labels: &[String; 3],
    rows: &[TrajectoryRow],
) -> Result<(), TrajectoryError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    let [c1, c2, c3] = position_columns(labels);
    writer
        .write_record([TIME_COLUMN, POTENTIAL_COLUMN, c1.as_str(), c2.as_str(), c3.as_str()])
        .map_err(|e| csv_error(path, e))?;
    for row in rows {
        writer
            .write_record([
                format_float(row.time),
                format_float(row.potential),
                format_float(row.positions[0]),
                format_float(row.positions[1]),
                format_float(row.positions[2]),
            ])
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| io_error(path, e))
}

/// Reads a trajectory CSV back, recovering the atom labels from the header.
pub fn read_trajectory_csv(
    path: &Path,
) -> Result<([String; 3], Vec<TrajectoryRow>), TrajectoryError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let malformed = || TrajectoryError::MalformedHeader {
        path: path.to_string_lossy().to_string(),
        found: headers.iter().collect::<Vec<_>>().join(","),
    };

    if headers.len() != 5 || &headers[0] != TIME_COLUMN || &headers[1] != POTENTIAL_COLUMN {
        return Err(malformed());
    }
    let mut labels: [String; 3] = Default::default();
    for (i, label) in labels.iter_mut().enumerate() {
        let suffix = format!("(x{})", i + 1);
        *label = headers[i + 2]
            .strip_suffix(&suffix)
            .ok_or_else(&malformed)?
            .to_string();
    }

    let mut rows = Vec::new();
    for record in reader.deserialize::<(f64, f64, f64, f64, f64)>() {
        let (time, potential, x1, x2, x3) = record.map_err(|e| csv_error(path, e))?;
        rows.push(TrajectoryRow {
            time,
            potential,
            positions: [x1, x2, x3],
        });
    }
    Ok((labels, rows))
}

/// Shortest round-tripping form: plain decimal for moderate magnitudes,
/// exponent form otherwise, always with a fractional part or exponent.
pub fn format_float(x: f64) -> String {
    let magnitude = x.abs();
    let mut s = if x == 0.0 || !x.is_finite() || (1e-4..1e16).contains(&magnitude) {
        x.to_string()
    } else {
        format!("{x:e}")
    };
    if x.is_finite() && !s.contains(['.', 'e']) {
        s.push_str(".0");
    }
    s
}

/// Scientific notation with a signed two-digit exponent, e.g. `1.00000e-18`.
pub fn format_time(seconds: f64) -> String {
    let formatted = format!("{seconds:.5e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            Err(_) => formatted,
        },
        None => formatted,
    }
}

/// Multi-frame XYZ: the atoms lie on the x axis.
pub fn write_xyz(
    path: &Path,
    labels: &[String; 3],
    rows: &[TrajectoryRow],
) -> Result<(), TrajectoryError> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut w = BufWriter::new(file);
    for row in rows {
        writeln!(w, "3").map_err(|e| io_error(path, e))?;
        writeln!(w, "Time = {} seconds", format_time(row.time)).map_err(|e| io_error(path, e))?;
        for (label, x) in labels.iter().zip(row.positions) {
            writeln!(w, "{label} {} 0 0", format_float(x)).map_err(|e| io_error(path, e))?;
        }
    }
    w.flush().map_err(|e| io_error(path, e))
}
