use crate::core::nn::activation::{Activation, UnknownActivation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const INPUT_DIM: usize = 2;
pub const OUTPUT_DIM: usize = 1;

const TIMESTAMP_DATE_DIGITS: usize = 8;
const TIMESTAMP_TIME_DIGITS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ArchitectureError {
    #[error("Number of layers must be at least 1 (got {0})")]
    TooFewLayers(usize),
    #[error("Dimension '{name}' must be positive")]
    ZeroDimension { name: &'static str },
    #[error("Input dimension must be 2 for a distance-pair surface (got {0})")]
    InputDimension(usize),
    #[error("Output dimension must be 1 for a scalar energy head (got {0})")]
    NonScalarOutput(usize),
    #[error("Dropout ratio must lie in [0, 1) (got {0})")]
    InvalidDropout(String),
    #[error(transparent)]
    Activation(#[from] UnknownActivation),
}

/// Shape and nonlinearity of a surrogate network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub output_dim: usize,
    pub activation: Activation,
    #[serde(default)]
    pub dropout: f64,
}

/// The subset of an architecture that can be recovered from a model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchitectureOverride {
    pub num_layers: usize,
    pub hidden_dim: usize,
    pub activation: Activation,
}

impl Architecture {
    pub fn new(hidden_dim: usize, num_layers: usize, activation: Activation) -> Self {
        Self {
            input_dim: INPUT_DIM,
            hidden_dim,
            num_layers,
            output_dim: OUTPUT_DIM,
            activation,
            dropout: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn validate(&self) -> Result<(), ArchitectureError> {
        if self.num_layers < 1 {
            return Err(ArchitectureError::TooFewLayers(self.num_layers));
        }
        if self.input_dim == 0 {
            return Err(ArchitectureError::ZeroDimension { name: "input_dim" });
        }
        if self.input_dim != INPUT_DIM {
            return Err(ArchitectureError::InputDimension(self.input_dim));
        }
        if self.hidden_dim == 0 {
            return Err(ArchitectureError::ZeroDimension { name: "hidden_dim" });
        }
        if self.output_dim != OUTPUT_DIM {
            return Err(ArchitectureError::NonScalarOutput(self.output_dim));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ArchitectureError::InvalidDropout(self.dropout.to_string()));
        }
        Ok(())
    }

    /// Returns a new architecture with the name-derived fields replaced.
    pub fn with_override(&self, ovr: &ArchitectureOverride) -> Self {
        Self {
            hidden_dim: ovr.hidden_dim,
            num_layers: ovr.num_layers,
            activation: ovr.activation,
            ..*self
        }
    }

    /// Canonical `<num_layers>-<hidden_dim>-<activation>` stem.
    pub fn stem(&self) -> String {
        format!("{}-{}-{}", self.num_layers, self.hidden_dim, self.activation)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} ({} -> {})",
            self.num_layers, self.hidden_dim, self.activation, self.input_dim, self.output_dim
        )
    }
}

impl ArchitectureOverride {
    /// Parses `<num_layers>-<hidden_dim>-<activation>`, optionally followed by
    /// a `-YYYYMMDD-HHMMSS` timestamp. Anything else yields `None`.
    pub fn from_stem(stem: &str) -> Option<Self> {
        let stem = strip_timestamp_suffix(stem);
        let mut parts = stem.splitn(3, '-');
        let num_layers = parse_digits(parts.next()?)?;
        let hidden_dim = parse_digits(parts.next()?)?;
        let name = parts.next()?;
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let activation = name.parse::<Activation>().ok()?;
        Some(Self {
            num_layers,
            hidden_dim,
            activation,
        })
    }
}

/// Removes a trailing `-YYYYMMDD-HHMMSS` suffix if present.
pub fn strip_timestamp_suffix(stem: &str) -> &str {
    let suffix_len = 1 + TIMESTAMP_DATE_DIGITS + 1 + TIMESTAMP_TIME_DIGITS;
    if stem.len() < suffix_len || !stem.is_char_boundary(stem.len() - suffix_len) {
        return stem;
    }
    let (head, suffix) = stem.split_at(stem.len() - suffix_len);
    let bytes = suffix.as_bytes();
    let is_timestamp = bytes[0] == b'-'
        && bytes[1..=TIMESTAMP_DATE_DIGITS]
            .iter()
            .all(u8::is_ascii_digit)
        && bytes[1 + TIMESTAMP_DATE_DIGITS] == b'-'
        && bytes[2 + TIMESTAMP_DATE_DIGITS..]
            .iter()
            .all(u8::is_ascii_digit);
    if is_timestamp { head } else { stem }
}

fn parse_digits(s: &str) -> Option<usize> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
