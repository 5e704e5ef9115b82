use thiserror::Error;

use super::config::ConfigError;
use crate::core::context::ContextError;
use crate::core::io::checkpoint::CheckpointError;
use crate::core::io::dataset::DatasetError;
use crate::core::io::plot::PlotError;
use crate::core::io::report::ReportError;
use crate::core::io::trajectory::TrajectoryError;
use crate::core::models::architecture::ArchitectureError;
use crate::core::nn::loss::InvalidLossWeight;
use crate::core::physics::constants::AtomError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Invalid architecture: {source}")]
    Architecture {
        #[from]
        source: ArchitectureError,
    },

    #[error("Invalid loss configuration: {source}")]
    Loss {
        #[from]
        source: InvalidLossWeight,
    },

    #[error("Invalid atom definition: {source}")]
    Atoms {
        #[from]
        source: AtomError,
    },

    #[error("Execution context error: {source}")]
    Context {
        #[from]
        source: ContextError,
    },

    #[error("Failed to load training data: {source}")]
    Dataset {
        #[from]
        source: DatasetError,
    },

    #[error("Checkpoint error: {source}")]
    Checkpoint {
        #[from]
        source: CheckpointError,
    },

    #[error("Trajectory output failed: {source}")]
    Trajectory {
        #[from]
        source: TrajectoryError,
    },

    #[error("Plotting failed: {source}")]
    Plot {
        #[from]
        source: PlotError,
    },

    #[error("Failed to write report: {source}")]
    Report {
        #[from]
        source: ReportError,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Training dataset is empty")]
    EmptyDataset,

    #[error("Model maps {input_dim} inputs to {output_dim} outputs; expected 2 -> 1")]
    IncompatibleModel { input_dim: usize, output_dim: usize },

    #[error("Loss became non-finite at epoch {epoch}, sample {sample}")]
    NonFiniteLoss { epoch: usize, sample: usize },

    #[error("No model checkpoint found in '{dir}'")]
    MissingArtifact { dir: String },
}

impl EngineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}
