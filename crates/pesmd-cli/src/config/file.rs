use crate::error::{CliError, Result};
use pesmd::engine::config::ScheduleMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileModelConfig {
    pub hidden_dim: Option<usize>,
    pub num_layers: Option<usize>,
    pub activation: Option<String>,
    pub dropout: Option<f64>,
}

impl FileModelConfig {
    pub fn is_empty(&self) -> bool {
        self.hidden_dim.is_none()
            && self.num_layers.is_none()
            && self.activation.is_none()
            && self.dropout.is_none()
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSchedulerConfig {
    pub mode: Option<ScheduleMode>,
    pub patience: Option<usize>,
    pub factor: Option<f64>,
    pub min_lr: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileTrainingConfig {
    pub data: Option<PathBuf>,
    pub epochs: Option<usize>,
    pub patience: Option<usize>,
    pub min_delta: Option<f64>,
    pub learning_rate: Option<f64>,
    pub weight: Option<f64>,
    pub shuffle: Option<bool>,
    pub scheduler: Option<FileSchedulerConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSimulationConfig {
    pub steps: Option<usize>,
    pub dt: Option<f64>,
    pub positions: Option<[f64; 3]>,
    pub velocities: Option<[f64; 3]>,
    pub atoms: Option<[String; 3]>,
    pub masses: Option<[f64; 3]>,
    pub grid_resolution: Option<usize>,
    pub render_plots: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub preset: Option<String>,
    pub model: Option<FileModelConfig>,
    pub training: Option<FileTrainingConfig>,
    pub simulation: Option<FileSimulationConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
