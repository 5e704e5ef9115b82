use crate::core::models::architecture::Architecture;
use crate::core::physics::constants::{AtomTriple, DomainBounds};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_SCHEDULER_THRESHOLD: f64 = 1e-4;
pub const DEFAULT_SCHEDULER_EPS: f64 = 1e-8;
pub const DEFAULT_GRID_RESOLUTION: usize = 100;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    #[default]
    Min,
    Max,
}

impl FromStr for ScheduleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(format!("expected 'min' or 'max', got '{other}'")),
        }
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "min",
            Self::Max => "max",
        })
    }
}

/// Reduce-on-plateau settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub mode: ScheduleMode,
    pub patience: usize,
    pub factor: f64,
    pub threshold: f64,
    pub min_lr: f64,
    pub eps: f64,
}

impl SchedulerConfig {
    pub fn new(mode: ScheduleMode, patience: usize, factor: f64) -> Self {
        Self {
            mode,
            patience,
            factor,
            threshold: DEFAULT_SCHEDULER_THRESHOLD,
            min_lr: 0.0,
            eps: DEFAULT_SCHEDULER_EPS,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.factor > 0.0 && self.factor < 1.0) {
            return Err(invalid(
                "scheduler_factor",
                format!("must lie in (0, 1), got {}", self.factor),
            ));
        }
        if !(self.threshold >= 0.0) || !(self.min_lr >= 0.0) || !(self.eps >= 0.0) {
            return Err(invalid("scheduler", "threshold, min_lr and eps must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub architecture: Architecture,
    pub train_data_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub epochs: usize,
    pub learning_rate: f64,
    pub weight: f64,
    pub patience: usize,
    pub min_delta: f64,
    pub scheduler: SchedulerConfig,
    pub shuffle: bool,
}

#[derive(Default)]
pub struct TrainingConfigBuilder {
    architecture: Option<Architecture>,
    train_data_path: Option<PathBuf>,
    checkpoint_path: Option<PathBuf>,
    epochs: Option<usize>,
    learning_rate: Option<f64>,
    weight: Option<f64>,
    patience: Option<usize>,
    min_delta: Option<f64>,
    scheduler: Option<SchedulerConfig>,
    shuffle: Option<bool>,
}

impl TrainingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = Some(architecture);
        self
    }
    pub fn train_data_path(mut self, path: PathBuf) -> Self {
        self.train_data_path = Some(path);
        self
    }
    pub fn checkpoint_path(mut self, path: PathBuf) -> Self {
        self.checkpoint_path = Some(path);
        self
    }
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = Some(lr);
        self
    }
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
    pub fn patience(mut self, patience: usize) -> Self {
        self.patience = Some(patience);
        self
    }
    pub fn min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = Some(min_delta);
        self
    }
    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = Some(shuffle);
        self
    }

    pub fn build(self) -> Result<TrainingConfig, ConfigError> {
        let config = TrainingConfig {
            architecture: self
                .architecture
                .ok_or(ConfigError::MissingParameter("architecture"))?,
            train_data_path: self
                .train_data_path
                .ok_or(ConfigError::MissingParameter("train_data_path"))?,
            checkpoint_path: self
                .checkpoint_path
                .ok_or(ConfigError::MissingParameter("checkpoint_path"))?,
            epochs: self.epochs.ok_or(ConfigError::MissingParameter("epochs"))?,
            learning_rate: self
                .learning_rate
                .ok_or(ConfigError::MissingParameter("learning_rate"))?,
            weight: self.weight.ok_or(ConfigError::MissingParameter("weight"))?,
            patience: self
                .patience
                .ok_or(ConfigError::MissingParameter("patience"))?,
            min_delta: self
                .min_delta
                .ok_or(ConfigError::MissingParameter("min_delta"))?,
            scheduler: self
                .scheduler
                .ok_or(ConfigError::MissingParameter("scheduler"))?,
            shuffle: self.shuffle.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(invalid("epochs", "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid(
                "learning_rate",
                format!("must be positive, got {}", self.learning_rate),
            ));
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(invalid(
                "weight",
                format!("must lie in [0, 1], got {}", self.weight),
            ));
        }
        if !(self.min_delta >= 0.0) {
            return Err(invalid(
                "min_delta",
                format!("must be non-negative, got {}", self.min_delta),
            ));
        }
        self.scheduler.validate()
    }
}

/// Starting positions (Å) and velocities (m/s) of the three atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialConditions {
    pub positions: [f64; 3],
    pub velocities: [f64; 3],
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            positions: [3.0, 0.0, -1.108],
            velocities: [-20000.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial: InitialConditions,
    pub atoms: AtomTriple,
    pub steps: usize,
    pub dt: f64,
    pub domain: DomainBounds,
    pub output_dir: PathBuf,
    pub run_name: String,
    pub grid_resolution: usize,
    pub render_plots: bool,
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    initial: Option<InitialConditions>,
    atoms: Option<AtomTriple>,
    steps: Option<usize>,
    dt: Option<f64>,
    domain: Option<DomainBounds>,
    output_dir: Option<PathBuf>,
    run_name: Option<String>,
    grid_resolution: Option<usize>,
    render_plots: Option<bool>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(mut self, initial: InitialConditions) -> Self {
        self.initial = Some(initial);
        self
    }
    pub fn atoms(mut self, atoms: AtomTriple) -> Self {
        self.atoms = Some(atoms);
        self
    }
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }
    pub fn domain(mut self, domain: DomainBounds) -> Self {
        self.domain = Some(domain);
        self
    }
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }
    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }
    pub fn grid_resolution(mut self, resolution: usize) -> Self {
        self.grid_resolution = Some(resolution);
        self
    }
    pub fn render_plots(mut self, render: bool) -> Self {
        self.render_plots = Some(render);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let config = SimulationConfig {
            initial: self.initial.unwrap_or_default(),
            atoms: self.atoms.unwrap_or_default(),
            steps: self.steps.ok_or(ConfigError::MissingParameter("steps"))?,
            dt: self.dt.ok_or(ConfigError::MissingParameter("dt"))?,
            domain: self.domain.unwrap_or_default(),
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            run_name: self
                .run_name
                .ok_or(ConfigError::MissingParameter("run_name"))?,
            grid_resolution: self.grid_resolution.unwrap_or(DEFAULT_GRID_RESOLUTION),
            render_plots: self.render_plots.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(invalid("dt", format!("must be positive, got {}", self.dt)));
        }
        let finite = |v: &[f64; 3]| v.iter().all(|x| x.is_finite());
        if !finite(&self.initial.positions) || !finite(&self.initial.velocities) {
            return Err(invalid("initial", "positions and velocities must be finite"));
        }
        if self.run_name.trim().is_empty() {
            return Err(invalid("run_name", "must not be empty"));
        }
        if self.grid_resolution < 2 {
            return Err(invalid("grid_resolution", "must be at least 2"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nn::activation::Activation;

    fn training_builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::new()
            .architecture(Architecture::new(64, 2, Activation::Mish))
            .train_data_path(PathBuf::from("input_force_filtered.csv"))
            .checkpoint_path(PathBuf::from("2-64.json"))
            .epochs(1000)
            .learning_rate(1e-3)
            .weight(0.014)
            .patience(50)
            .min_delta(1e-4)
            .scheduler(SchedulerConfig::new(ScheduleMode::Min, 10, 0.67))
    }

    #[test]
    fn complete_training_builder_succeeds() {
        let config = training_builder().build().unwrap();
        assert_eq!(config.epochs, 1000);
        assert!(config.shuffle);
        assert_eq!(config.scheduler.threshold, 1e-4);
    }

    #[test]
    fn missing_parameter_is_named() {
        let result = TrainingConfigBuilder::new()
            .architecture(Architecture::new(64, 2, Activation::Mish))
            .build();
        assert_eq!(
            result,
            Err(ConfigError::MissingParameter("train_data_path"))
        );
    }

    #[test]
    fn weight_out_of_range_is_invalid() {
        let result = training_builder().weight(1.2).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "weight",
                ..
            })
        ));
    }

    #[test]
    fn zero_epochs_is_invalid() {
        assert!(training_builder().epochs(0).build().is_err());
    }

    #[test]
    fn scheduler_factor_must_shrink() {
        assert!(training_builder()
            .scheduler(SchedulerConfig::new(ScheduleMode::Min, 10, 1.0))
            .build()
            .is_err());
    }

    #[test]
    fn schedule_mode_parses_lowercase_names() {
        assert_eq!("min".parse::<ScheduleMode>(), Ok(ScheduleMode::Min));
        assert_eq!("max".parse::<ScheduleMode>(), Ok(ScheduleMode::Max));
        assert!("Min".parse::<ScheduleMode>().is_err());
    }

    #[test]
    fn simulation_builder_applies_defaults() {
        let config = SimulationConfigBuilder::new()
            .steps(60000)
            .dt(1e-18)
            .output_dir(PathBuf::from("out"))
            .run_name("2-64")
            .build()
            .unwrap();
        assert_eq!(config.initial, InitialConditions::default());
        assert_eq!(config.atoms, AtomTriple::default());
        assert_eq!(config.grid_resolution, 100);
        assert!(config.render_plots);
    }

    #[test]
    fn non_positive_timestep_is_invalid() {
        let result = SimulationConfigBuilder::new()
            .steps(10)
            .dt(0.0)
            .output_dir(PathBuf::from("out"))
            .run_name("x")
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { parameter: "dt", .. })
        ));
    }
}
