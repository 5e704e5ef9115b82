use pesmd::core::models::architecture::Architecture;
use pesmd::core::nn::activation::Activation;
use pesmd::engine::config::ScheduleMode;

pub const DEFAULT_PRESET: &str = "2-64";

/// A named model and optimiser setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub activation: Activation,
    pub learning_rate: f64,
    pub weight: f64,
}

impl Preset {
    pub fn architecture(&self) -> Architecture {
        Architecture::new(self.hidden_dim, self.num_layers, self.activation)
    }
}

pub const PRESETS: [Preset; 2] = [
    Preset {
        name: "2-64",
        hidden_dim: 64,
        num_layers: 2,
        activation: Activation::Mish,
        learning_rate: 0.001,
        weight: 0.014,
    },
    Preset {
        name: "3-32",
        hidden_dim: 32,
        num_layers: 3,
        activation: Activation::Mish,
        learning_rate: 0.001,
        weight: 0.014,
    },
];

pub fn find_preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.name).collect()
}

/// Values used when neither the command line, the config file nor the
/// preset sets them.
pub struct DefaultsConfig {
    pub train_data: &'static str,
    pub epochs: usize,
    pub patience: usize,
    pub min_delta: f64,
    pub scheduler_mode: ScheduleMode,
    pub scheduler_patience: usize,
    pub scheduler_factor: f64,
    pub shuffle: bool,
    pub steps: usize,
    pub dt: f64,
    pub grid_resolution: usize,
    pub seed: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            train_data: "input_force_filtered.csv",
            epochs: 1000,
            patience: 50,
            min_delta: 1e-4,
            scheduler_mode: ScheduleMode::Min,
            scheduler_patience: 10,
            scheduler_factor: 0.67,
            shuffle: true,
            steps: 60000,
            dt: 1e-18,
            grid_resolution: 100,
            seed: 42,
        }
    }
}
