mod defaults;
mod file;

pub use defaults::{DEFAULT_PRESET, DefaultsConfig, PRESETS, Preset, find_preset, preset_names};

use crate::cli::{ConfigArgs, SimulateArgs, TrainArgs, VisualizeArgs};
use crate::error::{CliError, Result};
use file::{FileConfig, FileModelConfig};
use pesmd::core::io::checkpoint::CHECKPOINT_EXTENSION;
use pesmd::core::models::architecture::Architecture;
use pesmd::core::nn::activation::Activation;
use pesmd::core::physics::constants::AtomTriple;
use pesmd::engine::config::{
    InitialConditions, SchedulerConfig, TrainingConfig, TrainingConfigBuilder,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const FALLBACK_CHECKPOINT_STEM: &str = "model";

/// Checkpoint file name used inside a model directory: `<dir name>.json`.
pub fn checkpoint_name_for(dir: &Path) -> String {
    let stem = dir
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_CHECKPOINT_STEM);
    format!("{stem}.{CHECKPOINT_EXTENSION}")
}

#[derive(Debug)]
pub struct TrainSetup {
    pub preset: &'static str,
    pub output_dir: PathBuf,
    pub training: TrainingConfig,
}

#[derive(Debug)]
pub struct VisualizeSetup {
    /// Only set when a preset or model section was given explicitly.
    pub architecture: Option<Architecture>,
    pub data: PathBuf,
    pub grid_resolution: usize,
}

#[derive(Debug)]
pub struct SimulateSetup {
    pub architecture: Option<Architecture>,
    pub initial: InitialConditions,
    pub atoms: AtomTriple,
    pub steps: usize,
    pub dt: f64,
    pub grid_resolution: usize,
    pub render_plots: bool,
}

/// File values (with `--set` applied) and the selected preset.
struct Layers {
    file: FileConfig,
    preset: &'static Preset,
    explicit_model: bool,
}

fn load_layers(args: &ConfigArgs) -> Result<Layers> {
    let file = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let file = apply_set_values(file, &args.set_values)?;

    let name = args.preset.as_deref().or(file.preset.as_deref());
    let preset = resolve_preset(name)?;
    let explicit_model = name.is_some() || file.model.as_ref().is_some_and(|m| !m.is_empty());
    debug!(preset = preset.name, explicit_model, "Configuration layers loaded.");
    Ok(Layers {
        file,
        preset,
        explicit_model,
    })
}

fn resolve_preset(name: Option<&str>) -> Result<&'static Preset> {
    let name = name.unwrap_or(DEFAULT_PRESET);
    find_preset(name).ok_or_else(|| {
        CliError::Config(format!(
            "Unknown preset '{}'. Available presets: {}",
            name,
            preset_names().join(", ")
        ))
    })
}

fn merge_architecture(
    cli_hidden_dim: Option<usize>,
    cli_num_layers: Option<usize>,
    cli_activation: Option<&str>,
    file: &FileModelConfig,
    preset: &Preset,
) -> Result<Architecture> {
    let activation = match cli_activation.or(file.activation.as_deref()) {
        Some(name) => Activation::from_str(name).map_err(|e| CliError::Config(e.to_string()))?,
        None => preset.activation,
    };
    let architecture = Architecture::new(
        cli_hidden_dim.or(file.hidden_dim).unwrap_or(preset.hidden_dim),
        cli_num_layers.or(file.num_layers).unwrap_or(preset.num_layers),
        activation,
    )
    .with_dropout(file.dropout.unwrap_or(0.0));
    architecture
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(architecture)
}

/// Resolves every training setting. `timestamp` names the output directory
/// when `--out` is absent.
pub fn build_train_config(args: &TrainArgs, timestamp: &str) -> Result<TrainSetup> {
    let defaults = DefaultsConfig::default();
    let mut layers = load_layers(&args.config)?;
    let model_file = layers.file.model.take().unwrap_or_default();
    let training_file = layers.file.training.take().unwrap_or_default();
    let scheduler_file = training_file.scheduler.clone().unwrap_or_default();
    let preset = layers.preset;

    let architecture = merge_architecture(
        args.hidden_dim,
        args.num_layers,
        args.activation.as_deref(),
        &model_file,
        preset,
    )?;

    let output_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}-{}", architecture.stem(), timestamp)));
    let checkpoint_path = output_dir.join(checkpoint_name_for(&output_dir));

    let mut scheduler = SchedulerConfig::new(
        scheduler_file.mode.unwrap_or(defaults.scheduler_mode),
        scheduler_file
            .patience
            .unwrap_or(defaults.scheduler_patience),
        scheduler_file.factor.unwrap_or(defaults.scheduler_factor),
    );
    if let Some(min_lr) = scheduler_file.min_lr {
        scheduler.min_lr = min_lr;
    }

    let shuffle = if args.no_shuffle {
        false
    } else {
        training_file.shuffle.unwrap_or(defaults.shuffle)
    };

    let training = TrainingConfigBuilder::new()
        .architecture(architecture)
        .train_data_path(
            args.data
                .clone()
                .or(training_file.data)
                .unwrap_or_else(|| PathBuf::from(defaults.train_data)),
        )
        .checkpoint_path(checkpoint_path)
        .epochs(args.epochs.or(training_file.epochs).unwrap_or(defaults.epochs))
        .learning_rate(
            args.learning_rate
                .or(training_file.learning_rate)
                .unwrap_or(preset.learning_rate),
        )
        .weight(args.weight.or(training_file.weight).unwrap_or(preset.weight))
        .patience(
            args.patience
                .or(training_file.patience)
                .unwrap_or(defaults.patience),
        )
        .min_delta(
            args.min_delta
                .or(training_file.min_delta)
                .unwrap_or(defaults.min_delta),
        )
        .scheduler(scheduler)
        .shuffle(shuffle)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(TrainSetup {
        preset: preset.name,
        output_dir,
        training,
    })
}

pub fn build_visualize_config(args: &VisualizeArgs) -> Result<VisualizeSetup> {
    let defaults = DefaultsConfig::default();
    let mut layers = load_layers(&args.config)?;
    let model_file = layers.file.model.take().unwrap_or_default();
    let training_file = layers.file.training.take().unwrap_or_default();
    let simulation_file = layers.file.simulation.take().unwrap_or_default();

    let architecture = if layers.explicit_model {
        Some(merge_architecture(None, None, None, &model_file, layers.preset)?)
    } else {
        None
    };

    Ok(VisualizeSetup {
        architecture,
        data: args
            .data
            .clone()
            .or(training_file.data)
            .unwrap_or_else(|| PathBuf::from(defaults.train_data)),
        grid_resolution: args
            .grid_resolution
            .or(simulation_file.grid_resolution)
            .unwrap_or(defaults.grid_resolution),
    })
}

pub fn build_simulate_config(args: &SimulateArgs) -> Result<SimulateSetup> {
    let defaults = DefaultsConfig::default();
    let mut layers = load_layers(&args.config)?;
    let model_file = layers.file.model.take().unwrap_or_default();
    let sim = layers.file.simulation.take().unwrap_or_default();

    let architecture = if layers.explicit_model {
        Some(merge_architecture(None, None, None, &model_file, layers.preset)?)
    } else {
        None
    };

    let base = InitialConditions::default();
    let positions = sim.positions.unwrap_or(base.positions);
    let velocities = sim.velocities.unwrap_or(base.velocities);
    let initial = InitialConditions {
        positions: [
            args.x1.unwrap_or(positions[0]),
            args.x2.unwrap_or(positions[1]),
            args.x3.unwrap_or(positions[2]),
        ],
        velocities: [
            args.v1.unwrap_or(velocities[0]),
            args.v2.unwrap_or(velocities[1]),
            args.v3.unwrap_or(velocities[2]),
        ],
    };

    let labels: Option<[String; 3]> = match &args.atoms {
        Some(list) => Some(list.clone().try_into().map_err(|v: Vec<String>| {
            CliError::Argument(format!(
                "--atoms expects exactly three symbols, got {}",
                v.len()
            ))
        })?),
        None => sim.atoms,
    };
    let atoms = match (labels, sim.masses) {
        (Some(labels), Some(masses)) => AtomTriple::with_masses(labels, masses),
        (Some(labels), None) => {
            AtomTriple::from_symbols([labels[0].as_str(), labels[1].as_str(), labels[2].as_str()])
        }
        (None, Some(masses)) => AtomTriple::with_masses(AtomTriple::default().labels, masses),
        (None, None) => Ok(AtomTriple::default()),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(SimulateSetup {
        architecture,
        initial,
        atoms,
        steps: args.steps.or(sim.steps).unwrap_or(defaults.steps),
        dt: args.dt.or(sim.dt).unwrap_or(defaults.dt),
        grid_resolution: sim.grid_resolution.unwrap_or(defaults.grid_resolution),
        render_plots: !args.no_plots && sim.render_plots.unwrap_or(true),
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(mut file: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;
        let key = key.trim();

        let model = || FileModelConfig::default();
        match key {
            "preset" => file.preset = Some(value.trim().to_string()),
            "model.hidden-dim" => {
                file.model.get_or_insert_with(model).hidden_dim = Some(parse_value(key, value)?)
            }
            "model.num-layers" => {
                file.model.get_or_insert_with(model).num_layers = Some(parse_value(key, value)?)
            }
            "model.activation" => {
                file.model.get_or_insert_with(model).activation = Some(value.trim().to_string())
            }
            "model.dropout" => {
                file.model.get_or_insert_with(model).dropout = Some(parse_value(key, value)?)
            }
            "training.data" => {
                file.training.get_or_insert_with(Default::default).data =
                    Some(PathBuf::from(value.trim()))
            }
            "training.epochs" => {
                file.training.get_or_insert_with(Default::default).epochs =
                    Some(parse_value(key, value)?)
            }
            "training.patience" => {
                file.training.get_or_insert_with(Default::default).patience =
                    Some(parse_value(key, value)?)
            }
            "training.min-delta" => {
                file.training.get_or_insert_with(Default::default).min_delta =
                    Some(parse_value(key, value)?)
            }
            "training.learning-rate" => {
                file.training.get_or_insert_with(Default::default).learning_rate =
                    Some(parse_value(key, value)?)
            }
            "training.weight" => {
                file.training.get_or_insert_with(Default::default).weight =
                    Some(parse_value(key, value)?)
            }
            "training.shuffle" => {
                file.training.get_or_insert_with(Default::default).shuffle =
                    Some(parse_value(key, value)?)
            }
            "training.scheduler.mode" => {
                file.training
                    .get_or_insert_with(Default::default)
                    .scheduler
                    .get_or_insert_with(Default::default)
                    .mode = Some(parse_value(key, value)?)
            }
            "training.scheduler.patience" => {
                file.training
                    .get_or_insert_with(Default::default)
                    .scheduler
                    .get_or_insert_with(Default::default)
                    .patience = Some(parse_value(key, value)?)
            }
            "training.scheduler.factor" => {
                file.training
                    .get_or_insert_with(Default::default)
                    .scheduler
                    .get_or_insert_with(Default::default)
                    .factor = Some(parse_value(key, value)?)
            }
            "training.scheduler.min-lr" => {
                file.training
                    .get_or_insert_with(Default::default)
                    .scheduler
                    .get_or_insert_with(Default::default)
                    .min_lr = Some(parse_value(key, value)?)
            }
            "simulation.steps" => {
                file.simulation.get_or_insert_with(Default::default).steps =
                    Some(parse_value(key, value)?)
            }
            "simulation.dt" => {
                file.simulation.get_or_insert_with(Default::default).dt =
                    Some(parse_value(key, value)?)
            }
            "simulation.grid-resolution" => {
                file.simulation
                    .get_or_insert_with(Default::default)
                    .grid_resolution = Some(parse_value(key, value)?)
            }
            "simulation.render-plots" => {
                file.simulation
                    .get_or_insert_with(Default::default)
                    .render_plots = Some(parse_value(key, value)?)
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use pesmd::engine::config::ScheduleMode;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    const STAMP: &str = "20240101-120000";

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["pesmd"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).command
    }

    fn train_setup(args: &[&str]) -> Result<TrainSetup> {
        match parse(args) {
            Commands::Train(train) => build_train_config(&train, STAMP),
            _ => panic!("Expected 'train' subcommand"),
        }
    }

    fn simulate_setup(args: &[&str]) -> Result<SimulateSetup> {
        match parse(args) {
            Commands::Simulate(sim) => build_simulate_config(&sim),
            _ => panic!("Expected 'simulate' subcommand"),
        }
    }

    #[test]
    fn defaults_come_from_the_default_preset() {
        let setup = train_setup(&["train"]).unwrap();
        let cfg = &setup.training;

        assert_eq!(setup.preset, "2-64");
        assert_eq!(cfg.architecture, Architecture::new(64, 2, Activation::Mish));
        assert_eq!(cfg.learning_rate, 0.001);
        assert_eq!(cfg.weight, 0.014);
        assert_eq!(cfg.epochs, 1000);
        assert_eq!(cfg.patience, 50);
        assert_eq!(cfg.min_delta, 1e-4);
        assert_eq!(cfg.scheduler.mode, ScheduleMode::Min);
        assert_eq!(cfg.scheduler.patience, 10);
        assert_eq!(cfg.scheduler.factor, 0.67);
        assert!(cfg.shuffle);
        assert_eq!(cfg.train_data_path, PathBuf::from("input_force_filtered.csv"));
        assert_eq!(setup.output_dir, PathBuf::from("2-64-Mish-20240101-120000"));
        assert_eq!(
            cfg.checkpoint_path,
            PathBuf::from("2-64-Mish-20240101-120000/2-64-Mish-20240101-120000.json")
        );
    }

    #[test]
    fn second_preset_changes_architecture() {
        let setup = train_setup(&["train", "--preset", "3-32"]).unwrap();
        assert_eq!(
            setup.training.architecture,
            Architecture::new(32, 3, Activation::Mish)
        );
        assert_eq!(setup.preset, "3-32");
    }

    #[test]
    fn precedence_is_cli_then_set_then_file_then_preset() {
        let config_path = write_config_file(
            "precedence.toml",
            r#"
            [model]
            hidden-dim = 16

            [training]
            epochs = 200
            weight = 0.5
            learning-rate = 0.1
            "#,
        );
        let config = config_path.to_str().unwrap();
        let setup = train_setup(&[
            "train",
            "-c",
            config,
            "-S",
            "training.epochs=300",
            "-S",
            "training.learning-rate=0.01",
            "--epochs",
            "400",
        ])
        .unwrap();
        let cfg = &setup.training;

        assert_eq!(cfg.epochs, 400);
        assert_eq!(cfg.learning_rate, 0.01);
        assert_eq!(cfg.weight, 0.5);
        assert_eq!(cfg.architecture.hidden_dim, 16);
        assert_eq!(cfg.architecture.num_layers, 2);
    }

    #[test]
    fn explicit_output_dir_names_the_checkpoint() {
        let setup = train_setup(&["train", "--out", "runs/fit", "--no-shuffle"]).unwrap();
        assert_eq!(setup.output_dir, PathBuf::from("runs/fit"));
        assert_eq!(
            setup.training.checkpoint_path,
            PathBuf::from("runs/fit/fit.json")
        );
        assert!(!setup.training.shuffle);
    }

    #[test]
    fn unknown_file_key_is_rejected() {
        let config_path = write_config_file("unknown.toml", "[training]\nepoch = 5\n");
        let result = train_setup(&["train", "-c", config_path.to_str().unwrap()]);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn unsupported_set_key_is_rejected() {
        let result = train_setup(&["train", "-S", "training.speed=3"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("training.speed")));
    }

    #[test]
    fn malformed_set_value_is_rejected() {
        let result = train_setup(&["train", "-S", "training.epochs=many"]);
        assert!(matches!(result, Err(CliError::Config(_))));
        let result = train_setup(&["train", "-S", "training.epochs"]);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_preset_and_activation_are_configuration_errors() {
        assert!(matches!(
            train_setup(&["train", "--preset", "9-9"]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            train_setup(&["train", "--activation", "Swish"]),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        let result = train_setup(&["train", "--weight", "1.5"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("weight")));
    }

    #[test]
    fn simulation_defaults_match_the_reference_run() {
        let setup = simulate_setup(&["simulate"]).unwrap();
        assert_eq!(setup.steps, 60000);
        assert_eq!(setup.dt, 1e-18);
        assert_eq!(setup.initial, InitialConditions::default());
        assert_eq!(setup.atoms, AtomTriple::default());
        assert_eq!(setup.architecture, None);
        assert!(setup.render_plots);
    }

    #[test]
    fn simulation_flags_override_initial_conditions_and_atoms() {
        let setup = simulate_setup(&[
            "simulate",
            "--x1",
            "2.5",
            "--v1",
            "-15000",
            "--atoms",
            "He,H,H",
            "--no-plots",
        ])
        .unwrap();
        assert_eq!(setup.initial.positions, [2.5, 0.0, -1.108]);
        assert_eq!(setup.initial.velocities, [-15000.0, 0.0, 0.0]);
        assert_eq!(setup.atoms.labels, ["He", "H", "H"]);
        assert_eq!(setup.atoms.masses[0], 4.0026);
        assert!(!setup.render_plots);
    }

    #[test]
    fn wrong_atom_count_is_an_argument_error() {
        let result = simulate_setup(&["simulate", "--atoms", "Ne,H"]);
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn preset_in_file_makes_the_architecture_explicit() {
        let config_path = write_config_file("visualize.toml", "preset = \"3-32\"\n");
        let Commands::Visualize(args) = parse(&["visualize", "-c", config_path.to_str().unwrap()])
        else {
            panic!("Expected 'visualize' subcommand");
        };
        let setup = build_visualize_config(&args).unwrap();
        assert_eq!(
            setup.architecture,
            Some(Architecture::new(32, 3, Activation::Mish))
        );
        assert_eq!(setup.grid_resolution, 100);
    }

    #[test]
    fn checkpoint_name_falls_back_for_bare_paths() {
        assert_eq!(checkpoint_name_for(Path::new(".")), "model.json");
        assert_eq!(checkpoint_name_for(Path::new("a/2-64")), "2-64.json");
    }
}
