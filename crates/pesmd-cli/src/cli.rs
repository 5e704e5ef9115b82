use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The PESMD Developers",
    version,
    about = "PESMD CLI - Fit neural potential energy surfaces to energies and forces, then run collinear three-atom molecular dynamics on them.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Cap the number of threads used for parallel model evaluation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Seed for weight initialisation, shuffling and dropout.
    #[arg(long, global = true, value_name = "INT")]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a surrogate on energies and forces, then assess it.
    Train(TrainArgs),
    /// Load a trained surrogate and plot it against reference data.
    Visualize(VisualizeArgs),
    /// Run molecular dynamics on a trained surrogate.
    Simulate(SimulateArgs),
    /// List the named model presets.
    ListConfigs,
}

/// Options shared by every command that reads a preset and a config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Named model preset (see `list-configs`).
    #[arg(short = 'p', long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S training.epochs=200
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `train` subcommand.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    // --- Data and Output ---
    /// Training data CSV with columns x, y, z1, z2, z3, z4.
    #[arg(short, long, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Output directory. Defaults to a timestamped directory named after the architecture.
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    // --- Model Overrides ---
    #[arg(long, value_name = "INT")]
    pub hidden_dim: Option<usize>,

    #[arg(long, value_name = "INT")]
    pub num_layers: Option<usize>,

    /// One of Mish, ReLU, LeakyReLU, ELU, GELU.
    #[arg(long, value_name = "NAME")]
    pub activation: Option<String>,

    // --- Training Overrides ---
    #[arg(long, value_name = "INT")]
    pub epochs: Option<usize>,

    /// Epochs without improvement before stopping early.
    #[arg(long, value_name = "INT")]
    pub patience: Option<usize>,

    #[arg(long, value_name = "FLOAT")]
    pub min_delta: Option<f64>,

    #[arg(long = "lr", value_name = "FLOAT")]
    pub learning_rate: Option<f64>,

    /// Share of the force term in the loss, between 0 and 1.
    #[arg(short, long, value_name = "FLOAT")]
    pub weight: Option<f64>,

    /// Visit samples in file order every epoch.
    #[arg(long)]
    pub no_shuffle: bool,
}

/// Where to find a trained model.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Directory holding the checkpoint. Defaults to the most recent model under --models-root.
    #[arg(short, long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Directory searched for model directories when --model-dir is absent.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub models_root: PathBuf,
}

/// Arguments for the `visualize` subcommand.
#[derive(Args, Debug)]
pub struct VisualizeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Reference data CSV.
    #[arg(short, long, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Points per axis of the surface grid.
    #[arg(long, value_name = "INT")]
    pub grid_resolution: Option<usize>,
}

/// Arguments for the `simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Directory for trajectory files and figures. Defaults to the model directory.
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    // --- Integration ---
    #[arg(long, value_name = "INT")]
    pub steps: Option<usize>,

    /// Timestep in seconds.
    #[arg(long, value_name = "FLOAT")]
    pub dt: Option<f64>,

    // --- Initial Conditions (Å and m/s) ---
    #[arg(long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub x1: Option<f64>,
    #[arg(long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub x2: Option<f64>,
    #[arg(long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub x3: Option<f64>,
    #[arg(long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub v1: Option<f64>,
    #[arg(long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub v2: Option<f64>,
    #[arg(long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub v3: Option<f64>,

    /// Element symbols of the three atoms in chain order, e.g. Ne,H,H.
    #[arg(long, value_name = "A,B,C", value_delimiter = ',')]
    pub atoms: Option<Vec<String>>,

    /// Skip rendering the contour and energy figures.
    #[arg(long)]
    pub no_plots: bool,
}
