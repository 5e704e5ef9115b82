mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::config::DefaultsConfig;
use crate::error::{CliError, Result};
use clap::Parser;
use pesmd::core::context::ExecutionContext;
use pesmd::engine::error::EngineError;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 PESMD CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let seed = cli.seed.unwrap_or(DefaultsConfig::default().seed);
    let ctx = ExecutionContext::initialize(cli.threads, seed).map_err(EngineError::from)?;

    let command_result = match cli.command {
        Commands::Train(args) => {
            info!("Dispatching to 'train' command.");
            commands::train::run(args, &ctx)
        }
        Commands::Visualize(args) => {
            info!("Dispatching to 'visualize' command.");
            commands::visualize::run(args, &ctx)
        }
        Commands::Simulate(args) => {
            info!("Dispatching to 'simulate' command.");
            commands::simulate::run(args, &ctx)
        }
        Commands::ListConfigs => commands::list_configs::run(),
    };

    match &command_result {
        Ok(_) => info!("✅ Command completed successfully."),
        Err(e) => error!("❌ Command failed: {}", e),
    }
    command_result
}
