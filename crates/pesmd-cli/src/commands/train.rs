use crate::cli::TrainArgs;
use crate::commands::visualize::assess;
use crate::config::build_train_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use chrono::Local;
use pesmd::core::context::ExecutionContext;
use pesmd::core::io::checkpoint::load_surrogate;
use pesmd::core::io::report::{SummaryRow, write_summary};
use pesmd::engine::config::DEFAULT_GRID_RESOLUTION;
use pesmd::engine::error::EngineError;
use pesmd::engine::progress::ProgressReporter;
use pesmd::workflows;
use std::fs;
use tracing::{info, warn};

const METRICS_FILE_NAME: &str = "metrics.csv";
const SUMMARY_FILE_NAME: &str = "summary.csv";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub fn run(args: TrainArgs, ctx: &ExecutionContext) -> Result<()> {
    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let setup = build_train_config(&args, &timestamp)?;
    let config = &setup.training;
    info!(
        preset = setup.preset,
        output = %setup.output_dir.display(),
        "Training configuration resolved."
    );
    fs::create_dir_all(&setup.output_dir).map_err(|e| CliError::io(&setup.output_dir, e))?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Training {} on {}...",
        config.architecture.stem(),
        config.train_data_path.display()
    );
    let report = workflows::train::run(config, ctx, &reporter)?;

    let metrics_path = setup.output_dir.join(METRICS_FILE_NAME);
    report.write_metrics(&metrics_path)?;
    println!(
        "Training finished ({}) after {} epoch(s). Best loss {:.6e}, final learning rate {:.3e}.",
        report.outcome, report.epochs_run, report.best_loss, report.final_learning_rate
    );
    println!("  Metrics written to: {}", metrics_path.display());

    if report.checkpoint_writes == 0 {
        warn!("No checkpoint was written; skipping assessment.");
        println!("Warning: no improving epoch was recorded, so there is no model to assess.");
        return Ok(());
    }
    println!("✓ Best model written to: {}", report.checkpoint_path.display());

    // Assess the best parameters, not the last ones.
    let model = load_surrogate(&report.checkpoint_path, Some(config.architecture), ctx)
        .map_err(EngineError::from)?;
    let assessment = assess(
        &model,
        &config.train_data_path,
        DEFAULT_GRID_RESOLUTION,
        &setup.output_dir,
        &reporter,
    )?;

    let summary_path = setup.output_dir.join(SUMMARY_FILE_NAME);
    let label = setup
        .output_dir
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| config.architecture.stem());
    write_summary(
        &summary_path,
        &[SummaryRow {
            config: label,
            r2: assessment.r2,
        }],
    )
    .map_err(EngineError::from)?;

    println!("R² on training data: {:.6}", assessment.r2);
    println!("  Summary written to: {}", summary_path.display());
    Ok(())
}
