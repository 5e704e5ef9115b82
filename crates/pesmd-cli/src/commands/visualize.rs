use crate::cli::{ModelArgs, VisualizeArgs};
use crate::config::{build_visualize_config, checkpoint_name_for};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use pesmd::core::context::ExecutionContext;
use pesmd::core::io::dataset::load_dataset;
use pesmd::core::models::potential::PotentialSurface;
use pesmd::core::physics::constants::DomainBounds;
use pesmd::engine::artifacts::{find_latest_model_dir, load_model};
use pesmd::engine::error::EngineError;
use pesmd::engine::progress::ProgressReporter;
use pesmd::workflows::{self, visualize::VisualizationReport};
use std::path::{Path, PathBuf};
use tracing::info;

/// `--model-dir` if given, otherwise the freshest model under `--models-root`.
pub(crate) fn resolve_model_dir(args: &ModelArgs) -> Result<PathBuf> {
    match &args.model_dir {
        Some(dir) => Ok(dir.clone()),
        None => {
            let dir = find_latest_model_dir(&args.models_root)?;
            info!("Using most recent model directory {:?}", &dir);
            Ok(dir)
        }
    }
}

pub(crate) fn assess<S: PotentialSurface + ?Sized>(
    surface: &S,
    data: &Path,
    grid_resolution: usize,
    output_dir: &Path,
    reporter: &ProgressReporter,
) -> Result<VisualizationReport> {
    info!("Loading reference data from {:?}", data);
    let dataset = load_dataset(data).map_err(EngineError::from)?;
    let window = DomainBounds::default().contour_window();
    Ok(workflows::visualize::run(
        surface,
        &dataset,
        &window,
        grid_resolution,
        output_dir,
        reporter,
    )?)
}

pub fn run(args: VisualizeArgs, ctx: &ExecutionContext) -> Result<()> {
    let setup = build_visualize_config(&args)?;
    let model_dir = resolve_model_dir(&args.model)?;
    let loaded = load_model(
        &model_dir,
        Some(&checkpoint_name_for(&model_dir)),
        setup.architecture.as_ref(),
        ctx,
    )?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Assessing {}...", loaded.checkpoint.display());
    let report = assess(
        &loaded.model,
        &setup.data,
        setup.grid_resolution,
        &model_dir,
        &reporter,
    )?;

    println!(
        "Mean absolute deviation {:.6}, maximum {:.6}",
        report.deviation.mean_abs, report.deviation.max_abs
    );
    println!("R²: {:.6}", report.r2);
    for path in [&report.parity_plot, &report.surface_plot, &report.error_plot] {
        println!("  Figure written to: {}", path.display());
    }
    Ok(())
}
