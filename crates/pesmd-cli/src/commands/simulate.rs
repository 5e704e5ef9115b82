use crate::cli::SimulateArgs;
use crate::commands::visualize::resolve_model_dir;
use crate::config::{build_simulate_config, checkpoint_name_for};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use pesmd::core::context::ExecutionContext;
use pesmd::engine::artifacts::load_model;
use pesmd::engine::config::SimulationConfigBuilder;
use pesmd::engine::dynamics::Termination;
use pesmd::engine::error::EngineError;
use pesmd::engine::progress::ProgressReporter;
use pesmd::workflows;
use tracing::info;

const FALLBACK_RUN_NAME: &str = "model";

pub fn run(args: SimulateArgs, ctx: &ExecutionContext) -> Result<()> {
    let setup = build_simulate_config(&args)?;
    let model_dir = resolve_model_dir(&args.model)?;
    let loaded = load_model(
        &model_dir,
        Some(&checkpoint_name_for(&model_dir)),
        setup.architecture.as_ref(),
        ctx,
    )?;

    let run_name = model_dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(FALLBACK_RUN_NAME)
        .to_string();
    let output_dir = args.out.clone().unwrap_or_else(|| model_dir.clone());
    let config = SimulationConfigBuilder::new()
        .initial(setup.initial)
        .atoms(setup.atoms)
        .steps(setup.steps)
        .dt(setup.dt)
        .output_dir(output_dir)
        .run_name(run_name)
        .grid_resolution(setup.grid_resolution)
        .render_plots(setup.render_plots)
        .build()
        .map_err(EngineError::from)?;
    info!(
        run = %config.run_name,
        output = %config.output_dir.display(),
        "Simulation configuration resolved."
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Simulating {} for up to {} steps of {:e} s...",
        config.atoms.labels.join("-"),
        config.steps,
        config.dt
    );
    let report = workflows::simulate::run(&loaded.model, &config, &reporter)?;

    match report.termination {
        Termination::Completed => {
            println!("✓ Completed {} frame(s).", report.frames);
        }
        Termination::LeftDomain { step } => {
            println!(
                "Warning: the system left the trained domain at step {}; {} frame(s) recorded.",
                step, report.frames
            );
        }
    }
    println!("  Trajectory written to: {}", report.csv_path.display());
    println!("  XYZ written to: {}", report.xyz_path.display());
    for path in [&report.surface_plot, &report.energy_plot].into_iter().flatten() {
        println!("  Figure written to: {}", path.display());
    }
    Ok(())
}
