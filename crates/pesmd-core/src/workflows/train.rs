use crate::core::context::ExecutionContext;
use crate::core::io::checkpoint::{CheckpointStore, FileCheckpoint};
use crate::core::io::dataset::load_dataset;
use crate::core::io::report::write_csv_records;
use crate::core::models::architecture::{INPUT_DIM, OUTPUT_DIM};
use crate::core::models::sample::Dataset;
use crate::core::nn::loss::CompositeLoss;
use crate::core::nn::network::{Mode, Surrogate};
use crate::core::physics::constants::VANISHING_GRADIENT_EPSILON;
use crate::engine::config::TrainingConfig;
use crate::engine::error::EngineError;
use crate::engine::metrics::r2_score;
use crate::engine::optim::ReduceLrOnPlateau;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{EpochRecord, TrainingOutcome, TrainingPhase, TrainingState};
use crate::engine::trainer::Trainer;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub outcome: TrainingOutcome,
    pub epochs_run: usize,
    pub best_loss: f64,
    pub final_learning_rate: f64,
    pub checkpoint_writes: usize,
    pub checkpoint_path: PathBuf,
    pub history: Vec<EpochRecord>,
}

impl TrainingReport {
    /// R² of the last completed epoch.
    pub fn final_r2(&self) -> Option<f64> {
        self.history.last().map(|r| r.r2)
    }

    /// Writes the per-epoch history as `metrics.csv`-style rows.
    pub fn write_metrics(&self, path: &Path) -> Result<(), EngineError> {
        write_csv_records(path, &self.history)?;
        Ok(())
    }
}

/// Loads the training CSV named in `config`, trains a fresh surrogate on it
/// and writes the best parameters to `config.checkpoint_path`.
#[instrument(skip_all, name = "training_workflow")]
pub fn run(
    config: &TrainingConfig,
    ctx: &ExecutionContext,
    reporter: &ProgressReporter,
) -> Result<TrainingReport, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    info!(
        data = %config.train_data_path.display(),
        architecture = %config.architecture,
        "Loading training data and building model."
    );
    let dataset = load_dataset(&config.train_data_path)?;
    let mut model = Surrogate::new(config.architecture, ctx)?;
    if let Some(parent) = config.checkpoint_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
    }
    let mut store = FileCheckpoint::new(&config.checkpoint_path);
    reporter.report(Progress::PhaseFinish);

    train_model(&mut model, &dataset, config, ctx, &mut store, reporter)
}

/// Runs the training loop on an already-built model and dataset, persisting
/// every improvement through `store`.
pub fn train_model(
    model: &mut Surrogate,
    dataset: &Dataset,
    config: &TrainingConfig,
    ctx: &ExecutionContext,
    store: &mut dyn CheckpointStore,
    reporter: &ProgressReporter,
) -> Result<TrainingReport, EngineError> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    let arch = model.architecture();
    if arch.input_dim != INPUT_DIM || arch.output_dim != OUTPUT_DIM {
        return Err(EngineError::IncompatibleModel {
            input_dim: arch.input_dim,
            output_dim: arch.output_dim,
        });
    }

    let loss = CompositeLoss::new(config.weight)?;
    let mut trainer = Trainer::new(model, config.learning_rate, loss, config.shuffle, ctx);
    let mut scheduler = ReduceLrOnPlateau::new(config.scheduler);
    let mut state = TrainingState::default();
    let mut history = Vec::with_capacity(config.epochs);
    let coords = dataset.coords();
    let energies = dataset.energies();
    let mut outcome = TrainingOutcome::Converged;

    // === Phase 1: Epoch loop ===
    reporter.report(Progress::PhaseStart { name: "Training" });
    reporter.report(Progress::TaskStart {
        total: config.epochs as u64,
    });
    info!(
        samples = dataset.len(),
        epochs = config.epochs,
        "Starting training."
    );

    for epoch in 1..=config.epochs {
        let summary = trainer.run_epoch(model, dataset, epoch)?;

        if summary.mean_abs_force < VANISHING_GRADIENT_EPSILON {
            warn!(
                epoch,
                mean_abs_force = summary.mean_abs_force,
                "Predicted forces vanished; stopping training."
            );
            state.phase = TrainingPhase::VanishingGradient;
            history.push(EpochRecord {
                epoch,
                loss: summary.mean_loss,
                r2: f64::NAN,
                learning_rate: trainer.learning_rate(),
                phase: state.phase,
            });
            outcome = TrainingOutcome::VanishingGradient;
            break;
        }

        model.set_mode(Mode::Eval);
        let r2 = r2_score(&energies, &model.predict_batch(&coords));

        if state.observe(summary.mean_loss, config.min_delta) {
            store.save(model)?;
            state.checkpoint_writes += 1;
            debug!(epoch, loss = summary.mean_loss, "Loss improved; checkpoint saved.");
        }

        let learning_rate = trainer.learning_rate();
        if let Some(reduced) = scheduler.step(summary.mean_loss, learning_rate) {
            info!(epoch, from = learning_rate, to = reduced, "Reducing learning rate.");
            trainer.set_learning_rate(reduced);
        }

        history.push(EpochRecord {
            epoch,
            loss: summary.mean_loss,
            r2,
            learning_rate,
            phase: state.phase,
        });
        reporter.report(Progress::TaskIncrement);
        reporter.report(Progress::StatusUpdate {
            text: format!("loss {:.6}  r2 {:.4}", summary.mean_loss, r2),
        });
        info!(epoch, loss = summary.mean_loss, r2, "Epoch complete.");

        if state.patience_exhausted(config.patience) {
            info!(epoch, patience = config.patience, "Early stopping triggered.");
            outcome = TrainingOutcome::EarlyStopped;
            break;
        }
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let report = TrainingReport {
        outcome,
        epochs_run: history.len(),
        best_loss: state.best_loss,
        final_learning_rate: trainer.learning_rate(),
        checkpoint_writes: state.checkpoint_writes,
        checkpoint_path: store.location().to_path_buf(),
        history,
    };
    info!(
        outcome = %report.outcome,
        epochs = report.epochs_run,
        best_loss = report.best_loss,
        "Training finished."
    );
    Ok(report)
}
