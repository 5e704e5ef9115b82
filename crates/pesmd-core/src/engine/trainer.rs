use super::error::EngineError;
use super::optim::Adam;
use crate::core::context::{ExecutionContext, RngStream};
use crate::core::models::sample::{Dataset, Sample};
use crate::core::nn::loss::{CompositeLoss, LossTerms};
use crate::core::nn::network::{Mode, Surrogate};
use crate::core::physics::constants::BOHR_LENGTH_SCALE;
use crate::core::physics::transform::{forces_from_gradient, target_order_cotangent};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub terms: LossTerms,
    /// Predicted forces in target order `(F2, F3, F1)`.
    pub predicted_forces: [f64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub mean_loss: f64,
    /// Mean absolute value of every predicted force component this epoch.
    pub mean_abs_force: f64,
}

/// Per-sample optimisation over the composite loss.
///
/// Each step runs one forward pass and reuses its trace for the energy, the
/// input gradient, the loss and the parameter gradient, so dropout masks
/// stay fixed within the step.
pub struct Trainer {
    optimizer: Adam,
    loss: CompositeLoss,
    shuffle: bool,
    shuffle_rng: StdRng,
    dropout_rng: StdRng,
}

impl Trainer {
    pub fn new(
        model: &Surrogate,
        learning_rate: f64,
        loss: CompositeLoss,
        shuffle: bool,
        ctx: &ExecutionContext,
    ) -> Self {
        Self {
            optimizer: Adam::new(learning_rate, model.layers()),
            loss,
            shuffle,
            shuffle_rng: ctx.rng(RngStream::Shuffle),
            dropout_rng: ctx.rng(RngStream::Dropout),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        self.optimizer.set_learning_rate(lr);
    }

    /// Evaluates the loss on `sample` and applies one optimiser update.
    /// Returns `None` without touching the parameters if the loss is not
    /// finite.
    pub fn step(&mut self, model: &mut Surrogate, sample: &Sample) -> Option<StepResult> {
        let trace = model.forward_traced(sample.coords, Some(&mut self.dropout_rng));
        let raw = model.input_gradient(&trace);
        let gradient = [raw[0] / BOHR_LENGTH_SCALE, raw[1] / BOHR_LENGTH_SCALE];
        let predicted_forces = forces_from_gradient(gradient).target_order();

        let terms = self
            .loss
            .evaluate(trace.value, sample.energy, &predicted_forces, &sample.forces);
        if !terms.value.is_finite() {
            return None;
        }

        let d_gradient = target_order_cotangent(terms.d_forces);
        let cotangent = [
            d_gradient[0] / BOHR_LENGTH_SCALE,
            d_gradient[1] / BOHR_LENGTH_SCALE,
        ];
        let grads = model.parameter_gradients(&trace, terms.d_energy, &cotangent);
        self.optimizer.step(model.layers_mut(), &grads);

        Some(StepResult {
            terms,
            predicted_forces,
        })
    }

    /// One pass over the dataset, one sample per step. Leaves the model in
    /// evaluation mode.
    pub fn run_epoch(
        &mut self,
        model: &mut Surrogate,
        dataset: &Dataset,
        epoch: usize,
    ) -> Result<EpochSummary, EngineError> {
        if dataset.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.shuffle_rng);
        }

        model.set_mode(Mode::Train);
        let mut total_loss = 0.0;
        let mut total_abs_force = 0.0;
        for &index in &order {
            let sample = &dataset.samples()[index];
            let Some(result) = self.step(model, sample) else {
                model.set_mode(Mode::Eval);
                return Err(EngineError::NonFiniteLoss {
                    epoch,
                    sample: index,
                });
            };
            total_loss += result.terms.value;
            total_abs_force += result.predicted_forces.iter().map(|f| f.abs()).sum::<f64>();
        }
        model.set_mode(Mode::Eval);

        let n = dataset.len() as f64;
        let summary = EpochSummary {
            mean_loss: total_loss / n,
            mean_abs_force: total_abs_force / (3.0 * n),
        };
        trace!(epoch, loss = summary.mean_loss, "Epoch pass complete.");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::architecture::Architecture;
    use crate::core::models::sample::DistancePair;
    use crate::core::nn::activation::Activation;

    fn setup(weight: f64) -> (Surrogate, Trainer) {
        let ctx = ExecutionContext::new(None, 3);
        let model = Surrogate::new(Architecture::new(8, 2, Activation::Gelu), &ctx).unwrap();
        let trainer = Trainer::new(&model, 1e-2, CompositeLoss::new(weight).unwrap(), true, &ctx);
        (model, trainer)
    }

    fn sample(energy: f64) -> Sample {
        Sample {
            coords: DistancePair::new(1.2, 0.9),
            energy,
            forces: [0.3, -0.2, -0.1],
        }
    }

    #[test]
    fn repeated_steps_reduce_single_sample_loss() {
        let (mut model, mut trainer) = setup(0.5);
        let s = sample(0.7);
        let first = trainer.step(&mut model, &s).unwrap().terms.value;
        let mut last = first;
        for _ in 0..200 {
            last = trainer.step(&mut model, &s).unwrap().terms.value;
        }
        assert!(last < first * 0.25, "loss went from {first} to {last}");
    }

    #[test]
    fn pure_force_weight_still_updates_parameters() {
        let (mut model, mut trainer) = setup(1.0);
        let before = model.layers().to_vec();
        trainer.step(&mut model, &sample(0.0)).unwrap();
        assert_ne!(model.layers(), before.as_slice());
    }

    #[test]
    fn non_finite_target_aborts_with_epoch_and_sample() {
        let (mut model, mut trainer) = setup(0.2);
        let data = Dataset::new(vec![sample(0.1), sample(f64::NAN), sample(0.2)]);
        let err = trainer.run_epoch(&mut model, &data, 4).unwrap_err();
        assert!(matches!(
            err,
            EngineError::NonFiniteLoss {
                epoch: 4,
                sample: 1
            }
        ));
        assert_eq!(model.mode(), Mode::Eval);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let (mut model, mut trainer) = setup(0.2);
        assert!(matches!(
            trainer.run_epoch(&mut model, &Dataset::default(), 1),
            Err(EngineError::EmptyDataset)
        ));
    }

    #[test]
    fn epoch_summary_averages_over_samples() {
        let (mut model, mut trainer) = setup(0.2);
        let data = Dataset::new(vec![sample(0.1), sample(0.2)]);
        let summary = trainer.run_epoch(&mut model, &data, 1).unwrap();
        assert!(summary.mean_loss.is_finite() && summary.mean_loss >= 0.0);
        assert!(summary.mean_abs_force > 0.0);
    }
}
