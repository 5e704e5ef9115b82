use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
#[error("Loss weight must lie in [0, 1] (got {0})")]
pub struct InvalidLossWeight(pub f64);

/// Value of the composite loss and its partial derivatives with respect to
/// the predicted energy and each predicted force component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossTerms {
    pub value: f64,
    pub energy_mse: f64,
    pub force_mse: f64,
    pub d_energy: f64,
    pub d_forces: [f64; 3],
}

/// `(1 - w)·MSE(energy) + w·MSE(forces)`, the force MSE averaged over the
/// three components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeLoss {
    weight: f64,
}

impl CompositeLoss {
    pub fn new(weight: f64) -> Result<Self, InvalidLossWeight> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(InvalidLossWeight(weight));
        }
        Ok(Self { weight })
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn evaluate(
        &self,
        predicted_energy: f64,
        target_energy: f64,
        predicted_forces: &[f64; 3],
        target_forces: &[f64; 3],
    ) -> LossTerms {
        let w = self.weight;
        let energy_residual = predicted_energy - target_energy;
        let energy_mse = energy_residual * energy_residual;

        let mut force_mse = 0.0;
        let mut d_forces = [0.0; 3];
        for k in 0..3 {
            let r = predicted_forces[k] - target_forces[k];
            force_mse += r * r;
            d_forces[k] = 2.0 * w * r / 3.0;
        }
        force_mse /= 3.0;

        LossTerms {
            value: (1.0 - w) * energy_mse + w * force_mse,
            energy_mse,
            force_mse,
            d_energy: 2.0 * (1.0 - w) * energy_residual,
            d_forces,
        }
    }
}
