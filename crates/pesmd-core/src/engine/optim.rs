use super::config::{ScheduleMode, SchedulerConfig};
use crate::core::nn::network::Dense;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Adam with bias-corrected moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    step: i32,
    first_moment: Vec<Dense>,
    second_moment: Vec<Dense>,
}

impl Adam {
    pub fn new(learning_rate: f64, params: &[Dense]) -> Self {
        Self {
            learning_rate,
            step: 0,
            first_moment: params.iter().map(Dense::zeros_like).collect(),
            second_moment: params.iter().map(Dense::zeros_like).collect(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }

    pub fn step(&mut self, params: &mut [Dense], grads: &[Dense]) {
        self.step = self.step.saturating_add(1);
        let correction1 = 1.0 - BETA1.powi(self.step);
        let correction2 = 1.0 - BETA2.powi(self.step);
        let lr = self.learning_rate;

        let layers = params
            .iter_mut()
            .zip(grads)
            .zip(self.first_moment.iter_mut().zip(self.second_moment.iter_mut()));
        for ((param, grad), (m, v)) in layers {
            let update = |p: &mut [f64], g: &[f64], m: &mut [f64], v: &mut [f64]| {
                for i in 0..p.len() {
                    m[i] = BETA1 * m[i] + (1.0 - BETA1) * g[i];
                    v[i] = BETA2 * v[i] + (1.0 - BETA2) * g[i] * g[i];
                    let m_hat = m[i] / correction1;
                    let v_hat = v[i] / correction2;
                    p[i] -= lr * m_hat / (v_hat.sqrt() + ADAM_EPS);
                }
            };
            update(
                param.weight.as_mut_slice(),
                grad.weight.as_slice(),
                m.weight.as_mut_slice(),
                v.weight.as_mut_slice(),
            );
            update(
                param.bias.as_mut_slice(),
                grad.bias.as_slice(),
                m.bias.as_mut_slice(),
                v.bias.as_mut_slice(),
            );
        }
    }
}

/// Multiplies the learning rate by `factor` once the monitored metric has
/// failed to improve for more than `patience` consecutive epochs.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    config: SchedulerConfig,
    best: f64,
    bad_epochs: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(config: SchedulerConfig) -> Self {
        let best = match config.mode {
            ScheduleMode::Min => f64::INFINITY,
            ScheduleMode::Max => f64::NEG_INFINITY,
        };
        Self {
            config,
            best,
            bad_epochs: 0,
        }
    }

    fn is_better(&self, metric: f64) -> bool {
        match self.config.mode {
            ScheduleMode::Min => metric < self.best * (1.0 - self.config.threshold),
            ScheduleMode::Max => metric > self.best * (1.0 + self.config.threshold),
        }
    }

    pub fn bad_epochs(&self) -> usize {
        self.bad_epochs
    }

    /// Feeds one epoch's metric. Returns the new learning rate if it was
    /// reduced.
    pub fn step(&mut self, metric: f64, current_lr: f64) -> Option<f64> {
        if self.is_better(metric) {
            self.best = metric;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs > self.config.patience {
            self.bad_epochs = 0;
            let reduced = (current_lr * self.config.factor).max(self.config.min_lr);
            if current_lr - reduced > self.config.eps {
                return Some(reduced);
            }
        }
        None
    }
}
