use serde::Serialize;
use std::fmt;

/// Phase of the training state machine after each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingPhase {
    Running,
    Improved,
    Stalled,
    Converged,
    EarlyStopped,
    VanishingGradient,
}

impl TrainingPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Converged | Self::EarlyStopped | Self::VanishingGradient
        )
    }
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Improved => "improved",
            Self::Stalled => "stalled",
            Self::Converged => "converged",
            Self::EarlyStopped => "early-stopped",
            Self::VanishingGradient => "vanishing-gradient",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingOutcome {
    /// The epoch budget was exhausted.
    Converged,
    EarlyStopped,
    VanishingGradient,
}

impl From<TrainingOutcome> for TrainingPhase {
    fn from(outcome: TrainingOutcome) -> Self {
        match outcome {
            TrainingOutcome::Converged => Self::Converged,
            TrainingOutcome::EarlyStopped => Self::EarlyStopped,
            TrainingOutcome::VanishingGradient => Self::VanishingGradient,
        }
    }
}

impl fmt::Display for TrainingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TrainingPhase::from(*self).fmt(f)
    }
}

/// One row of the per-epoch history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub r2: f64,
    pub learning_rate: f64,
    pub phase: TrainingPhase,
}

/// Early-stopping bookkeeping. Only the training loop mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub best_loss: f64,
    pub patience_counter: usize,
    pub phase: TrainingPhase,
    pub checkpoint_writes: usize,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            best_loss: f64::INFINITY,
            patience_counter: 0,
            phase: TrainingPhase::Running,
            checkpoint_writes: 0,
        }
    }
}

impl TrainingState {
    /// Records an epoch loss and returns whether it beat the best loss by
    /// more than `min_delta`.
    pub fn observe(&mut self, loss: f64, min_delta: f64) -> bool {
        if loss < self.best_loss - min_delta {
            self.best_loss = loss;
            self.patience_counter = 0;
            self.phase = TrainingPhase::Improved;
            true
        } else {
            self.patience_counter += 1;
            self.phase = TrainingPhase::Stalled;
            false
        }
    }

    pub fn patience_exhausted(&self, patience: usize) -> bool {
        self.patience_counter >= patience
    }
}
