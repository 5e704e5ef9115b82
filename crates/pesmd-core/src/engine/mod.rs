//! # Engine Module
//!
//! Stateful machinery behind the workflows: the per-sample training step,
//! the optimiser and learning-rate schedule, early-stopping state, the
//! molecular dynamics integrator and model artifact discovery.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Immutable training and simulation settings built by builders
//! - **Error Handling** ([`error`]) - The aggregated [`error::EngineError`]
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **State Tracking** ([`state`]) - Training phases, outcomes and per-epoch records
//! - **Metrics** ([`metrics`]) - R² and absolute deviation of energy predictions
//! - **Optimisation** (`optim`) - Adam and the plateau learning-rate scheduler
//! - **Training Step** (`trainer`) - Energy and force loss with exact second-order gradients
//! - **Dynamics** ([`dynamics`]) - Explicit integration of a collinear three-atom system
//! - **Artifacts** ([`artifacts`]) - Checkpoint lookup and architecture-from-name loading
//!
//! Training and integration run on one thread. Only independent model
//! evaluations fan out over rayon when the `parallel` feature is enabled.

pub mod artifacts;
pub mod config;
pub mod dynamics;
pub mod error;
pub mod metrics;
pub(crate) mod optim;
pub mod progress;
pub mod state;
pub(crate) mod trainer;
