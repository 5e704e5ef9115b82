//! # pesmd
//!
//! Fits a neural potential energy surface to energies and forces of a
//! collinear three-atom system, then drives molecular dynamics on the fitted
//! surface.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless data models, the surrogate
//!   network with hand-written first and second order derivatives, the
//!   composite loss, physical constants, the gradient-to-force transform and
//!   every file format.
//!
//! - **[`engine`]: The Logic Core.** Stateful machinery: the per-sample
//!   training step, Adam, the plateau scheduler, early-stopping state, the MD
//!   integrator and checkpoint discovery.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (train, simulate,
//!   visualize) that tie the two layers together and report progress.

pub mod core;
pub mod engine;
pub mod workflows;
