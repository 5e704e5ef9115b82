//! # Core Module
//!
//! Stateless building blocks: data models, the neural surrogate and its
//! derivatives, physical constants, the gradient-to-force transform and all
//! file formats.
//!
//! - **Execution Settings** ([`context`]) - Thread cap and seeded random streams
//! - **Data Models** ([`models`]) - Architectures, samples and the potential-surface trait
//! - **Neural Network** ([`nn`]) - Activations, the surrogate and the composite loss
//! - **Physics** ([`physics`]) - Unit constants, atom masses and the force transform
//! - **File I/O** ([`io`]) - Training CSV, JSON checkpoints, trajectories and PNG figures

pub mod context;
pub mod io;
pub mod models;
pub mod nn;
pub mod physics;
