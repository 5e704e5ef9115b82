//! # Workflows Module
//!
//! Top-level entry points. Each workflow validates its configuration, loads
//! what it needs, reports progress phase by phase and returns a report
//! describing what it produced.
//!
//! - **Training** ([`train`]) - Fit a surrogate to energies and forces with early stopping
//! - **Simulation** ([`simulate`]) - Run collinear MD on a surface and write trajectory files and figures
//! - **Visualization** ([`visualize`]) - Assess a surrogate against reference data and plot it

pub mod simulate;
pub mod train;
pub mod visualize;
