//! File formats: training data, checkpoints, trajectories, run reports and figures.

pub mod checkpoint;
pub mod dataset;
pub mod plot;
pub mod report;
pub mod trajectory;
