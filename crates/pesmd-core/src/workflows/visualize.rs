use crate::core::io::plot::{Labels, SurfaceGrid, render_error_map, render_parity, render_surface};
use crate::core::models::potential::PotentialSurface;
use crate::core::models::sample::Dataset;
use crate::core::physics::constants::DomainBounds;
use crate::engine::error::EngineError;
use crate::engine::metrics::{Deviation, deviation, r2_score};
use crate::engine::progress::{Progress, ProgressReporter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const PARITY_PLOT_NAME: &str = "assess.png";
pub const SURFACE_PLOT_NAME: &str = "ax2.png";
pub const ERROR_PLOT_NAME: &str = "error.png";

#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationReport {
    pub r2: f64,
    pub deviation: Deviation,
    pub parity_plot: PathBuf,
    pub surface_plot: PathBuf,
    pub error_plot: PathBuf,
}

/// Compares `surface` with the reference energies of `dataset` and renders
/// the parity, surface and error figures into `output_dir`.
#[instrument(skip_all, name = "visualization_workflow")]
pub fn run<S: PotentialSurface + ?Sized>(
    surface: &S,
    dataset: &Dataset,
    window: &DomainBounds,
    grid_resolution: usize,
    output_dir: &Path,
    reporter: &ProgressReporter,
) -> Result<VisualizationReport, EngineError> {
    if dataset.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    fs::create_dir_all(output_dir).map_err(|e| EngineError::io(output_dir, e))?;

    reporter.report(Progress::PhaseStart {
        name: "Evaluating Model",
    });
    let coords = dataset.coords();
    let truth = dataset.energies();

    #[cfg(not(feature = "parallel"))]
    let iterator = coords.iter();

    #[cfg(feature = "parallel")]
    let iterator = coords.par_iter();

    let predicted: Vec<f64> = iterator.map(|&c| surface.energy(c)).collect();
    let errors: Vec<f64> = predicted.iter().zip(&truth).map(|(p, t)| p - t).collect();
    let r2 = r2_score(&truth, &predicted);
    let deviation = deviation(&truth, &predicted);
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Rendering Figures",
    });
    let parity_plot = output_dir.join(PARITY_PLOT_NAME);
    render_parity(
        &parity_plot,
        &truth,
        &predicted,
        Labels {
            title: "Predicted against reference energy",
            x: "reference",
            y: "predicted",
        },
    )?;

    let surface_plot = output_dir.join(SURFACE_PLOT_NAME);
    let grid = SurfaceGrid::sample(surface, window, grid_resolution);
    render_surface(
        &surface_plot,
        &grid,
        &[],
        Labels {
            title: "Predicted potential energy surface",
            x: "r12 / Å",
            y: "r23 / Å",
        },
    )?;

    let error_plot = output_dir.join(ERROR_PLOT_NAME);
    render_error_map(
        &error_plot,
        &coords,
        &errors,
        Labels {
            title: "Prediction error",
            x: "r12 / Å",
            y: "r23 / Å",
        },
    )?;
    reporter.report(Progress::PhaseFinish);

    info!(
        r2,
        mean_abs = deviation.mean_abs,
        max_abs = deviation.max_abs,
        "Model assessment complete."
    );
    Ok(VisualizationReport {
        r2,
        deviation,
        parity_plot,
        surface_plot,
        error_plot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::potential::SurfacePoint;
    use crate::core::models::sample::{DistancePair, Sample};
    use tempfile::tempdir;

    struct Plane;

    impl PotentialSurface for Plane {
        fn energy(&self, c: DistancePair) -> f64 {
            c.r12 + 2.0 * c.r23
        }

        fn energy_and_gradient(&self, c: DistancePair) -> SurfacePoint {
            SurfacePoint {
                energy: self.energy(c),
                gradient: [1.0, 2.0],
            }
        }
    }

    fn dataset(offset: f64) -> Dataset {
        [(1.0, 1.0), (2.0, 1.5), (3.0, 0.5), (1.5, 2.5)]
            .into_iter()
            .map(|(r12, r23)| Sample {
                coords: DistancePair::new(r12, r23),
                energy: r12 + 2.0 * r23 + offset,
                forces: [0.0; 3],
            })
            .collect()
    }

    #[test]
    fn exact_surface_scores_perfectly_and_writes_figures() {
        let dir = tempdir().unwrap();
        let report = run(
            &Plane,
            &dataset(0.0),
            &DomainBounds::default().contour_window(),
            8,
            dir.path(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!((report.r2 - 1.0).abs() < 1e-12);
        assert_eq!(report.deviation.max_abs, 0.0);
        for path in [&report.parity_plot, &report.surface_plot, &report.error_plot] {
            assert!(fs::metadata(path).unwrap().len() > 0);
        }
        assert_eq!(report.parity_plot, dir.path().join("assess.png"));
    }

    #[test]
    fn constant_offset_shows_up_as_deviation() {
        let dir = tempdir().unwrap();
        let report = run(
            &Plane,
            &dataset(0.25),
            &DomainBounds::default(),
            4,
            dir.path(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!((report.deviation.mean_abs - 0.25).abs() < 1e-12);
        assert!((report.deviation.max_abs - 0.25).abs() < 1e-12);
        assert!(report.r2 < 1.0);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let dir = tempdir().unwrap();
        let result = run(
            &Plane,
            &Dataset::default(),
            &DomainBounds::default(),
            4,
            dir.path(),
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(EngineError::EmptyDataset)));
    }
}
