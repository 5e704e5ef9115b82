use crate::core::io::plot::{Labels, SurfaceGrid, render_series, render_surface};
use crate::core::io::trajectory::{
    TrajectoryRow, read_trajectory_csv, write_trajectory_csv, write_xyz,
};
use crate::core::models::potential::PotentialSurface;
use crate::core::models::sample::DistancePair;
use crate::engine::config::SimulationConfig;
use crate::engine::dynamics::{Frame, Integrator, Termination};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

pub const TRAJECTORY_CSV_NAME: &str = "simulation_results.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub termination: Termination,
    pub frames: usize,
    pub energies: Vec<f64>,
    pub csv_path: PathBuf,
    pub xyz_path: PathBuf,
    /// Contour of the surface with the visited path, when plots are rendered.
    pub surface_plot: Option<PathBuf>,
    pub energy_plot: Option<PathBuf>,
}

impl From<&Frame> for TrajectoryRow {
    fn from(frame: &Frame) -> Self {
        Self {
            time: frame.time,
            potential: frame.potential,
            positions: frame.positions.into(),
        }
    }
}

/// Integrates the three-atom system on `surface` and writes the trajectory
/// tables and figures into `config.output_dir`.
#[instrument(skip_all, name = "simulation_workflow")]
pub fn run<S: PotentialSurface + ?Sized>(
    surface: &S,
    config: &SimulationConfig,
    reporter: &ProgressReporter,
) -> Result<SimulationReport, EngineError> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir).map_err(|e| EngineError::io(&config.output_dir, e))?;

    // === Phase 1: Integration ===
    reporter.report(Progress::PhaseStart {
        name: "Integrating",
    });
    info!(
        steps = config.steps,
        dt = config.dt,
        atoms = ?config.atoms.labels,
        "Starting molecular dynamics."
    );
    let integrator = Integrator::new(surface, &config.atoms, config.domain, config.dt);
    let trajectory = integrator.run(&config.initial, config.steps, reporter);
    reporter.report(Progress::PhaseFinish);

    if let Termination::LeftDomain { step } = trajectory.termination {
        info!(step, "Simulation ended early at the domain boundary.");
    }

    // === Phase 2: Trajectory files ===
    reporter.report(Progress::PhaseStart {
        name: "Writing Trajectory",
    });
    let csv_path = config.output_dir.join(TRAJECTORY_CSV_NAME);
    let rows: Vec<TrajectoryRow> = trajectory.frames.iter().map(TrajectoryRow::from).collect();
    write_trajectory_csv(&csv_path, &config.atoms.labels, &rows)?;

    let xyz_path = config
        .output_dir
        .join(format!("{}_trajectory.xyz", config.run_name));
    let (labels, stored) = read_trajectory_csv(&csv_path)?;
    write_xyz(&xyz_path, &labels, &stored)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Figures ===
    let (surface_plot, energy_plot) = if config.render_plots {
        reporter.report(Progress::PhaseStart {
            name: "Rendering Figures",
        });
        let grid = SurfaceGrid::sample(
            surface,
            &config.domain.contour_window(),
            config.grid_resolution,
        );
        let path: Vec<DistancePair> = trajectory.frames.iter().map(Frame::coords).collect();
        let md_plot = config.output_dir.join(format!("{}_MD.png", config.run_name));
        render_surface(
            &md_plot,
            &grid,
            &path,
            Labels {
                title: "Potential energy surface with MD path",
                x: "r12 / Å",
                y: "r23 / Å",
            },
        )?;

        let energy_plot = config
            .output_dir
            .join(format!("{}_Energy.png", config.run_name));
        render_series(
            &energy_plot,
            &trajectory.energies,
            Labels {
                title: "Total energy",
                x: "step",
                y: "E",
            },
        )?;
        reporter.report(Progress::PhaseFinish);
        (Some(md_plot), Some(energy_plot))
    } else {
        (None, None)
    };

    let report = SimulationReport {
        termination: trajectory.termination,
        frames: trajectory.frames.len(),
        energies: trajectory.energies,
        csv_path,
        xyz_path,
        surface_plot,
        energy_plot,
    };
    info!(
        frames = report.frames,
        output = %config.output_dir.display(),
        "Simulation outputs written."
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::potential::SurfacePoint;
    use crate::engine::config::{InitialConditions, SimulationConfigBuilder};
    use std::path::Path;
    use tempfile::tempdir;

    struct Bowl;

    impl PotentialSurface for Bowl {
        fn energy(&self, c: DistancePair) -> f64 {
            0.5 * ((c.r12 - 2.0).powi(2) + (c.r23 - 1.1).powi(2))
        }

        fn energy_and_gradient(&self, c: DistancePair) -> SurfacePoint {
            SurfacePoint {
                energy: self.energy(c),
                gradient: [c.r12 - 2.0, c.r23 - 1.1],
            }
        }
    }

    fn config(dir: &Path, initial: InitialConditions, steps: usize, plots: bool) -> SimulationConfig {
        SimulationConfigBuilder::new()
            .initial(initial)
            .steps(steps)
            .dt(1e-18)
            .output_dir(dir.to_path_buf())
            .run_name("test")
            .grid_resolution(10)
            .render_plots(plots)
            .build()
            .unwrap()
    }

    #[test]
    fn domain_exit_at_first_step_still_writes_every_output() {
        let dir = tempdir().unwrap();
        let initial = InitialConditions {
            positions: [9.0, 0.0, -1.0],
            velocities: [0.0; 3],
        };
        let report = run(&Bowl, &config(dir.path(), initial, 50, true), &ProgressReporter::new())
            .unwrap();

        assert_eq!(report.termination, Termination::LeftDomain { step: 0 });
        assert_eq!(report.frames, 1);
        assert!(report.energies.is_empty());
        let csv = fs::read_to_string(&report.csv_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        let xyz = fs::read_to_string(&report.xyz_path).unwrap();
        assert_eq!(xyz.lines().count(), 5);
        assert!(xyz.contains("Time = 0.00000e+00 seconds"));
        assert_eq!(report.surface_plot, Some(dir.path().join("test_MD.png")));
        assert_eq!(report.energy_plot, Some(dir.path().join("test_Energy.png")));
        for plot in [&report.surface_plot, &report.energy_plot] {
            let path = plot.as_ref().unwrap();
            assert!(fs::metadata(path).unwrap().len() > 0);
        }
    }

    #[test]
    fn plots_can_be_skipped() {
        let dir = tempdir().unwrap();
        let report = run(
            &Bowl,
            &config(dir.path(), InitialConditions::default(), 5, false),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(report.surface_plot, None);
        assert_eq!(report.energy_plot, None);
        assert!(!dir.path().join("test_MD.png").exists());
    }

    #[test]
    fn completed_run_writes_all_outputs() {
        let dir = tempdir().unwrap();
        let report = run(
            &Bowl,
            &config(dir.path(), InitialConditions::default(), 20, true),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(report.termination, Termination::Completed);
        assert_eq!(report.frames, 20);
        assert_eq!(report.energies.len(), 20);
        assert_eq!(report.csv_path, dir.path().join("simulation_results.csv"));
        assert_eq!(report.xyz_path, dir.path().join("test_trajectory.xyz"));
        for plot in [&report.surface_plot, &report.energy_plot] {
            let path = plot.as_ref().unwrap();
            assert!(fs::metadata(path).unwrap().len() > 0);
        }
        let (labels, rows) = read_trajectory_csv(&report.csv_path).unwrap();
        assert_eq!(labels, ["Ne", "H", "H"]);
        assert_eq!(rows[0].positions, [3.0, 0.0, -1.108]);
    }
}
