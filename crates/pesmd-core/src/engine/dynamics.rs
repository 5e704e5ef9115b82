use super::config::InitialConditions;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::potential::PotentialSurface;
use crate::core::models::sample::DistancePair;
use crate::core::physics::constants::{
    AMU_TO_KG, AtomTriple, BOHR_LENGTH_SCALE, DomainBounds, KINETIC_ENERGY_SCALE,
    POSITION_SCALE, POTENTIAL_ENERGY_SCALE,
};
use crate::core::physics::transform::forces_from_gradient;
use nalgebra::Vector3;
use tracing::{debug, warn};

const PROGRESS_CHUNKS: usize = 100;

/// Positions, velocities and surface energy at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub time: f64,
    pub potential: f64,
    pub positions: Vector3<f64>,
    pub velocities: Vector3<f64>,
}

impl Frame {
    pub fn coords(&self) -> DistancePair {
        DistancePair::from_positions(&self.positions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Completed,
    /// The configuration at `step` fell outside the trained domain. That
    /// frame is recorded, but no energy or update follows it.
    LeftDomain { step: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub frames: Vec<Frame>,
    /// Total energy of every in-domain frame.
    pub energies: Vec<f64>,
    pub termination: Termination,
}

/// Mutable phase-space point of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MdState {
    pub positions: Vector3<f64>,
    pub velocities: Vector3<f64>,
}

impl From<&InitialConditions> for MdState {
    fn from(init: &InitialConditions) -> Self {
        Self {
            positions: Vector3::from(init.positions),
            velocities: Vector3::from(init.velocities),
        }
    }
}

/// Explicit integrator for three atoms on a line, driven by the gradient of
/// a surface over `(r12, r23)`.
pub struct Integrator<'a, S: PotentialSurface + ?Sized> {
    surface: &'a S,
    masses: Vector3<f64>,
    effective_masses: Vector3<f64>,
    domain: DomainBounds,
    dt: f64,
}

impl<'a, S: PotentialSurface + ?Sized> Integrator<'a, S> {
    pub fn new(surface: &'a S, atoms: &AtomTriple, domain: DomainBounds, dt: f64) -> Self {
        Self {
            surface,
            masses: Vector3::from(atoms.masses),
            effective_masses: Vector3::from(atoms.effective_masses()),
            domain,
            dt,
        }
    }

    /// `V·8.314 + Σ ½·mᵢ·amu·vᵢ²·1e20/1.609`.
    pub fn total_energy(&self, potential: f64, velocities: &Vector3<f64>) -> f64 {
        let kinetic: f64 = self
            .masses
            .iter()
            .zip(velocities.iter())
            .map(|(m, v)| 0.5 * m * AMU_TO_KG * v * v * KINETIC_ENERGY_SCALE)
            .sum();
        potential * POTENTIAL_ENERGY_SCALE + kinetic
    }

    /// Advances `state` by one step given the surface gradient at its
    /// current configuration. Positions move with the old velocities.
    fn advance(&self, state: &mut MdState, gradient: [f64; 2]) {
        let scaled = [gradient[0] / BOHR_LENGTH_SCALE, gradient[1] / BOHR_LENGTH_SCALE];
        let forces = forces_from_gradient(scaled).as_vector();
        state.positions += state.velocities * (self.dt * POSITION_SCALE);
        let acceleration = forces.component_div(&self.effective_masses);
        state.velocities += acceleration * self.dt;
    }

    pub fn run(
        &self,
        initial: &InitialConditions,
        steps: usize,
        reporter: &ProgressReporter,
    ) -> Trajectory {
        let mut state = MdState::from(initial);
        let mut frames = Vec::with_capacity(steps.min(1 << 20));
        let mut energies = Vec::with_capacity(steps.min(1 << 20));
        let mut termination = Termination::Completed;

        let chunk = (steps / PROGRESS_CHUNKS).max(1);
        reporter.report(Progress::TaskStart {
            total: steps.div_ceil(chunk) as u64,
        });

        for step in 0..steps {
            let coords = DistancePair::from_positions(&state.positions);
            let point = self.surface.energy_and_gradient(coords);
            frames.push(Frame {
                time: step as f64 * self.dt,
                potential: point.energy,
                positions: state.positions,
                velocities: state.velocities,
            });

            if !self.domain.contains(coords) {
                warn!(
                    step,
                    r12 = coords.r12,
                    r23 = coords.r23,
                    "Trajectory left the trained domain; stopping."
                );
                termination = Termination::LeftDomain { step };
                break;
            }

            energies.push(self.total_energy(point.energy, &state.velocities));
            self.advance(&mut state, point.gradient);

            if (step + 1) % chunk == 0 {
                reporter.report(Progress::TaskIncrement);
            }
        }
        reporter.report(Progress::TaskFinish);

        debug!(frames = frames.len(), ?termination, "Integration finished.");
        Trajectory {
            frames,
            energies,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::potential::SurfacePoint;

    struct Flat(f64);

    impl PotentialSurface for Flat {
        fn energy(&self, _: DistancePair) -> f64 {
            self.0
        }

        fn energy_and_gradient(&self, _: DistancePair) -> SurfacePoint {
            SurfacePoint {
                energy: self.0,
                gradient: [0.0, 0.0],
            }
        }
    }

    struct Tilted;

    impl PotentialSurface for Tilted {
        fn energy(&self, c: DistancePair) -> f64 {
            c.r12
        }

        fn energy_and_gradient(&self, c: DistancePair) -> SurfacePoint {
            SurfacePoint {
                energy: c.r12,
                gradient: [1.0, 0.0],
            }
        }
    }

    fn approx_equal(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
    }

    #[test]
    fn constant_potential_gives_free_flight() {
        let atoms = AtomTriple::default();
        let dt = 1e-18;
        let integrator = Integrator::new(&Flat(-0.5), &atoms, DomainBounds::default(), dt);
        let init = InitialConditions {
            positions: [3.0, 0.0, -1.0],
            velocities: [-1000.0, 0.0, 0.0],
        };
        let traj = integrator.run(&init, 50, &ProgressReporter::new());

        assert_eq!(traj.termination, Termination::Completed);
        assert_eq!(traj.frames.len(), 50);
        assert_eq!(traj.energies.len(), 50);
        for (n, frame) in traj.frames.iter().enumerate() {
            assert_eq!(frame.velocities, Vector3::new(-1000.0, 0.0, 0.0));
            let expected = 3.0 - 1000.0 * dt * POSITION_SCALE * n as f64;
            assert!(approx_equal(frame.positions.x, expected, 1e-12));
            assert!(approx_equal(frame.time, n as f64 * dt, 1e-12));
        }
        let e0 = traj.energies[0];
        assert!(traj.energies.iter().all(|&e| approx_equal(e, e0, 1e-12)));
    }

    #[test]
    fn exit_at_first_step_records_one_frame() {
        let atoms = AtomTriple::default();
        let integrator = Integrator::new(&Flat(0.0), &atoms, DomainBounds::default(), 1e-18);
        let init = InitialConditions {
            positions: [5.0, 0.0, -1.0],
            velocities: [0.0; 3],
        };
        let traj = integrator.run(&init, 100, &ProgressReporter::new());
        assert_eq!(traj.termination, Termination::LeftDomain { step: 0 });
        assert_eq!(traj.frames.len(), 1);
        assert!(traj.energies.is_empty());
    }

    #[test]
    fn positions_update_before_velocities() {
        let atoms = AtomTriple::default();
        let dt = 1e-15;
        let integrator = Integrator::new(&Tilted, &atoms, DomainBounds::default(), dt);
        let init = InitialConditions {
            positions: [2.0, 0.0, -1.0],
            velocities: [0.0; 3],
        };
        let traj = integrator.run(&init, 2, &ProgressReporter::new());
        // Zero initial velocity: the first update moves nothing but accelerates.
        assert_eq!(traj.frames[1].positions, traj.frames[0].positions);
        let m_eff = atoms.effective_masses();
        let g = 1.0 / BOHR_LENGTH_SCALE;
        let expected_v1 = -g / m_eff[0] * dt;
        let expected_v2 = g / m_eff[1] * dt;
        assert!(approx_equal(traj.frames[1].velocities.x, expected_v1, 1e-12));
        assert!(approx_equal(traj.frames[1].velocities.y, expected_v2, 1e-12));
        assert_eq!(traj.frames[1].velocities.z, 0.0);
    }

    #[test]
    fn total_energy_combines_scaled_potential_and_kinetic_terms() {
        let atoms = AtomTriple::default();
        let integrator = Integrator::new(&Flat(0.0), &atoms, DomainBounds::default(), 1e-18);
        let v = Vector3::new(-20000.0, 0.0, 0.0);
        let expected = 2.0 * 8.314 + 0.5 * 20.1797 * 1.661e-27 * 4e8 * 1e20 / 1.609;
        assert!(approx_equal(integrator.total_energy(2.0, &v), expected, 1e-12));
    }
}
