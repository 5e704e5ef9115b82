use crate::core::models::sample::DistancePair;
use thiserror::Error;

/// Length scale dividing every raw surrogate gradient.
pub const BOHR_LENGTH_SCALE: f64 = 0.529;
/// Hartree/Å to newton, used to turn a mass into an effective mass.
pub const HARTREE_PER_ANGSTROM_TO_NEWTON: f64 = 4.3597e-8;
pub const AMU_TO_KG: f64 = 1.661e-27;
/// Velocities (m/s) times seconds times this gives Å.
pub const POSITION_SCALE: f64 = 1e10;
pub const POTENTIAL_ENERGY_SCALE: f64 = 8.314;
pub const KINETIC_ENERGY_SCALE: f64 = 1e20 / 1.609;

pub const R12_MAX: f64 = 4.0;
pub const R23_MAX: f64 = 3.99;
pub const CONTOUR_MIN: f64 = 0.5;

pub const VANISHING_GRADIENT_EPSILON: f64 = 1e-6;

static ELEMENT_MASSES: phf::Map<&'static str, f64> = phf::phf_map! {
    "H" => 1.0079,
    "D" => 2.0141,
    "He" => 4.0026,
    "Li" => 6.941,
    "C" => 12.0107,
    "N" => 14.0067,
    "O" => 15.9994,
    "F" => 18.9984,
    "Ne" => 20.1797,
    "Na" => 22.9898,
    "Cl" => 35.453,
    "Ar" => 39.948,
    "Br" => 79.904,
    "Kr" => 83.798,
    "I" => 126.904,
    "Xe" => 131.293,
};

#[derive(Debug, Error, PartialEq, Clone)]
pub enum AtomError {
    #[error("Unknown element '{0}' and no explicit mass given")]
    UnknownElement(String),
    #[error("Mass of atom '{label}' must be positive (got {mass})")]
    NonPositiveMass { label: String, mass: f64 },
}

pub fn element_mass(symbol: &str) -> Option<f64> {
    ELEMENT_MASSES.get(symbol).copied()
}

/// Labels and masses (amu) of the three collinear atoms, in chain order.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomTriple {
    pub labels: [String; 3],
    pub masses: [f64; 3],
}

impl Default for AtomTriple {
    fn default() -> Self {
        Self {
            labels: ["Ne".to_string(), "H".to_string(), "H".to_string()],
            masses: [20.1797, 1.0079, 1.0079],
        }
    }
}

impl AtomTriple {
    /// Resolves masses from the element table.
    pub fn from_symbols(symbols: [&str; 3]) -> Result<Self, AtomError> {
        let mut masses = [0.0; 3];
        for (mass, symbol) in masses.iter_mut().zip(symbols) {
            *mass = element_mass(symbol).ok_or_else(|| AtomError::UnknownElement(symbol.to_string()))?;
        }
        Ok(Self {
            labels: symbols.map(str::to_string),
            masses,
        })
    }

    pub fn with_masses(labels: [String; 3], masses: [f64; 3]) -> Result<Self, AtomError> {
        for (label, &mass) in labels.iter().zip(&masses) {
            if !mass.is_finite() || mass <= 0.0 {
                return Err(AtomError::NonPositiveMass {
                    label: label.clone(),
                    mass,
                });
            }
        }
        Ok(Self { labels, masses })
    }

    /// `m_i·amu / 4.3597e-8`, the divisor turning a force into an acceleration.
    pub fn effective_masses(&self) -> [f64; 3] {
        self.masses
            .map(|m| m * AMU_TO_KG / HARTREE_PER_ANGSTROM_TO_NEWTON)
    }
}

/// Rectangle of `(r12, r23)` on which the surrogate was trained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainBounds {
    pub r12: (f64, f64),
    pub r23: (f64, f64),
}

impl Default for DomainBounds {
    fn default() -> Self {
        Self {
            r12: (0.0, R12_MAX),
            r23: (0.0, R23_MAX),
        }
    }
}

impl DomainBounds {
    pub fn contains(&self, coords: DistancePair) -> bool {
        (self.r12.0..=self.r12.1).contains(&coords.r12) && (self.r23.0..=self.r23.1).contains(&coords.r23)
    }

    /// Square plotting window: lower edges raised to [`CONTOUR_MIN`], both
    /// axes running up to the larger of the two upper bounds.
    pub fn contour_window(&self) -> Self {
        let top = self.r12.1.max(self.r23.1);
        Self {
            r12: (self.r12.0.max(CONTOUR_MIN), top),
            r23: (self.r23.0.max(CONTOUR_MIN), top),
        }
    }
}
