use nalgebra::{DVector, Vector3};

/// The two independent coordinates of a collinear three-body system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistancePair {
    pub r12: f64,
    pub r23: f64,
}

impl DistancePair {
    pub fn new(r12: f64, r23: f64) -> Self {
        Self { r12, r23 }
    }

    /// `r12 = x1 - x2`, `r23 = x2 - x3`.
    pub fn from_positions(positions: &Vector3<f64>) -> Self {
        Self {
            r12: positions.x - positions.y,
            r23: positions.y - positions.z,
        }
    }

    pub fn to_input(&self) -> DVector<f64> {
        DVector::from_column_slice(&[self.r12, self.r23])
    }

    pub fn is_finite(&self) -> bool {
        self.r12.is_finite() && self.r23.is_finite()
    }
}

/// One reference calculation: coordinates, energy `z1` and target forces
/// `(z2, z3, z4)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub coords: DistancePair,
    pub energy: f64,
    pub forces: [f64; 3],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn coords(&self) -> Vec<DistancePair> {
        self.samples.iter().map(|s| s.coords).collect()
    }

    pub fn energies(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.energy).collect()
    }
}

impl FromIterator<Sample> for Dataset {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
