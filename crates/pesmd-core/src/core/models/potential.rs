use super::sample::DistancePair;

/// Energy and its gradient with respect to `(r12, r23)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub energy: f64,
    pub gradient: [f64; 2],
}

/// A scalar potential over the two distance coordinates.
///
/// The trained surrogate implements this, and so can any analytic surface,
/// which lets the integrator run without a network.
pub trait PotentialSurface: Sync {
    fn energy(&self, coords: DistancePair) -> f64;

    fn energy_and_gradient(&self, coords: DistancePair) -> SurfacePoint;
}

impl<T: PotentialSurface + ?Sized> PotentialSurface for &T {
    fn energy(&self, coords: DistancePair) -> f64 {
        (**self).energy(coords)
    }

    fn energy_and_gradient(&self, coords: DistancePair) -> SurfacePoint {
        (**self).energy_and_gradient(coords)
    }
}
