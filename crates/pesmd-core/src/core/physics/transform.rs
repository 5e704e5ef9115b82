//! Conversion between the gradient over `(r12, r23)` and the forces on the
//! three atoms. Training and dynamics both go through this module.

use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomForces {
    pub f1: f64,
    pub f2: f64,
    pub f3: f64,
}

impl AtomForces {
    /// Ordering used by the training targets `(z2, z3, z4)`.
    pub fn target_order(&self) -> [f64; 3] {
        [self.f2, self.f3, self.f1]
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.f1, self.f2, self.f3)
    }

    pub fn sum(&self) -> f64 {
        self.f1 + self.f2 + self.f3
    }
}

/// `F1 = -g12`, `F2 = g12 - g23`, `F3 = g23`.
#[inline]
pub fn forces_from_gradient(gradient: [f64; 2]) -> AtomForces {
    let [g12, g23] = gradient;
    AtomForces {
        f1: -g12,
        f2: g12 - g23,
        f3: g23,
    }
}

/// Vector-Jacobian product of `g ↦ forces_from_gradient(g).target_order()`.
#[inline]
pub fn target_order_cotangent(d_target: [f64; 3]) -> [f64; 2] {
    let [d_f2, d_f3, d_f1] = d_target;
    [d_f2 - d_f1, d_f3 - d_f2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forces_sum_to_zero() {
        for g in [[0.0, 0.0], [1.5, -2.0], [-3.25, 0.125], [1e6, 1e-6]] {
            assert!(forces_from_gradient(g).sum().abs() < 1e-9);
        }
    }

    #[test]
    fn mapping_uses_fixed_signs() {
        let f = forces_from_gradient([2.0, 0.5]);
        assert_eq!(f, AtomForces { f1: -2.0, f2: 1.5, f3: 0.5 });
        assert_eq!(f.target_order(), [1.5, 0.5, -2.0]);
    }

    #[test]
    fn cotangent_matches_finite_differences() {
        let d = [0.3, -0.7, 1.1];
        let objective = |g: [f64; 2]| -> f64 {
            let t = forces_from_gradient(g).target_order();
            t.iter().zip(d.iter()).map(|(a, b)| a * b).sum()
        };
        let vjp = target_order_cotangent(d);
        let h = 1e-6;
        let base = [0.4, -0.2];
        for i in 0..2 {
            let mut plus = base;
            plus[i] += h;
            let mut minus = base;
            minus[i] -= h;
            let numeric = (objective(plus) - objective(minus)) / (2.0 * h);
            assert!((numeric - vjp[i]).abs() < 1e-8);
        }
    }
}
