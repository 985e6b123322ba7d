//! Inverse-square interaction between a body and a point mass.

use crate::shared::{Float, Vector};

/// Plummer-softened Newtonian gravity. With `softening == 0` this is the exact
/// `G m1 m2 / r^2` law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityKernel<F: Float> {
    pub g: F,
    pub softening: F,
}

impl<F: Float> GravityKernel<F> {
    pub fn new(g: F, softening: F) -> Self {
        Self { g, softening }
    }

    /// Force on a body of mass `target_mass` exerted by `source_mass`, where `r`
    /// points from the body to the source and `distance_squared == |r|^2`.
    #[inline]
    pub fn force(&self, r: &Vector<F>, distance_squared: F, target_mass: F, source_mass: F) -> Vector<F> {
        let softened = distance_squared + self.softening * self.softening;
        let inv_r = F::one() / softened.sqrt();
        let inv_r3 = inv_r * inv_r * inv_r;
        *r * (self.g * target_mass * source_mass * inv_r3)
    }

    #[inline]
    pub fn potential(&self, distance_squared: F, target_mass: F, source_mass: F) -> F {
        let softened = distance_squared + self.softening * self.softening;
        -(self.g * target_mass * source_mass) / softened.sqrt()
    }
}
