//! Particles, integrators and the simulation interface common to the tree
//! and direct-summation solvers.

use nalgebra::{RealField, Vector3};

use crate::config::SimulationSettings;
use crate::error::{Error, Result};

/// Real scalar the simulations are generic over (`f32` or `f64`).
pub trait Float: RealField + Copy {}

impl<T: RealField + Copy> Float for T {}

/// Positions, velocities and forces.
pub type Vector<F> = Vector3<F>;

pub trait VectorExt<F: Float>: Sized {
    /// Componentwise division that refuses a zero divisor.
    fn try_div(&self, rhs: F) -> Result<Self>;
}

impl<F: Float> VectorExt<F> for Vector<F> {
    fn try_div(&self, rhs: F) -> Result<Self> {
        if rhs == F::zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(*self / rhs)
    }
}

pub trait Particle<F: Float> {
    fn new(id: usize, position: Vector<F>, velocity: Vector<F>, mass: F) -> Self
    where
        Self: Sized;

    fn id(&self) -> usize;
    fn position(&self) -> &Vector<F>;
    fn velocity(&self) -> &Vector<F>;
    /// Net force accumulated during the current force phase.
    fn force(&self) -> &Vector<F>;
    /// Gravitational potential energy accumulated during the current potential pass.
    fn potential(&self) -> F;
    fn position_mut(&mut self) -> &mut Vector<F>;
    fn velocity_mut(&mut self) -> &mut Vector<F>;
    fn force_mut(&mut self) -> &mut Vector<F>;
    fn potential_mut(&mut self) -> &mut F;
    fn get_mass(&self) -> F;

    fn acceleration(&self) -> Vector<F> {
        *self.force() / self.get_mass()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointParticle<F: Float> {
    pub id: usize,
    pub position: Vector<F>,
    pub velocity: Vector<F>,
    pub force: Vector<F>,
    pub potential: F,
    pub mass: F,
}

impl<F: Float> Particle<F> for PointParticle<F> {
    fn new(id: usize, position: Vector<F>, velocity: Vector<F>, mass: F) -> Self {
        Self {
            id,
            position,
            velocity,
            force: Vector::zeros(),
            potential: F::zero(),
            mass,
        }
    }

    fn id(&self) -> usize {
        self.id
    }

    fn position(&self) -> &Vector<F> {
        &self.position
    }

    fn velocity(&self) -> &Vector<F> {
        &self.velocity
    }

    fn force(&self) -> &Vector<F> {
        &self.force
    }

    fn potential(&self) -> F {
        self.potential
    }

    fn position_mut(&mut self) -> &mut Vector<F> {
        &mut self.position
    }

    fn velocity_mut(&mut self) -> &mut Vector<F> {
        &mut self.velocity
    }

    fn force_mut(&mut self) -> &mut Vector<F> {
        &mut self.force
    }

    fn potential_mut(&mut self) -> &mut F {
        &mut self.potential
    }

    fn get_mass(&self) -> F {
        self.mass
    }
}

/// Checks the construction contract shared by every simulation: at least one
/// particle, finite state and strictly positive finite masses.
pub fn validate_particles<F: Float, P: Particle<F>>(points: &[P]) -> Result<()> {
    if points.is_empty() {
        return Err(Error::EmptyParticleSet);
    }
    for (index, point) in points.iter().enumerate() {
        let id = point.id();
        if !point.position().iter().all(|c| c.is_finite()) {
            return Err(Error::InvalidParticle {
                index,
                id,
                reason: "position is not finite",
            });
        }
        if !point.velocity().iter().all(|c| c.is_finite()) {
            return Err(Error::InvalidParticle {
                index,
                id,
                reason: "velocity is not finite",
            });
        }
        let mass = point.get_mass();
        if !mass.is_finite() || mass <= F::zero() {
            return Err(Error::InvalidParticle {
                index,
                id,
                reason: "mass must be positive and finite",
            });
        }
    }
    Ok(())
}

pub fn kinetic_energy<F: Float, P: Particle<F>>(points: &[P]) -> F {
    let half: F = nalgebra::convert(0.5);
    points
        .iter()
        .map(|p| half * p.get_mass() * p.velocity().norm_squared())
        .fold(F::zero(), |acc, e| acc + e)
}

/// Half the sum of per-particle potentials, so every pair is counted once.
pub fn potential_energy<F: Float, P: Particle<F>>(points: &[P]) -> F {
    let half: F = nalgebra::convert(0.5);
    points
        .iter()
        .map(|p| p.potential())
        .fold(F::zero(), |acc, e| acc + e)
        * half
}

pub trait Simulation<F: Float, P: Particle<F>, I: Integrator<F, P>> {
    fn new(points: Vec<P>, integrator: I, settings: SimulationSettings<F>) -> Result<Self>
    where
        Self: Sized;
    fn init(&mut self) -> Result<()>;
    fn settings(&self) -> &SimulationSettings<F>;
    fn settings_mut(&mut self) -> &mut SimulationSettings<F>;
    fn elapsed(&self) -> F;
    fn update_forces(&mut self) -> Result<()>;
    fn step_by(&mut self, dt: F) -> Result<()>;
    fn get_points(&self) -> &[P];
}

/// Advances particle state around the force phase of a step.
///
/// A step runs `integrate_pre_force`, then the simulation's force phase, then
/// `integrate_after_force`.
pub trait Integrator<F: Float, P: Particle<F>> {
    fn init(&mut self) {}
    fn integrate_pre_force(&mut self, points: &mut [P], dt: F);
    fn integrate_after_force(&mut self, points: &mut [P], dt: F);
}

/// Semi-implicit Euler: the velocity is updated from the fresh force, then the
/// position from the new velocity. All work happens after the force phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct EulerCromerIntegrator;

impl<F: Float, P: Particle<F>> Integrator<F, P> for EulerCromerIntegrator {
    fn integrate_pre_force(&mut self, _points: &mut [P], _dt: F) {}

    fn integrate_after_force(&mut self, points: &mut [P], dt: F) {
        for point in points.iter_mut() {
            let acceleration = point.acceleration();
            *point.velocity_mut() += acceleration * dt;
            let velocity = *point.velocity();
            *point.position_mut() += velocity * dt;
        }
    }
}

/// Kick-drift-kick leapfrog. The first half kick and the drift use the force
/// left over from the previous step, so call `Simulation::init` first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeapFrogIntegrator;

impl<F: Float, P: Particle<F>> Integrator<F, P> for LeapFrogIntegrator {
    fn integrate_pre_force(&mut self, points: &mut [P], dt: F) {
        let half_dt: F = dt * nalgebra::convert::<f64, F>(0.5);
        for point in points.iter_mut() {
            let acceleration = point.acceleration();
            *point.velocity_mut() += acceleration * half_dt;
            let velocity = *point.velocity();
            *point.position_mut() += velocity * dt;
        }
    }

    fn integrate_after_force(&mut self, points: &mut [P], dt: F) {
        let half_dt: F = dt * nalgebra::convert::<f64, F>(0.5);
        for point in points.iter_mut() {
            let acceleration = point.acceleration();
            *point.velocity_mut() += acceleration * half_dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(id: usize, position: [f64; 3], mass: f64) -> PointParticle<f64> {
        PointParticle::new(id, position.into(), Vector::zeros(), mass)
    }

    #[test]
    fn test_try_div_rejects_zero() {
        let v = Vector::new(1.0, 2.0, 3.0);
        assert_eq!(v.try_div(0.0), Err(Error::DivisionByZero));
        assert_eq!(v.try_div(2.0), Ok(Vector::new(0.5, 1.0, 1.5)));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let empty: Vec<PointParticle<f64>> = Vec::new();
        assert_eq!(validate_particles(&empty), Err(Error::EmptyParticleSet));

        let nan = vec![particle(0, [0.0, 0.0, 0.0], 1.0), particle(42, [f64::NAN, 0.0, 0.0], 1.0)];
        assert_eq!(
            validate_particles(&nan),
            Err(Error::InvalidParticle {
                index: 1,
                id: 42,
                reason: "position is not finite",
            })
        );

        let massless = vec![particle(0, [0.0, 0.0, 0.0], 0.0)];
        assert!(matches!(
            validate_particles(&massless),
            Err(Error::InvalidParticle { index: 0, .. })
        ));

        assert_eq!(validate_particles(&[particle(0, [1.0, 2.0, 3.0], 2.0)]), Ok(()));
    }

    #[test]
    fn test_euler_cromer_uses_updated_velocity() {
        let mut points = vec![particle(0, [0.0, 0.0, 0.0], 2.0)];
        points[0].force = Vector::new(4.0, 0.0, 0.0);

        let mut integrator = EulerCromerIntegrator;
        Integrator::<f64, _>::integrate_pre_force(&mut integrator, &mut points, 0.5);
        assert_eq!(points[0].position, Vector::zeros());

        integrator.integrate_after_force(&mut points, 0.5);
        // a = 2, v = 1, x = v * dt
        assert_eq!(points[0].velocity, Vector::new(1.0, 0.0, 0.0));
        assert_eq!(points[0].position, Vector::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_leapfrog_splits_kicks_around_force_phase() {
        let mut points = vec![particle(0, [0.0, 0.0, 0.0], 1.0)];
        points[0].force = Vector::new(2.0, 0.0, 0.0);

        let mut integrator = LeapFrogIntegrator;
        integrator.integrate_pre_force(&mut points, 1.0);
        assert_eq!(points[0].velocity, Vector::new(1.0, 0.0, 0.0));
        assert_eq!(points[0].position, Vector::new(1.0, 0.0, 0.0));

        points[0].force = Vector::new(-2.0, 0.0, 0.0);
        integrator.integrate_after_force(&mut points, 1.0);
        assert_eq!(points[0].velocity, Vector::zeros());
    }

    #[test]
    fn test_energy_helpers() {
        let mut a = particle(0, [0.0, 0.0, 0.0], 2.0);
        a.velocity = Vector::new(3.0, 0.0, 0.0);
        a.potential = -4.0;
        let mut b = particle(1, [1.0, 0.0, 0.0], 1.0);
        b.potential = -4.0;
        let points = vec![a, b];

        assert_eq!(kinetic_energy(&points), 9.0);
        assert_eq!(potential_energy(&points), -4.0);
    }
}
