use crate::config::SimulationSettings;
use crate::error::Result;
use crate::shared::{
    EulerCromerIntegrator, Float, Integrator, Particle, Simulation, kinetic_energy, potential_energy,
    validate_particles,
};

/// Direct O(N^2) summation over every pair. Slow, but exact up to rounding,
/// which makes it the reference the tree is checked against.
#[derive(Clone, Debug)]
pub struct BruteForceSimulation<F: Float, P, I = EulerCromerIntegrator>
where
    P: Particle<F>,
    I: Integrator<F, P>,
{
    points: Vec<P>,
    integrator: I,
    settings: SimulationSettings<F>,
    elapsed: F,
}

impl<F: Float, P, I> BruteForceSimulation<F, P, I>
where
    P: Particle<F>,
    I: Integrator<F, P>,
{
    /// Fills every particle's potential with its exact pairwise sum.
    pub fn calculate_potentials(&mut self) {
        let kernel = self.settings.kernel();
        let epsilon = self.settings.coincidence_epsilon;
        for point in self.points.iter_mut() {
            *point.potential_mut() = F::zero();
        }
        for i in 0..self.points.len() {
            for j in 0..i {
                let r = self.points[j].position() - self.points[i].position();
                let d2 = r.norm_squared();
                if d2 < epsilon {
                    continue;
                }
                let phi = kernel.potential(d2, self.points[i].get_mass(), self.points[j].get_mass());
                *self.points[i].potential_mut() += phi;
                *self.points[j].potential_mut() += phi;
            }
        }
    }

    pub fn total_energy(&mut self) -> F {
        self.calculate_potentials();
        kinetic_energy(&self.points) + potential_energy(&self.points)
    }
}

impl<F: Float, P, I> Simulation<F, P, I> for BruteForceSimulation<F, P, I>
where
    P: Particle<F>,
    I: Integrator<F, P>,
{
    fn new(points: Vec<P>, integrator: I, settings: SimulationSettings<F>) -> Result<Self> {
        validate_particles(&points)?;
        Ok(Self {
            points,
            integrator,
            settings,
            elapsed: F::zero(),
        })
    }

    fn init(&mut self) -> Result<()> {
        self.integrator.init();
        self.elapsed = F::zero();
        self.update_forces()
    }

    fn settings(&self) -> &SimulationSettings<F> {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SimulationSettings<F> {
        &mut self.settings
    }

    fn elapsed(&self) -> F {
        self.elapsed
    }

    fn update_forces(&mut self) -> Result<()> {
        let kernel = self.settings.kernel();
        let epsilon = self.settings.coincidence_epsilon;
        for point in self.points.iter_mut() {
            point.force_mut().fill(F::zero());
        }

        for i in 0..self.points.len() {
            for j in 0..i {
                let r = self.points[j].position() - self.points[i].position();
                let d2 = r.norm_squared();
                if d2 < epsilon {
                    continue;
                }
                let force = kernel.force(&r, d2, self.points[i].get_mass(), self.points[j].get_mass());
                *self.points[i].force_mut() += force;
                *self.points[j].force_mut() -= force;
            }
        }
        Ok(())
    }

    fn step_by(&mut self, dt: F) -> Result<()> {
        self.integrator.integrate_pre_force(&mut self.points, dt);
        self.update_forces()?;
        self.integrator.integrate_after_force(&mut self.points, dt);
        self.elapsed += dt;
        Ok(())
    }

    fn get_points(&self) -> &[P] {
        &self.points
    }
}
