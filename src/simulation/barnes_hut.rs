use log::{debug, trace};

use super::evaluate_all;
use crate::config::SimulationSettings;
use crate::error::{Error, Result};
use crate::octree::{BoundingBox, BuildStats, NodeArena, Octree, Opening};
use crate::shared::{
    EulerCromerIntegrator, Float, Integrator, Particle, Simulation, kinetic_energy, potential_energy,
    validate_particles,
};

/// Owns the particles and drives the per-step tree lifecycle: bounds, full
/// rebuild, force accumulation, integration.
///
/// The tree is rebuilt from scratch every step; all particles move every step,
/// so there is nothing to update incrementally. Nodes are recycled through the
/// arena, which is sized once at construction and only grows.
#[derive(Clone, Debug)]
pub struct BarnesHutSimulation<F: Float, P, I = EulerCromerIntegrator>
where
    P: Particle<F>,
    I: Integrator<F, P>,
{
    points: Vec<P>,
    octree: Octree<F>,
    bounds: Option<BoundingBox<F>>,
    integrator: I,
    settings: SimulationSettings<F>,
    elapsed: F,
    // the tree matches the current particle positions
    tree_fresh: bool,
}

impl<F: Float, P, I> BarnesHutSimulation<F, P, I>
where
    P: Particle<F> + Send + Sync,
    I: Integrator<F, P>,
{
    /// Recomputes the padded cubic volume enclosing every particle.
    pub fn compute_bounds(&mut self) -> Result<BoundingBox<F>> {
        let bounds = BoundingBox::enclosing_cube(
            self.points.iter().map(|p| p.position()),
            self.settings.bounds_padding,
        )?;
        self.bounds = Some(bounds);
        Ok(bounds)
    }

    /// Rebuilds the octree from the current particle state.
    pub fn build_tree(&mut self) -> Result<BuildStats> {
        self.tree_fresh = false;
        let bounds = self.compute_bounds()?;
        let stats = self
            .octree
            .build(&self.points, bounds, self.settings.subdivision_limits())?;
        self.tree_fresh = true;
        Ok(stats)
    }

    fn opening(&self, theta: F) -> Result<Opening<F>> {
        if !self.tree_fresh {
            return Err(Error::TreeNotBuilt);
        }
        Ok(Opening {
            theta,
            coincidence_epsilon: self.settings.coincidence_epsilon,
            kernel: self.settings.kernel(),
        })
    }

    /// Overwrites every particle's force with its Barnes-Hut estimate.
    /// Needs a tree built since the particles last moved.
    pub fn calculate_forces(&mut self, theta: F) -> Result<()> {
        let opening = self.opening(theta)?;
        let octree = &self.octree;
        let points = &self.points;
        let forces = evaluate_all(points.len(), |i| octree.force_on(points, i, &opening));
        for (point, force) in self.points.iter_mut().zip(forces) {
            *point.force_mut() = force;
        }
        Ok(())
    }

    pub fn calculate_potentials(&mut self, theta: F) -> Result<()> {
        let opening = self.opening(theta)?;
        let octree = &self.octree;
        let points = &self.points;
        let potentials = evaluate_all(points.len(), |i| octree.potential_on(points, i, &opening));
        for (point, potential) in self.points.iter_mut().zip(potentials) {
            *point.potential_mut() = potential;
        }
        Ok(())
    }

    /// One time advance: build, forces, integrate.
    pub fn step(&mut self, dt: F, theta: F) -> Result<()> {
        self.integrator.integrate_pre_force(&mut self.points, dt);
        self.tree_fresh = false;
        self.build_tree()?;
        self.calculate_forces(theta)?;
        self.integrator.integrate_after_force(&mut self.points, dt);
        self.tree_fresh = false;
        self.elapsed += dt;
        trace!("stepped to t = {}", self.elapsed);
        Ok(())
    }

    /// Kinetic plus potential energy, with potentials estimated at the
    /// configured theta. Rebuilds the tree if the particles moved.
    pub fn total_energy(&mut self) -> Result<F> {
        if !self.tree_fresh {
            self.build_tree()?;
        }
        self.calculate_potentials(self.settings.theta)?;
        Ok(kinetic_energy(&self.points) + potential_energy(&self.points))
    }

    pub fn octree(&self) -> &Octree<F> {
        &self.octree
    }

    /// Root volume of the most recent build.
    pub fn bounds(&self) -> Option<&BoundingBox<F>> {
        self.bounds.as_ref()
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }
}

impl<F: Float, P, I> Simulation<F, P, I> for BarnesHutSimulation<F, P, I>
where
    P: Particle<F> + Send + Sync,
    I: Integrator<F, P>,
{
    fn new(points: Vec<P>, integrator: I, settings: SimulationSettings<F>) -> Result<Self> {
        validate_particles(&points)?;

        let capacity = points.len().saturating_mul(settings.node_capacity_factor).max(1);
        let arena = match settings.max_nodes {
            Some(limit) => NodeArena::with_limit(capacity, limit),
            None => NodeArena::with_capacity(capacity),
        };
        debug!(
            "barnes-hut simulation with {} particles, {} pooled nodes",
            points.len(),
            arena.capacity()
        );

        Ok(Self {
            points,
            octree: Octree::new(arena),
            bounds: None,
            integrator,
            settings,
            elapsed: F::zero(),
            tree_fresh: false,
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
        self.build_tree()?;
        self.calculate_forces(self.settings.theta)
    }

    fn step_by(&mut self, dt: F) -> Result<()> {
        self.step(dt, self.settings.theta)
    }

    fn get_points(&self) -> &[P] {
        &self.points
    }
}
