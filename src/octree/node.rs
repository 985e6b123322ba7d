use smallvec::SmallVec;

use super::arena::{NodeArena, NodeId};
use super::bounds::BoundingBox;
use crate::error::Result;
use crate::kernel::GravityKernel;
use crate::shared::{Float, Particle, Vector, VectorExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Empty,
    /// One particle, or several once subdivision has stopped (a bucket).
    Leaf,
    Internal,
}

/// A cube of the octree with the aggregate mass of everything below it.
///
/// Nodes only exist inside a [`NodeArena`]. `particles` holds indices into
/// the particle slice the tree was built from.
#[derive(Clone, Debug)]
pub struct Node<F: Float> {
    pub(super) bounds: BoundingBox<F>,
    pub(super) mass: F,
    pub(super) center_of_mass: Vector<F>,
    pub(super) particles: SmallVec<[usize; 1]>,
    pub(super) children: [Option<NodeId>; 8],
}

impl<F: Float> Node<F> {
    pub(super) fn vacant(bounds: BoundingBox<F>) -> Self {
        Self {
            bounds,
            mass: F::zero(),
            center_of_mass: Vector::zeros(),
            particles: SmallVec::new(),
            children: [None; 8],
        }
    }

    pub(super) fn reset(&mut self, bounds: BoundingBox<F>) {
        self.bounds = bounds;
        self.mass = F::zero();
        self.center_of_mass = Vector::zeros();
        self.particles.clear();
        self.children = [None; 8];
    }

    pub fn bounds(&self) -> &BoundingBox<F> {
        &self.bounds
    }

    pub fn mass(&self) -> F {
        self.mass
    }

    pub fn center_of_mass(&self) -> &Vector<F> {
        &self.center_of_mass
    }

    pub fn particles(&self) -> &[usize] {
        &self.particles
    }

    pub fn children(&self) -> &[Option<NodeId>; 8] {
        &self.children
    }

    pub fn state(&self) -> NodeState {
        if self.children.iter().any(Option::is_some) {
            NodeState::Internal
        } else if self.particles.is_empty() {
            NodeState::Empty
        } else {
            NodeState::Leaf
        }
    }

    pub fn is_bucket(&self) -> bool {
        self.particles.len() > 1
    }

    /// Folds a body into the running mass-weighted mean.
    ///
    /// The mean is updated as `com += (p - com) * m / M`. Each fold rounds
    /// once or twice, so after `N` bodies the mass is within `N * eps`
    /// relative of the exact sum and every coordinate of the center of mass
    /// is within `N * eps * max|p|` of the exact weighted mean, whatever the
    /// insertion order. `eps` is the machine epsilon of `F`.
    pub(super) fn fold(&mut self, position: &Vector<F>, mass: F) -> Result<()> {
        if self.mass == F::zero() {
            self.mass = mass;
            self.center_of_mass = *position;
            return Ok(());
        }
        let total = self.mass + mass;
        let shift = (position - self.center_of_mass).try_div(total)?;
        self.center_of_mass += shift * mass;
        self.mass = total;
        Ok(())
    }
}

/// When a leaf stops splitting and starts collecting particles instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubdivisionLimits<F: Float> {
    pub max_depth: usize,
    pub min_side_length: F,
}

impl<F: Float> SubdivisionLimits<F> {
    pub fn stops_at(&self, depth: usize, side_length: F) -> bool {
        depth >= self.max_depth || side_length <= self.min_side_length
    }
}

/// Inserts particles of one build into the arena.
pub(super) struct Insertion<'a, F: Float, P: Particle<F>> {
    pub arena: &'a mut NodeArena<F>,
    pub particles: &'a [P],
    pub limits: SubdivisionLimits<F>,
}

impl<F: Float, P: Particle<F>> Insertion<'_, F, P> {
    pub fn add_particle(&mut self, id: NodeId, index: usize, depth: usize) -> Result<()> {
        let particle = &self.particles[index];
        let node = self.arena.get_mut(id);
        // folded on the way down, so every ancestor covers its whole subtree
        node.fold(particle.position(), particle.get_mass())?;

        match node.state() {
            NodeState::Empty => {
                node.particles.push(index);
                Ok(())
            }
            NodeState::Leaf => {
                if self.limits.stops_at(depth, node.bounds.side_length()) {
                    node.particles.push(index);
                    return Ok(());
                }
                let residents = std::mem::take(&mut node.particles);
                for resident in residents {
                    self.route(id, resident, depth)?;
                }
                self.route(id, index, depth)
            }
            NodeState::Internal => self.route(id, index, depth),
        }
    }

    /// Sends a particle to the child of `id` covering its octant, acquiring the
    /// child on first use. The particle is already folded into `id`.
    fn route(&mut self, id: NodeId, index: usize, depth: usize) -> Result<()> {
        let position = self.particles[index].position();
        let node = self.arena.get(id);
        let octant = node.bounds.octant_index(position);
        let existing = node.children[octant];
        let child = match existing {
            Some(child) => child,
            None => {
                let bounds = node.bounds.octant(octant);
                let child = self.arena.acquire(bounds)?;
                self.arena.get_mut(id).children[octant] = Some(child);
                child
            }
        };
        self.add_particle(child, index, depth + 1)
    }
}

/// Parameters of one Barnes-Hut evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opening<F: Float> {
    pub theta: F,
    /// Squared separations below this are skipped.
    pub coincidence_epsilon: F,
    pub kernel: GravityKernel<F>,
}

/// Read-only walk of a built tree on behalf of one body.
pub(super) struct Traversal<'a, F: Float, P: Particle<F>> {
    pub arena: &'a NodeArena<F>,
    pub particles: &'a [P],
    /// Particle index of the body, excluded from its own sum.
    pub target: Option<usize>,
    pub position: Vector<F>,
    pub theta: F,
    pub coincidence_epsilon: F,
}

impl<F: Float, P: Particle<F>> Traversal<'_, F, P> {
    /// Sums `interact(r, d2, source_mass)` over the tree, where `r` points from
    /// the body to the source.
    ///
    /// A node is approximated by its center of mass only when `s / d < theta`
    /// and the body lies outside its box at a distance above the coincidence
    /// threshold. Otherwise it is opened. A theta of zero or below never
    /// approximates, which makes the sum exact. Leaves are summed exactly,
    /// particle by particle.
    pub fn accumulate<T, K>(&self, id: NodeId, zero: T, interact: &K) -> T
    where
        T: Copy + std::ops::Add<Output = T>,
        K: Fn(&Vector<F>, F, F) -> T,
    {
        let node = self.arena.get(id);
        match node.state() {
            NodeState::Empty => zero,
            NodeState::Leaf => node
                .particles
                .iter()
                .filter(|&&index| Some(index) != self.target)
                .fold(zero, |acc, &index| {
                    let source = &self.particles[index];
                    let r = source.position() - self.position;
                    let d2 = r.norm_squared();
                    if d2 < self.coincidence_epsilon {
                        acc
                    } else {
                        acc + interact(&r, d2, source.get_mass())
                    }
                }),
            NodeState::Internal => {
                let r = node.center_of_mass - self.position;
                let d2 = r.norm_squared();
                let s = node.bounds.side_length();
                // s / d < theta, squared, which needs theta > 0
                let far_enough = self.theta > F::zero()
                    && d2 >= self.coincidence_epsilon
                    && s * s < self.theta * self.theta * d2
                    && !node.bounds.contains(&self.position);
                if far_enough {
                    interact(&r, d2, node.mass)
                } else {
                    node.children
                        .iter()
                        .flatten()
                        .fold(zero, |acc, &child| acc + self.accumulate(child, zero, interact))
                }
            }
        }
    }
}
