//! Barnes-Hut octree over an arena of pooled nodes.

mod arena;
mod bounds;
mod iter;
mod node;

pub use arena::{NodeArena, NodeId};
pub use bounds::BoundingBox;
pub use iter::NodeIterator;
pub use node::{Node, NodeState, Opening, SubdivisionLimits};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::shared::{Float, Particle, Vector};
use node::{Insertion, Traversal};

/// Shape of the most recent build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub particles: usize,
    pub nodes: usize,
    pub max_depth: usize,
    /// Leaves holding more than one particle because subdivision stopped.
    pub bucket_leaves: usize,
}

/// The tree itself. Rebuilt from scratch on every [`Octree::build`], reusing
/// the arena's nodes.
#[derive(Clone, Debug)]
pub struct Octree<F: Float> {
    arena: NodeArena<F>,
    root: Option<NodeId>,
    stats: BuildStats,
}

impl<F: Float> Octree<F> {
    pub fn new(arena: NodeArena<F>) -> Self {
        Self {
            arena,
            root: None,
            stats: BuildStats::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NodeArena::with_capacity(capacity))
    }

    /// Resets the arena and inserts every particle under a root covering
    /// `bounds`. A particle outside `bounds` fails the build with
    /// [`Error::OutsideBounds`].
    ///
    /// On error the tree is left without a root.
    pub fn build<P: Particle<F>>(
        &mut self,
        particles: &[P],
        bounds: BoundingBox<F>,
        limits: SubdivisionLimits<F>,
    ) -> Result<BuildStats> {
        self.arena.reset_pool();
        self.root = None;
        self.stats = BuildStats::default();

        let root = self.arena.acquire(bounds)?;
        let mut insertion = Insertion {
            arena: &mut self.arena,
            particles,
            limits,
        };
        for (index, particle) in particles.iter().enumerate() {
            if !bounds.contains(particle.position()) {
                return Err(Error::OutsideBounds { index });
            }
            insertion.add_particle(root, index, 0)?;
        }
        self.root = Some(root);

        let mut stats = BuildStats {
            particles: particles.len(),
            ..BuildStats::default()
        };
        for (depth, node) in self.iter() {
            stats.nodes += 1;
            stats.max_depth = stats.max_depth.max(depth);
            if node.is_bucket() {
                stats.bucket_leaves += 1;
            }
        }
        self.stats = stats;

        debug!(
            "built octree: {} particles, {} nodes, depth {}, arena capacity {}",
            stats.particles,
            stats.nodes,
            stats.max_depth,
            self.arena.capacity()
        );
        if stats.bucket_leaves > 0 {
            warn!(
                "subdivision limit reached: {} leaves hold more than one particle",
                stats.bucket_leaves
            );
        }
        Ok(stats)
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root(&self) -> Option<&Node<F>> {
        self.root.map(|id| self.arena.get(id))
    }

    /// `None` for handles from an earlier build.
    pub fn node(&self, id: NodeId) -> Option<&Node<F>> {
        self.arena.try_get(id)
    }

    pub fn arena(&self) -> &NodeArena<F> {
        &self.arena
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn iter(&self) -> NodeIterator<'_, F> {
        NodeIterator::new(&self.arena, self.root)
    }

    /// Net force on `particles[target]` from every other particle.
    ///
    /// `particles` must be the slice the tree was built from.
    pub fn force_on<P: Particle<F>>(&self, particles: &[P], target: usize, opening: &Opening<F>) -> Vector<F> {
        let body = &particles[target];
        self.force_at(particles, Some(target), *body.position(), body.get_mass(), opening)
    }

    /// Force on a body of `mass` at `position`. `target`, if any, is left out
    /// of the sum.
    pub fn force_at<P: Particle<F>>(
        &self,
        particles: &[P],
        target: Option<usize>,
        position: Vector<F>,
        mass: F,
        opening: &Opening<F>,
    ) -> Vector<F> {
        let Some(root) = self.root else {
            return Vector::zeros();
        };
        let kernel = opening.kernel;
        self.traversal(particles, target, position, opening)
            .accumulate(root, Vector::zeros(), &|r: &Vector<F>, d2, source_mass| {
                kernel.force(r, d2, mass, source_mass)
            })
    }

    /// Potential energy of `particles[target]` in the field of the others.
    pub fn potential_on<P: Particle<F>>(&self, particles: &[P], target: usize, opening: &Opening<F>) -> F {
        let Some(root) = self.root else {
            return F::zero();
        };
        let body = &particles[target];
        let mass = body.get_mass();
        let kernel = opening.kernel;
        self.traversal(particles, Some(target), *body.position(), opening)
            .accumulate(root, F::zero(), &|_: &Vector<F>, d2, source_mass| {
                kernel.potential(d2, mass, source_mass)
            })
    }

    fn traversal<'a, P: Particle<F>>(
        &'a self,
        particles: &'a [P],
        target: Option<usize>,
        position: Vector<F>,
        opening: &Opening<F>,
    ) -> Traversal<'a, F, P> {
        Traversal {
            arena: &self.arena,
            particles,
            target,
            position,
            theta: opening.theta,
            coincidence_epsilon: opening.coincidence_epsilon,
        }
    }
}
