use log::trace;

use super::bounds::BoundingBox;
use super::node::Node;
use crate::error::{Error, Result};
use crate::shared::{Float, Vector};

/// Capacity the arena grows to when it has never held a node.
const BASELINE_CAPACITY: usize = 100;

/// Handle to a node owned by a [`NodeArena`].
///
/// Handles are plain indices tagged with the generation of the slot they were
/// issued from. Growing the arena never invalidates them; resetting the pool
/// or releasing the node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Debug)]
struct Slot<F: Float> {
    node: Node<F>,
    generation: u32,
    occupied: bool,
}

/// Pool of octree nodes reused across rebuilds.
///
/// The arena is the only producer of [`NodeId`]s and the only place nodes
/// are constructed. Nodes are never deallocated; `reset_pool` hands all of
/// them out again.
#[derive(Clone, Debug)]
pub struct NodeArena<F: Float> {
    slots: Vec<Slot<F>>,
    free_indices: Vec<u32>,
    resets: u32,
    max_nodes: Option<usize>,
}

impl<F: Float> Default for NodeArena<F> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<F: Float> NodeArena<F> {
    /// Pre-fills `capacity` vacant nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut arena = Self {
            slots: Vec::with_capacity(capacity),
            free_indices: Vec::with_capacity(capacity),
            resets: 0,
            max_nodes: None,
        };
        arena.fill_to(capacity);
        arena
    }

    /// Like [`NodeArena::with_capacity`], refusing to grow beyond `max_nodes`.
    pub fn with_limit(capacity: usize, max_nodes: usize) -> Self {
        let mut arena = Self::with_capacity(capacity.min(max_nodes));
        arena.max_nodes = Some(max_nodes);
        arena
    }

    pub fn max_nodes(&self) -> Option<usize> {
        self.max_nodes
    }

    /// Total nodes ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_indices.len()
    }

    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free_indices.len()
    }

    /// Number of times the pool has been reset.
    pub fn generation(&self) -> u32 {
        self.resets
    }

    /// Hands out a node reset to the empty state for `bounds`, growing the
    /// pool first if every node is in use.
    pub fn acquire(&mut self, bounds: BoundingBox<F>) -> Result<NodeId> {
        if self.free_indices.is_empty() {
            self.grow()?;
        }
        let index = self
            .free_indices
            .pop()
            .ok_or(Error::ResourceExhaustion {
                requested: self.slots.len() + 1,
                limit: self.slots.len(),
            })?;

        let slot = &mut self.slots[index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.occupied = true;
        slot.node.reset(bounds);
        Ok(NodeId {
            index,
            generation: slot.generation,
        })
    }

    /// Returns a single node to the free list. Stale handles are ignored.
    pub fn release(&mut self, id: NodeId) {
        if self.is_live(id) {
            self.slots[id.index()].occupied = false;
            self.free_indices.push(id.index);
        }
    }

    /// Marks every node as free again without deallocating anything.
    pub fn reset_pool(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.occupied = false;
        }
        self.free_indices.clear();
        // reversed so the lowest indices are handed out first
        self.free_indices.extend((0..self.slots.len() as u32).rev());
        self.resets = self.resets.wrapping_add(1);
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.occupied && slot.generation == id.generation)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node<F> {
        debug_assert!(self.is_live(id), "stale node handle {id:?}");
        &self.slots[id.index()].node
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<F> {
        debug_assert!(self.is_live(id), "stale node handle {id:?}");
        &mut self.slots[id.index()].node
    }

    pub fn try_get(&self, id: NodeId) -> Option<&Node<F>> {
        self.is_live(id).then(|| &self.slots[id.index()].node)
    }

    /// Doubles the pool, or seeds it with a baseline when empty.
    fn grow(&mut self) -> Result<()> {
        let current = self.slots.len();
        let limit = self.max_nodes.unwrap_or(u32::MAX as usize).min(u32::MAX as usize);
        let target = if current == 0 {
            BASELINE_CAPACITY
        } else {
            current.saturating_mul(2)
        }
        .min(limit);

        if target <= current {
            return Err(Error::ResourceExhaustion {
                requested: current + 1,
                limit,
            });
        }

        let additional = target - current;
        self.slots
            .try_reserve(additional)
            .and_then(|_| self.free_indices.try_reserve(additional))
            .map_err(|_| Error::ResourceExhaustion {
                requested: target,
                limit: current,
            })?;

        trace!("growing node arena from {current} to {target} nodes");
        self.fill_to(target);
        Ok(())
    }

    fn fill_to(&mut self, target: usize) {
        let start = self.slots.len();
        let empty = BoundingBox::new(Vector::zeros(), Vector::zeros());
        self.slots.extend((start..target).map(|_| Slot {
            node: Node::vacant(empty),
            generation: 0,
            occupied: false,
        }));
        self.free_indices.extend((start as u32..target as u32).rev());
    }
}
