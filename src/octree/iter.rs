use super::arena::{NodeArena, NodeId};
use super::node::Node;
use crate::shared::Float;

/// Breadth-first walk yielding `(depth, node)`.
pub struct NodeIterator<'a, F: Float> {
    arena: &'a NodeArena<F>,
    current: Vec<NodeId>,
    next: Vec<NodeId>,
    current_index: usize,
    current_depth: usize,
}

impl<'a, F: Float> NodeIterator<'a, F> {
    pub(super) fn new(arena: &'a NodeArena<F>, root: Option<NodeId>) -> Self {
        Self {
            arena,
            current: root.into_iter().collect(),
            next: Vec::new(),
            current_index: 0,
            current_depth: 0,
        }
    }
}

impl<'a, F: Float> Iterator for NodeIterator<'a, F> {
    type Item = (usize, &'a Node<F>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index < self.current.len() {
            let node = self.arena.get(self.current[self.current_index]);
            self.next.extend(node.children().iter().flatten());
            self.current_index += 1;
            Some((self.current_depth, node))
        } else if self.next.is_empty() {
            None
        } else {
            std::mem::swap(&mut self.current, &mut self.next);
            self.next.clear();
            self.current_index = 0;
            self.current_depth += 1;
            self.next()
        }
    }
}
