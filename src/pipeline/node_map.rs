//! Arena storage for render nodes.
//!
//! ## Key Features
//!
//! - **Dense Storage**: nodes live contiguously for cache-friendly iteration
//!   during the animate and prepare passes.
//!
//! - **Sparse Index**: O(1) lookup from a stable [`NodeId`] to its dense slot.
//!
//! - **Swap-Remove**: O(1) removal without leaving holes; the node moved into
//!   the freed slot has its index entry fixed up.
//!
//! Ids are never reused by producers, so a stale id simply misses the index
//! instead of aliasing a newer node.

use std::collections::HashMap;

use crate::common::NodeId;

use super::render_node::RenderNode;

#[derive(Debug, Default)]
pub struct RenderNodeMap {
    dense: Vec<RenderNode>,
    sparse: HashMap<NodeId, usize>,
}

impl RenderNodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.sparse.contains_key(&id)
    }

    /// Insert a node. An id that is already registered keeps its existing node.
    pub fn insert(&mut self, node: RenderNode) -> bool {
        let id = node.id();
        if self.sparse.contains_key(&id) {
            return false;
        }
        self.sparse.insert(id, self.dense.len());
        self.dense.push(node);
        true
    }

    pub fn remove(&mut self, id: NodeId) -> Option<RenderNode> {
        let dense_index = self.sparse.remove(&id)?;
        let removed = self.dense.swap_remove(dense_index);
        if let Some(moved) = self.dense.get(dense_index) {
            self.sparse.insert(moved.id(), dense_index);
        }
        Some(removed)
    }

    pub fn get(&self, id: NodeId) -> Option<&RenderNode> {
        self.sparse.get(&id).map(|&index| &self.dense[index])
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        let index = *self.sparse.get(&id)?;
        self.dense.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderNode> {
        self.dense.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RenderNode> {
        self.dense.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dense.iter().map(RenderNode::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render_node::RenderNodeKind;

    fn node(id: NodeId) -> RenderNode {
        RenderNode::new(id, RenderNodeKind::Rs)
    }

    #[test]
    fn test_node_map_insert_and_get() {
        let mut map = RenderNodeMap::new();
        assert!(map.insert(node(10)));
        assert!(map.insert(node(11)));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(10).map(RenderNode::id), Some(10));
        assert!(map.get(12).is_none());
    }

    #[test]
    fn test_node_map_duplicate_insert_keeps_first() {
        let mut map = RenderNodeMap::new();
        assert!(map.insert(RenderNode::new(1, RenderNodeKind::canvas())));
        assert!(!map.insert(RenderNode::new(1, RenderNodeKind::surface("s".into()))));
        assert_eq!(
            map.get(1).map(RenderNode::node_type),
            Some(crate::common::NodeType::Canvas)
        );
    }

    #[test]
    fn test_node_map_swap_remove_fixes_index() {
        let mut map = RenderNodeMap::new();
        for id in 1..=4 {
            map.insert(node(id));
        }
        assert_eq!(map.remove(2).map(|n| n.id()), Some(2));
        // node 4 moved into the freed slot and must still resolve
        assert_eq!(map.get(4).map(RenderNode::id), Some(4));
        assert_eq!(map.get(3).map(RenderNode::id), Some(3));
        assert!(map.remove(2).is_none());
        assert_eq!(map.len(), 3);

        assert!(map.remove(4).is_some());
        assert!(map.remove(1).is_some());
        assert!(map.remove(3).is_some());
        assert!(map.is_empty());
    }
}
