//! Per-process lookup of live proxy nodes by id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::common::NodeId;

use super::node::ProxyNode;

/// Maps ids to the proxy nodes of one process.
///
/// Holds weak references only: a node's lifetime belongs to its owners, and
/// a node is unregistered when its last owner drops it.
#[derive(Default)]
pub struct NodeMap {
    nodes: Mutex<HashMap<NodeId, Weak<ProxyNode>>>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node` under its hierarchy id. An id already held by a live
    /// node is refused.
    pub fn register(&self, node: &Arc<ProxyNode>) -> bool {
        let id = node.hierarchy_id();
        let mut nodes = self.lock();
        if nodes.get(&id).is_some_and(|existing| existing.strong_count() > 0) {
            log::warn!("proxy node {id} already registered");
            return false;
        }
        nodes.insert(id, Arc::downgrade(node));
        true
    }

    pub fn unregister(&self, id: NodeId) {
        self.lock().remove(&id);
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<ProxyNode>> {
        self.lock().get(&id).and_then(Weak::upgrade)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of registered ids, including nodes being dropped.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NodeId, Weak<ProxyNode>>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
