//! Node and animation identifiers.
//!
//! A [`NodeId`] packs the id of the creating process into its high 32 bits and
//! a per-process counter into its low 32 bits, so ids minted by independent
//! processes never collide and the owning process of any node can be recovered
//! without a lookup. Id `0` is reserved and never issued.

use std::sync::atomic::{AtomicU32, Ordering};

/// Identifier of a render node, unique across processes.
pub type NodeId = u64;

/// Identifier of an animation, minted with the same layout as [`NodeId`].
pub type AnimationId = u64;

/// The reserved "no node" id. Also the id of the pipeline's root node.
pub const INVALID_NODE_ID: NodeId = 0;

/// Build an id from a process id and a per-process counter.
#[inline]
pub fn make_node_id(pid: u32, counter: u32) -> NodeId {
    ((pid as u64) << 32) | counter as u64
}

/// Recover the creating process id from a node or animation id.
#[inline]
pub fn extract_pid(id: NodeId) -> u32 {
    (id >> 32) as u32
}

/// Thread-safe id source for one process.
#[derive(Debug)]
pub struct IdGenerator {
    pid: u32,
    counter: AtomicU32,
}

impl IdGenerator {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            counter: AtomicU32::new(1),
        }
    }

    /// Generator for the current OS process.
    pub fn for_current_process() -> Self {
        Self::new(std::process::id())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Mint the next id. The counter wraps after `u32::MAX` ids; the wrap is
    /// logged and the zero counter value is skipped.
    pub fn next_id(&self) -> NodeId {
        let mut counter = self.counter.fetch_add(1, Ordering::Relaxed);
        if counter == 0 {
            log::error!("id counter for pid {} overflowed", self.pid);
            counter = self.counter.fetch_add(1, Ordering::Relaxed);
        }
        make_node_id(self.pid, counter)
    }
}
