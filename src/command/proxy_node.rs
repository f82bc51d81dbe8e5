//! Proxy node commands.
//!
//! A proxy node stands in for a node owned by another process. It has its
//! own hierarchy id, under which it is attached to the local tree, and
//! references the target by id.

use super::Command;
use crate::common::NodeId;
use crate::pipeline::{RenderContext, RenderNode, RenderNodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ProxyNodeCommandKind {
    Create = 0,
}

/// `(proxy hierarchy id, target)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = ProxyNode, subtype = ProxyNodeCommandKind::Create, apply = create)]
pub struct ProxyNodeCreate(pub NodeId, pub NodeId);

fn create(context: &mut RenderContext, id: NodeId, target: NodeId) {
    context.register_node(RenderNode::new(id, RenderNodeKind::Proxy { target }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_keeps_target() {
        let mut context = RenderContext::new();
        ProxyNodeCreate(20, 7).process(&mut context);
        assert!(matches!(
            context.get(20).map(RenderNode::kind),
            Some(RenderNodeKind::Proxy { target: 7 })
        ));
    }
}
