//! Property commands for drawable nodes.

use super::Command;
use crate::common::NodeId;
use crate::pipeline::{DirtyFlags, PropertyUpdate, RenderContext, RenderProperties};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RsNodeCommandKind {
    SetProperty = 0,
    ResetProperties = 1,
}

/// `(node, update)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = RsNode, subtype = RsNodeCommandKind::SetProperty, apply = set_property)]
pub struct NodeSetProperty(pub NodeId, pub PropertyUpdate);

/// `(node)`; restores every property to its default.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = RsNode, subtype = RsNodeCommandKind::ResetProperties, apply = reset_properties)]
pub struct NodeResetProperties(pub NodeId);

fn set_property(context: &mut RenderContext, id: NodeId, update: PropertyUpdate) {
    let changed = context
        .with_node_mut(id, |node| node.properties_mut().apply(&update))
        .unwrap_or(false);
    if changed {
        context.mark_dirty(id, DirtyFlags::PROPERTIES);
    }
}

fn reset_properties(context: &mut RenderContext, id: NodeId) {
    let changed = context
        .with_node_mut(id, |node| {
            let changed = *node.properties() != RenderProperties::default();
            *node.properties_mut() = RenderProperties::default();
            changed
        })
        .unwrap_or(false);
    if changed {
        context.mark_dirty(id, DirtyFlags::PROPERTIES);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::canvas_node::CanvasNodeCreate;
    use crate::common::Vector4f;

    #[test]
    fn test_set_property_marks_dirty() {
        let mut context = RenderContext::new();
        CanvasNodeCreate(3).process(&mut context);
        context.get_mut(3).unwrap().clear_dirty();

        NodeSetProperty(3, PropertyUpdate::Bounds(Vector4f::new(0.0, 0.0, 8.0, 8.0)))
            .process(&mut context);
        let node = context.get(3).unwrap();
        assert_eq!(node.properties().bounds.z, 8.0);
        assert!(node.dirty().contains(DirtyFlags::PROPERTIES));
    }

    #[test]
    fn test_reset_properties() {
        let mut context = RenderContext::new();
        CanvasNodeCreate(3).process(&mut context);
        NodeSetProperty(3, PropertyUpdate::Alpha(0.25)).process(&mut context);
        NodeResetProperties(3).process(&mut context);
        assert_eq!(context.get(3).unwrap().properties().alpha, 1.0);
    }
}
