//! Display node commands. A display node is the root of one screen.

use super::Command;
use crate::common::NodeId;
use crate::pipeline::{DirtyFlags, RenderContext, RenderNode, RenderNodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DisplayNodeCommandKind {
    Create = 0,
    SetScreenId = 1,
    SetDisplayOffset = 2,
}

/// `(node, screen id)`; the display is attached under the pipeline root.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = DisplayNode, subtype = DisplayNodeCommandKind::Create, apply = create)]
pub struct DisplayNodeCreate(pub NodeId, pub u64);

/// `(node, screen id)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = DisplayNode, subtype = DisplayNodeCommandKind::SetScreenId, apply = set_screen_id)]
pub struct DisplayNodeSetScreenId(pub NodeId, pub u64);

/// `(node, x, y)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = DisplayNode,
    subtype = DisplayNodeCommandKind::SetDisplayOffset,
    apply = set_display_offset
)]
pub struct DisplayNodeSetDisplayOffset(pub NodeId, pub i32, pub i32);

fn create(context: &mut RenderContext, id: NodeId, screen_id: u64) {
    if context.register_node(RenderNode::new(id, RenderNodeKind::display(screen_id))) {
        let root = context.root_id();
        context.add_child(root, id, -1);
    }
}

fn set_screen_id(context: &mut RenderContext, id: NodeId, new_screen_id: u64) {
    context.with_node_mut(id, |node| {
        if let RenderNodeKind::Display { screen_id, .. } = node.kind_mut() {
            *screen_id = new_screen_id;
        }
    });
    context.mark_dirty(id, DirtyFlags::PROPERTIES);
}

fn set_display_offset(context: &mut RenderContext, id: NodeId, x: i32, y: i32) {
    context.with_node_mut(id, |node| {
        if let RenderNodeKind::Display {
            offset_x, offset_y, ..
        } = node.kind_mut()
        {
            *offset_x = x;
            *offset_y = y;
        }
    });
    context.mark_dirty(id, DirtyFlags::PROPERTIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lifecycle() {
        let mut context = RenderContext::new();
        DisplayNodeCreate(30, 0).process(&mut context);
        DisplayNodeSetScreenId(30, 2).process(&mut context);
        DisplayNodeSetDisplayOffset(30, -5, 10).process(&mut context);
        assert_eq!(context.children(0), vec![30]);
        assert!(matches!(
            context.get(30).unwrap().kind(),
            RenderNodeKind::Display {
                screen_id: 2,
                offset_x: -5,
                offset_y: 10
            }
        ));
    }
}
