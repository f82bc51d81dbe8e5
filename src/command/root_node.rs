//! Root node commands.

use super::Command;
use crate::common::NodeId;
use crate::pipeline::{DirtyFlags, RenderContext, RenderNode, RenderNodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RootNodeCommandKind {
    Create = 0,
    AttachRsSurfaceNode = 1,
    SetEnableRender = 2,
}

/// `(node)`; the new root is attached under the pipeline root.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = RootNode, subtype = RootNodeCommandKind::Create, apply = create)]
pub struct RootNodeCreate(pub NodeId);

/// `(node, surface)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = RootNode,
    subtype = RootNodeCommandKind::AttachRsSurfaceNode,
    apply = attach_rs_surface_node
)]
pub struct RootNodeAttachRsSurfaceNode(pub NodeId, pub NodeId);

/// `(node, enabled)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = RootNode, subtype = RootNodeCommandKind::SetEnableRender, apply = set_enable_render)]
pub struct RootNodeSetEnableRender(pub NodeId, pub bool);

fn create(context: &mut RenderContext, id: NodeId) {
    if context.register_node(RenderNode::new(id, RenderNodeKind::root())) {
        let root = context.root_id();
        context.add_child(root, id, -1);
    }
}

fn attach_rs_surface_node(context: &mut RenderContext, id: NodeId, surface: NodeId) {
    context.with_node_mut(id, |node| {
        if let RenderNodeKind::Root {
            attached_surface, ..
        } = node.kind_mut()
        {
            *attached_surface = surface;
        }
    });
}

fn set_enable_render(context: &mut RenderContext, id: NodeId, enabled: bool) {
    let changed = context
        .with_node_mut(id, |node| match node.kind_mut() {
            RenderNodeKind::Root { enable_render, .. } if *enable_render != enabled => {
                *enable_render = enabled;
                true
            }
            _ => false,
        })
        .unwrap_or(false);
    if changed {
        context.mark_dirty(id, DirtyFlags::CONTENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_attaches_to_pipeline_root() {
        let mut context = RenderContext::new();
        RootNodeCreate(4).process(&mut context);
        assert_eq!(context.children(0), vec![4]);
        assert!(context.get(4).unwrap().is_on_tree());

        // a second create for the same id does not attach twice
        RootNodeCreate(4).process(&mut context);
        assert_eq!(context.children(0), vec![4]);
    }

    #[test]
    fn test_attach_surface_and_enable_render() {
        let mut context = RenderContext::new();
        RootNodeCreate(4).process(&mut context);
        RootNodeAttachRsSurfaceNode(4, 9).process(&mut context);
        RootNodeSetEnableRender(4, false).process(&mut context);
        assert!(matches!(
            context.get(4).unwrap().kind(),
            RenderNodeKind::Root {
                attached_surface: 9,
                enable_render: false,
                ..
            }
        ));
    }
}
