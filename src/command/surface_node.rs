//! Surface node commands.

use super::Command;
use crate::common::{extract_pid, NodeId};
use crate::pipeline::{PipelineMessage, RenderContext, RenderNode, RenderNodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SurfaceNodeCommandKind {
    Create = 0,
    SetCallbackForBufferAvailable = 1,
    UpdateParentWithoutTransition = 2,
}

/// `(node, name)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = SurfaceNode, subtype = SurfaceNodeCommandKind::Create, apply = create)]
pub struct SurfaceNodeCreate(pub NodeId, pub String);

/// `(node, enabled)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = SurfaceNode,
    subtype = SurfaceNodeCommandKind::SetCallbackForBufferAvailable,
    apply = set_callback_for_buffer_available
)]
pub struct SurfaceNodeSetCallbackForBufferAvailable(pub NodeId, pub bool);

/// `(node, new parent)`; re-parents the surface, appending it last.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = SurfaceNode,
    subtype = SurfaceNodeCommandKind::UpdateParentWithoutTransition,
    apply = update_parent_without_transition
)]
pub struct SurfaceNodeUpdateParentWithoutTransition(pub NodeId, pub NodeId);

fn create(context: &mut RenderContext, id: NodeId, name: String) {
    context.register_node(RenderNode::new(id, RenderNodeKind::surface(name)));
}

fn set_callback_for_buffer_available(context: &mut RenderContext, id: NodeId, enabled: bool) {
    let notify_now = context
        .with_node_mut(id, |node| {
            let surface = node.surface_mut()?;
            surface.notify_buffer_available = enabled;
            let notify = enabled && surface.buffer.is_some() && !surface.buffer_available_notified;
            if notify {
                surface.buffer_available_notified = true;
            }
            Some(notify)
        })
        .flatten()
        .unwrap_or(false);
    if notify_now {
        context.post_message(extract_pid(id), PipelineMessage::BufferAvailable { node: id });
    }
}

fn update_parent_without_transition(context: &mut RenderContext, id: NodeId, parent: NodeId) {
    if !context.contains(parent) {
        log::debug!("surface {id} re-parent to missing node {parent} ignored");
        return;
    }
    context.add_child(parent, id, -1);
}
