//! Canvas node creation and recorded content.

use super::Command;
use crate::common::NodeId;
use crate::pipeline::{
    DirtyFlags, DrawCmdList, DrawSlot, RenderContext, RenderNode, RenderNodeKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CanvasNodeCommandKind {
    Create = 0,
    UpdateRecording = 1,
    ClearRecording = 2,
}

/// `(node)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = CanvasNode, subtype = CanvasNodeCommandKind::Create, apply = create)]
pub struct CanvasNodeCreate(pub NodeId);

/// `(node, draw list, slot)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = CanvasNode,
    subtype = CanvasNodeCommandKind::UpdateRecording,
    apply = update_recording
)]
pub struct CanvasNodeUpdateRecording(pub NodeId, pub DrawCmdList, pub DrawSlot);

/// `(node)`; drops every recorded slot.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = CanvasNode,
    subtype = CanvasNodeCommandKind::ClearRecording,
    apply = clear_recording
)]
pub struct CanvasNodeClearRecording(pub NodeId);

fn create(context: &mut RenderContext, id: NodeId) {
    context.register_node(RenderNode::new(id, RenderNodeKind::canvas()));
}

/// Shared by canvas and root nodes, which both carry recordings.
pub(crate) fn update_recording(
    context: &mut RenderContext,
    id: NodeId,
    list: DrawCmdList,
    slot: DrawSlot,
) {
    let updated = context
        .with_node_mut(id, |node| match node.kind_mut() {
            RenderNodeKind::Canvas { recordings } | RenderNodeKind::Root { recordings, .. } => {
                recordings[slot.index()] = Some(list);
                true
            }
            other => {
                log::warn!(
                    "recording update for node {id} of kind {:?} ignored",
                    other.node_type()
                );
                false
            }
        })
        .unwrap_or(false);
    if updated {
        context.mark_dirty(id, DirtyFlags::CONTENT);
    }
}

fn clear_recording(context: &mut RenderContext, id: NodeId) {
    let cleared = context
        .with_node_mut(id, |node| match node.kind_mut() {
            RenderNodeKind::Canvas { recordings } | RenderNodeKind::Root { recordings, .. } => {
                *recordings = Default::default();
                true
            }
            _ => false,
        })
        .unwrap_or(false);
    if cleared {
        context.mark_dirty(id, DirtyFlags::CONTENT);
    }
}
