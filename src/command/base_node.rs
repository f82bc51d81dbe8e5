//! Topology commands shared by every node kind.

use super::Command;
use crate::common::NodeId;
use crate::pipeline::RenderContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BaseNodeCommandKind {
    Destroy = 0,
    AddChild = 1,
    MoveChild = 2,
    RemoveChild = 3,
    AddCrossParentChild = 4,
    RemoveCrossParentChild = 5,
    RemoveFromTree = 6,
    ClearChild = 7,
}

/// `(node)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = BaseNode, subtype = BaseNodeCommandKind::Destroy, apply = destroy)]
pub struct BaseNodeDestroy(pub NodeId);

/// `(parent, child, index)`; a negative or out-of-range index appends.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = BaseNode, subtype = BaseNodeCommandKind::AddChild, apply = add_child)]
pub struct BaseNodeAddChild(pub NodeId, pub NodeId, pub i32);

/// `(parent, child, index)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = BaseNode, subtype = BaseNodeCommandKind::MoveChild, apply = move_child)]
pub struct BaseNodeMoveChild(pub NodeId, pub NodeId, pub i32);

/// `(parent, child)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = BaseNode, subtype = BaseNodeCommandKind::RemoveChild, apply = remove_child)]
pub struct BaseNodeRemoveChild(pub NodeId, pub NodeId);

/// `(parent, child, index)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = BaseNode,
    subtype = BaseNodeCommandKind::AddCrossParentChild,
    apply = add_cross_parent_child
)]
pub struct BaseNodeAddCrossParentChild(pub NodeId, pub NodeId, pub i32);

/// `(parent, child, new_parent)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(
    kind = BaseNode,
    subtype = BaseNodeCommandKind::RemoveCrossParentChild,
    apply = remove_cross_parent_child
)]
pub struct BaseNodeRemoveCrossParentChild(pub NodeId, pub NodeId, pub NodeId);

/// `(node)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = BaseNode, subtype = BaseNodeCommandKind::RemoveFromTree, apply = remove_from_tree)]
pub struct BaseNodeRemoveFromTree(pub NodeId);

/// `(node)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = BaseNode, subtype = BaseNodeCommandKind::ClearChild, apply = clear_children)]
pub struct BaseNodeClearChild(pub NodeId);

fn destroy(context: &mut RenderContext, id: NodeId) {
    context.destroy_node(id);
}

fn add_child(context: &mut RenderContext, parent: NodeId, child: NodeId, index: i32) {
    context.add_child(parent, child, index);
}

fn move_child(context: &mut RenderContext, parent: NodeId, child: NodeId, index: i32) {
    context.move_child(parent, child, index);
}

fn remove_child(context: &mut RenderContext, parent: NodeId, child: NodeId) {
    context.remove_child(parent, child);
}

fn add_cross_parent_child(context: &mut RenderContext, parent: NodeId, child: NodeId, index: i32) {
    context.add_cross_parent_child(parent, child, index);
}

fn remove_cross_parent_child(
    context: &mut RenderContext,
    parent: NodeId,
    child: NodeId,
    new_parent: NodeId,
) {
    context.remove_cross_parent_child(parent, child, new_parent);
}

fn remove_from_tree(context: &mut RenderContext, id: NodeId) {
    context.remove_from_tree(id);
}

fn clear_children(context: &mut RenderContext, id: NodeId) {
    context.clear_children(id);
}
