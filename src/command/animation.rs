//! Animation commands.

use super::Command;
use crate::common::{AnimationId, NodeId};
use crate::pipeline::{RenderAnimation, RenderContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AnimationCommandKind {
    Create = 0,
    Pause = 1,
    Resume = 2,
    Finish = 3,
    Cancel = 4,
}

/// `(node, animation)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = Animation, subtype = AnimationCommandKind::Create, apply = create)]
pub struct AnimationCreate(pub NodeId, pub RenderAnimation);

/// `(node, animation id)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = Animation, subtype = AnimationCommandKind::Pause, apply = pause)]
pub struct AnimationPause(pub NodeId, pub AnimationId);

/// `(node, animation id)`
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = Animation, subtype = AnimationCommandKind::Resume, apply = resume)]
pub struct AnimationResume(pub NodeId, pub AnimationId);

/// `(node, animation id)`; jumps to the end value.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = Animation, subtype = AnimationCommandKind::Finish, apply = finish)]
pub struct AnimationFinish(pub NodeId, pub AnimationId);

/// `(node, animation id)`; stops at the current value.
#[derive(Debug, Clone, PartialEq, Command)]
#[command(kind = Animation, subtype = AnimationCommandKind::Cancel, apply = cancel)]
pub struct AnimationCancel(pub NodeId, pub AnimationId);

fn create(context: &mut RenderContext, id: NodeId, animation: RenderAnimation) {
    context.add_animation(id, animation);
}

fn pause(context: &mut RenderContext, id: NodeId, animation: AnimationId) {
    context.pause_animation(id, animation);
}

fn resume(context: &mut RenderContext, id: NodeId, animation: AnimationId) {
    context.resume_animation(id, animation);
}

fn finish(context: &mut RenderContext, id: NodeId, animation: AnimationId) {
    context.finish_animation(id, animation, true);
}

fn cancel(context: &mut RenderContext, id: NodeId, animation: AnimationId) {
    context.finish_animation(id, animation, false);
}
