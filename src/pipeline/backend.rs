//! The drawing collaborator the process pass submits node content to.

use crate::common::{Color, Matrix, NodeId, RectI};

use super::draw_cmd::DrawCmdList;

/// Everything the backend needs to draw one node.
#[derive(Debug, Clone)]
pub struct DrawItem<'a> {
    pub node: NodeId,
    /// Absolute bounding box on screen.
    pub bounds: RectI,
    /// Node space to screen space.
    pub matrix: Matrix,
    /// Part of `bounds` left after ancestor clipping.
    pub visible_region: RectI,
    /// Accumulated opacity.
    pub alpha: f32,
    pub background: Color,
    /// Recorded draw commands in slot order.
    pub cmd_lists: Vec<&'a DrawCmdList>,
}

/// Executes draw commands. Submission is fire-and-forget; completion is only
/// observable through the fences returned by composition.
pub trait DrawingBackend: Send {
    fn begin_frame(&mut self, dirty_region: RectI);
    fn draw_node(&mut self, item: &DrawItem<'_>);
    fn end_frame(&mut self);
}

/// Backend that discards everything, for headless pipelines.
#[derive(Debug, Default)]
pub struct NullBackend {
    frames: u64,
}

impl NullBackend {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl DrawingBackend for NullBackend {
    fn begin_frame(&mut self, dirty_region: RectI) {
        log::trace!("frame {} dirty region {:?}", self.frames, dirty_region);
    }

    fn draw_node(&mut self, _item: &DrawItem<'_>) {}

    fn end_frame(&mut self) {
        self.frames += 1;
    }
}
