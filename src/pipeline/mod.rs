//! The authoritative side: render nodes, the vsync-driven loop that applies
//! transactions to them, and the collaborators a frame is drawn through.

pub mod animation;
pub mod backend;
pub mod composer;
pub mod context;
pub mod draw_cmd;
pub mod main_loop;
pub mod message;
pub mod node_map;
pub mod properties;
pub mod render_node;
pub mod visitor;
pub mod vsync;

pub use animation::{AnimationManager, AnimationState, RenderAnimation, REPEAT_INFINITE};
pub use backend::{DrawItem, DrawingBackend, NullBackend};
pub use composer::{
    ComposerAdapter, CompositionType, DisplayError, Fence, HdiDevice, LayerInfo, ScreenCapability,
    ScreenLayers, ScreenMode,
};
pub use context::RenderContext;
pub use draw_cmd::{DrawCmdList, DrawOp, DrawSlot};
pub use main_loop::{Pipeline, PipelineHandle, PipelineThread};
pub use message::{ApplicationAgent, MessageProcessor, PipelineMessage};
pub use node_map::RenderNodeMap;
pub use properties::{PropertyKind, PropertyUpdate, RenderProperties};
pub use render_node::{DirtyFlags, RenderNode, RenderNodeKind, SurfaceBuffer, SurfaceState};
pub use visitor::{PreparedNode, RenderVisitor};
pub use vsync::{monotonic_now_ns, SoftwareVsync, VsyncCallback, VsyncError, VsyncReceiver, VsyncSource};
