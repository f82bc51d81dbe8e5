//! Authoritative render nodes.
//!
//! Parent and child links are node ids resolved through the
//! [`RenderContext`](super::RenderContext) arena; a node never holds a
//! reference to another node.

use bitflags::bitflags;

use crate::common::{NodeId, NodeType, RectI};

use super::animation::AnimationManager;
use super::draw_cmd::{DrawCmdList, DrawSlot};
use super::properties::RenderProperties;

bitflags! {
    /// What changed on a node since it was last drawn.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        /// Render properties changed
        const PROPERTIES = 1 << 0;
        /// Children were added, removed or reordered
        const CHILDREN = 1 << 1;
        /// Draw commands or surface content changed
        const CONTENT = 1 << 2;
    }
}

/// Content buffer queued by a surface's producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceBuffer {
    pub width: u32,
    pub height: u32,
    /// Producer-side sequence number of the buffer.
    pub sequence: u64,
    /// Frame timestamp the producer rendered the buffer for.
    pub timestamp: u64,
    /// Acquire fence; `-1` when the buffer is already readable.
    pub acquire_fence: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceState {
    pub name: String,
    pub buffer: Option<SurfaceBuffer>,
    /// The client asked to be told when the first buffer arrives.
    pub notify_buffer_available: bool,
    pub buffer_available_notified: bool,
}

/// Per-kind payload of a render node.
#[derive(Debug, Clone)]
pub enum RenderNodeKind {
    Base,
    Rs,
    Display {
        screen_id: u64,
        offset_x: i32,
        offset_y: i32,
    },
    Surface(SurfaceState),
    Proxy {
        target: NodeId,
    },
    Canvas {
        recordings: [Option<DrawCmdList>; DrawSlot::COUNT],
    },
    Root {
        recordings: [Option<DrawCmdList>; DrawSlot::COUNT],
        attached_surface: NodeId,
        enable_render: bool,
    },
}

impl RenderNodeKind {
    pub fn canvas() -> Self {
        RenderNodeKind::Canvas {
            recordings: Default::default(),
        }
    }

    pub fn root() -> Self {
        RenderNodeKind::Root {
            recordings: Default::default(),
            attached_surface: 0,
            enable_render: true,
        }
    }

    pub fn display(screen_id: u64) -> Self {
        RenderNodeKind::Display {
            screen_id,
            offset_x: 0,
            offset_y: 0,
        }
    }

    pub fn surface(name: String) -> Self {
        RenderNodeKind::Surface(SurfaceState {
            name,
            ..Default::default()
        })
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            RenderNodeKind::Base => NodeType::Base,
            RenderNodeKind::Rs => NodeType::Rs,
            RenderNodeKind::Display { .. } => NodeType::Display,
            RenderNodeKind::Surface(_) => NodeType::Surface,
            RenderNodeKind::Proxy { .. } => NodeType::Proxy,
            RenderNodeKind::Canvas { .. } => NodeType::Canvas,
            RenderNodeKind::Root { .. } => NodeType::Root,
        }
    }
}

/// A node of the authoritative tree.
#[derive(Debug)]
pub struct RenderNode {
    id: NodeId,
    kind: RenderNodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: RenderProperties,
    animations: AnimationManager,
    dirty: DirtyFlags,
    is_on_tree: bool,
    /// Absolute rectangle covered by the node in the last drawn frame.
    pub(crate) last_frame_rect: RectI,
}

impl RenderNode {
    pub fn new(id: NodeId, kind: RenderNodeKind) -> Self {
        Self {
            id,
            kind,
            parent: None,
            children: Vec::new(),
            properties: RenderProperties::default(),
            animations: AnimationManager::default(),
            dirty: DirtyFlags::all(),
            is_on_tree: false,
            last_frame_rect: RectI::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn is_instance_of(&self, kind: NodeType) -> bool {
        self.node_type().is_instance_of(kind)
    }

    pub fn kind(&self) -> &RenderNodeKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut RenderNodeKind {
        &mut self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }

    pub fn properties(&self) -> &RenderProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut RenderProperties {
        &mut self.properties
    }

    pub fn animations(&self) -> &AnimationManager {
        &self.animations
    }

    /// Split borrow of the animations and the properties they drive.
    pub(crate) fn animations_and_properties_mut(
        &mut self,
    ) -> (&mut AnimationManager, &mut RenderProperties) {
        (&mut self.animations, &mut self.properties)
    }

    pub fn is_on_tree(&self) -> bool {
        self.is_on_tree
    }

    pub(crate) fn set_on_tree_flag(&mut self, on_tree: bool) {
        self.is_on_tree = on_tree;
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::empty();
    }

    /// Draw lists to hand to the backend, in slot order.
    pub fn recordings(&self) -> Vec<&DrawCmdList> {
        match &self.kind {
            RenderNodeKind::Canvas { recordings } | RenderNodeKind::Root { recordings, .. } => {
                recordings.iter().flatten().collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn surface(&self) -> Option<&SurfaceState> {
        match &self.kind {
            RenderNodeKind::Surface(state) => Some(state),
            _ => None,
        }
    }

    pub fn surface_mut(&mut self) -> Option<&mut SurfaceState> {
        match &mut self.kind {
            RenderNodeKind::Surface(state) => Some(state),
            _ => None,
        }
    }
}
