//! Client-side proxy nodes.
//!
//! A [`ProxyNode`] mirrors one authoritative render node. Every mutation
//! updates the local mirror immediately, so reads on the client see it at
//! once, and queues the matching command on the owning [`UiContext`] for the
//! destinations chosen by [`route`](super::routing::route).
//!
//! Parent and child links are hierarchy ids resolved through the context's
//! [`NodeMap`](super::NodeMap).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::animation::{
    AnimationCancel, AnimationCreate, AnimationFinish, AnimationPause, AnimationResume,
};
use crate::command::base_node::{
    BaseNodeAddChild, BaseNodeAddCrossParentChild, BaseNodeClearChild, BaseNodeDestroy,
    BaseNodeMoveChild, BaseNodeRemoveChild, BaseNodeRemoveCrossParentChild, BaseNodeRemoveFromTree,
};
use crate::command::canvas_node::{CanvasNodeClearRecording, CanvasNodeUpdateRecording};
use crate::command::display_node::{DisplayNodeSetDisplayOffset, DisplayNodeSetScreenId};
use crate::command::node::{NodeResetProperties, NodeSetProperty};
use crate::command::root_node::{RootNodeAttachRsSurfaceNode, RootNodeSetEnableRender};
use crate::command::surface_node::SurfaceNodeSetCallbackForBufferAvailable;
use crate::command::Command;
use crate::common::{children, AnimationId, Color, NodeId, NodeType, Vector2f, Vector4f};
use crate::pipeline::{DrawCmdList, DrawSlot, PropertyUpdate, RenderAnimation, RenderProperties};

use super::routing::{CommandRoute, RouteNode};
use super::ui_context::{AnimationFinishCallback, BufferAvailableCallback, UiContext};

#[derive(Default)]
struct NodeState {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: RenderProperties,
}

pub struct ProxyNode {
    /// Id property and content commands address.
    id: NodeId,
    /// Id topology commands address. Differs from `id` only for proxy-kind
    /// nodes, which stand in for a node owned elsewhere.
    hierarchy_id: NodeId,
    kind: NodeType,
    is_render_service_node: bool,
    state: Mutex<NodeState>,
    skip_destroy: AtomicBool,
    context: Arc<UiContext>,
}

impl ProxyNode {
    pub(crate) fn new(
        context: Arc<UiContext>,
        id: NodeId,
        hierarchy_id: NodeId,
        kind: NodeType,
        is_render_service_node: bool,
    ) -> Self {
        Self {
            id,
            hierarchy_id,
            kind,
            is_render_service_node,
            state: Mutex::new(NodeState::default()),
            skip_destroy: AtomicBool::new(false),
            context,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn hierarchy_id(&self) -> NodeId {
        self.hierarchy_id
    }

    pub fn node_type(&self) -> NodeType {
        self.kind
    }

    pub fn is_instance_of(&self, kind: NodeType) -> bool {
        self.kind.is_instance_of(kind)
    }

    pub fn is_render_service_node(&self) -> bool {
        self.is_render_service_node
    }

    pub fn context(&self) -> &Arc<UiContext> {
        &self.context
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.lock().parent
    }

    pub fn children(&self) -> Vec<NodeId> {
        self.lock().children.clone()
    }

    /// Locally staged property values.
    pub fn properties(&self) -> RenderProperties {
        self.lock().properties.clone()
    }

    /// Do not send a destroy command when this node is dropped, e.g. because
    /// the authoritative node is owned by another process.
    pub fn set_skip_destroy(&self, skip: bool) {
        self.skip_destroy.store(skip, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Append or insert `child`. A child parented elsewhere is first removed
    /// from its current parent.
    pub fn add_child(&self, child: &ProxyNode, index: i32) {
        if child.hierarchy_id == self.hierarchy_id {
            log::warn!("node {} cannot be its own child", self.hierarchy_id);
            return;
        }
        match child.parent() {
            Some(parent) if parent == self.hierarchy_id => {
                log::debug!("node {} is already a child of {}", child.hierarchy_id, self.hierarchy_id);
                return;
            }
            Some(_) => child.remove_from_tree(),
            None => {}
        }
        children::insert_at(&mut self.lock().children, child.hierarchy_id, index);
        child.set_parent(Some(self.hierarchy_id));
        self.send_hierarchy(
            Box::new(BaseNodeAddChild(self.id, child.hierarchy_id, index)),
            child.kind,
        );
    }

    /// Move an existing child to `index`, counted before the child is taken out.
    pub fn move_child(&self, child: &ProxyNode, index: i32) {
        if child.parent() != Some(self.hierarchy_id) {
            log::debug!("move of {} ignored, not a child of {}", child.hierarchy_id, self.hierarchy_id);
            return;
        }
        if !children::move_to(&mut self.lock().children, child.hierarchy_id, index) {
            return;
        }
        self.send_hierarchy(
            Box::new(BaseNodeMoveChild(self.id, child.hierarchy_id, index)),
            child.kind,
        );
    }

    pub fn remove_child(&self, child: &ProxyNode) {
        if child.parent() != Some(self.hierarchy_id) {
            log::debug!("remove of {} ignored, not a child of {}", child.hierarchy_id, self.hierarchy_id);
            return;
        }
        self.remove_child_id(child.hierarchy_id);
        child.set_parent(None);
        self.send_hierarchy(
            Box::new(BaseNodeRemoveChild(self.id, child.hierarchy_id)),
            child.kind,
        );
    }

    /// Attach a child that also stays under its current parent, such as a
    /// window spanning several screens. Display nodes only.
    pub fn add_cross_parent_child(&self, child: &ProxyNode, index: i32) {
        if !self.is_instance_of(NodeType::Display) {
            log::error!("add_cross_parent_child on {}: only display nodes accept cross-parent children", self.hierarchy_id);
            return;
        }
        children::insert_at(&mut self.lock().children, child.hierarchy_id, index);
        child.set_parent(Some(self.hierarchy_id));
        self.send_hierarchy(
            Box::new(BaseNodeAddCrossParentChild(self.id, child.hierarchy_id, index)),
            child.kind,
        );
    }

    /// Drop a cross-parent child and hand its parent link to `new_parent`.
    /// Display nodes only.
    pub fn remove_cross_parent_child(&self, child: &ProxyNode, new_parent: NodeId) {
        if !self.is_instance_of(NodeType::Display) {
            log::error!("remove_cross_parent_child on {}: only display nodes hold cross-parent children", self.hierarchy_id);
            return;
        }
        self.remove_child_id(child.hierarchy_id);
        child.set_parent(Some(new_parent).filter(|&p| p != 0));
        self.send_hierarchy(
            Box::new(BaseNodeRemoveCrossParentChild(self.id, child.hierarchy_id, new_parent)),
            child.kind,
        );
    }

    /// Detach from the current parent. The command is sent even when the
    /// local mirror has no parent, since the authoritative tree may.
    pub fn remove_from_tree(&self) {
        if let Some(parent) = self.parent().and_then(|p| self.context.node_map().get(p)) {
            parent.remove_child_id(self.hierarchy_id);
        }
        self.set_parent(None);
        self.context.add_command(
            Box::new(BaseNodeRemoveFromTree(self.hierarchy_id)),
            self.id,
            self.route_node(),
            CommandRoute::Node,
        );
    }

    pub fn clear_children(&self) {
        let removed = std::mem::take(&mut self.lock().children);
        for child in removed {
            if let Some(child) = self.context.node_map().get(child) {
                if child.parent() == Some(self.hierarchy_id) {
                    child.set_parent(None);
                }
            }
        }
        self.context.add_command(
            Box::new(BaseNodeClearChild(self.hierarchy_id)),
            self.id,
            self.route_node(),
            CommandRoute::Node,
        );
    }

    fn remove_child_id(&self, child: NodeId) {
        let mut state = self.lock();
        if let Some(position) = state.children.iter().position(|&c| c == child) {
            state.children.remove(position);
        }
    }

    fn set_parent(&self, parent: Option<NodeId>) {
        self.lock().parent = parent;
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Stage a property locally and send it. Proxy-kind nodes have no
    /// properties of their own; the call is ignored.
    pub fn set_property(&self, update: PropertyUpdate) {
        if self.kind == NodeType::Proxy {
            return;
        }
        self.lock().properties.apply(&update);
        self.send_node(Box::new(NodeSetProperty(self.id, update)));
    }

    pub fn set_bounds(&self, x: f32, y: f32, width: f32, height: f32) {
        self.set_property(PropertyUpdate::Bounds(Vector4f::new(x, y, width, height)));
    }

    pub fn set_frame(&self, x: f32, y: f32, width: f32, height: f32) {
        self.set_property(PropertyUpdate::Frame(Vector4f::new(x, y, width, height)));
    }

    pub fn set_position_z(&self, z: f32) {
        self.set_property(PropertyUpdate::PositionZ(z));
    }

    pub fn set_pivot(&self, x: f32, y: f32) {
        self.set_property(PropertyUpdate::Pivot(Vector2f::new(x, y)));
    }

    pub fn set_rotation(&self, degrees: f32) {
        self.set_property(PropertyUpdate::Rotation(degrees));
    }

    pub fn set_scale(&self, x: f32, y: f32) {
        self.set_property(PropertyUpdate::Scale(Vector2f::new(x, y)));
    }

    pub fn set_translate(&self, x: f32, y: f32) {
        self.set_property(PropertyUpdate::Translate(Vector2f::new(x, y)));
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.set_property(PropertyUpdate::Alpha(alpha));
    }

    pub fn set_visible(&self, visible: bool) {
        self.set_property(PropertyUpdate::Visible(visible));
    }

    pub fn set_background_color(&self, color: Color) {
        self.set_property(PropertyUpdate::BackgroundColor(color));
    }

    pub fn set_clip_to_bounds(&self, clip: bool) {
        self.set_property(PropertyUpdate::ClipToBounds(clip));
    }

    pub fn reset_properties(&self) {
        if self.kind == NodeType::Proxy {
            return;
        }
        self.lock().properties = RenderProperties::default();
        self.send_node(Box::new(NodeResetProperties(self.id)));
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Replace the draw commands of one slot. Canvas and root nodes only.
    pub fn update_recording(&self, slot: DrawSlot, recording: DrawCmdList) {
        if !self.is_instance_of(NodeType::Canvas) {
            log::warn!("update_recording on {} ignored, not a canvas node", self.hierarchy_id);
            return;
        }
        self.send_node(Box::new(CanvasNodeUpdateRecording(self.id, recording, slot)));
    }

    pub fn clear_recording(&self) {
        if !self.is_instance_of(NodeType::Canvas) {
            log::warn!("clear_recording on {} ignored, not a canvas node", self.hierarchy_id);
            return;
        }
        self.send_node(Box::new(CanvasNodeClearRecording(self.id)));
    }

    // ------------------------------------------------------------------
    // Animations
    // ------------------------------------------------------------------

    /// Animate one property linearly from its current value to `target`.
    pub fn animate(&self, target: PropertyUpdate, duration_ns: u64) -> Option<AnimationId> {
        let animation = RenderAnimation::new(self.context.generate_animation_id(), target, duration_ns);
        self.start_animation(animation, None)
    }

    /// Start a fully described animation. `on_finish` runs on the UI thread
    /// once the pipeline reports the animation finished or cancelled.
    pub fn start_animation(
        &self,
        animation: RenderAnimation,
        on_finish: Option<AnimationFinishCallback>,
    ) -> Option<AnimationId> {
        if self.kind == NodeType::Proxy {
            return None;
        }
        let id = animation.id;
        self.lock().properties.apply(&animation.target);
        if let Some(on_finish) = on_finish {
            self.context.set_animation_finish_callback(id, on_finish);
        }
        self.send_node(Box::new(AnimationCreate(self.id, animation)));
        Some(id)
    }

    pub fn pause_animation(&self, animation: AnimationId) {
        self.send_node(Box::new(AnimationPause(self.id, animation)));
    }

    pub fn resume_animation(&self, animation: AnimationId) {
        self.send_node(Box::new(AnimationResume(self.id, animation)));
    }

    /// Jump to the end value.
    pub fn finish_animation(&self, animation: AnimationId) {
        self.send_node(Box::new(AnimationFinish(self.id, animation)));
    }

    /// Stop where the animation currently is.
    pub fn cancel_animation(&self, animation: AnimationId) {
        self.send_node(Box::new(AnimationCancel(self.id, animation)));
    }

    // ------------------------------------------------------------------
    // Kind-specific
    // ------------------------------------------------------------------

    /// Run `callback` on the UI thread when the surface gets its first buffer.
    pub fn set_buffer_available_callback(&self, callback: BufferAvailableCallback) {
        if !self.is_instance_of(NodeType::Surface) {
            log::warn!("buffer callback on {} ignored, not a surface node", self.hierarchy_id);
            return;
        }
        self.context.set_buffer_available_callback(self.id, callback);
        self.send_node(Box::new(SurfaceNodeSetCallbackForBufferAvailable(self.id, true)));
    }

    /// Render this root node's content into `surface`.
    pub fn attach_surface(&self, surface: &ProxyNode) {
        if !self.is_instance_of(NodeType::Root) || !surface.is_instance_of(NodeType::Surface) {
            log::warn!(
                "attach of {} to {} ignored, expected a root and a surface node",
                surface.hierarchy_id,
                self.hierarchy_id
            );
            return;
        }
        self.send_node(Box::new(RootNodeAttachRsSurfaceNode(self.id, surface.id)));
    }

    pub fn set_enable_render(&self, enabled: bool) {
        if !self.is_instance_of(NodeType::Root) {
            log::warn!("set_enable_render on {} ignored, not a root node", self.hierarchy_id);
            return;
        }
        self.send_node(Box::new(RootNodeSetEnableRender(self.id, enabled)));
    }

    pub fn set_screen_id(&self, screen_id: u64) {
        if !self.is_instance_of(NodeType::Display) {
            log::warn!("set_screen_id on {} ignored, not a display node", self.hierarchy_id);
            return;
        }
        self.send_node(Box::new(DisplayNodeSetScreenId(self.id, screen_id)));
    }

    pub fn set_display_offset(&self, x: i32, y: i32) {
        if !self.is_instance_of(NodeType::Display) {
            log::warn!("set_display_offset on {} ignored, not a display node", self.hierarchy_id);
            return;
        }
        self.send_node(Box::new(DisplayNodeSetDisplayOffset(self.id, x, y)));
    }

    // ------------------------------------------------------------------

    fn route_node(&self) -> RouteNode {
        RouteNode {
            kind: self.kind,
            is_render_service_node: self.is_render_service_node,
        }
    }

    fn send_node(&self, command: Box<dyn Command>) {
        self.context
            .add_command(command, self.id, self.route_node(), CommandRoute::Node);
    }

    fn send_hierarchy(&self, command: Box<dyn Command>, child: NodeType) {
        self.context
            .add_command(command, self.id, self.route_node(), CommandRoute::Hierarchy { child });
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProxyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyNode")
            .field("id", &self.id)
            .field("hierarchy_id", &self.hierarchy_id)
            .field("kind", &self.kind)
            .field("is_render_service_node", &self.is_render_service_node)
            .finish_non_exhaustive()
    }
}

impl Drop for ProxyNode {
    fn drop(&mut self) {
        let parent = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .parent;
        if let Some(parent) = parent.and_then(|p| self.context.node_map().get(p)) {
            parent.remove_child_id(self.hierarchy_id);
        }
        self.context.node_map().unregister(self.hierarchy_id);
        if self.skip_destroy.load(Ordering::Relaxed) {
            return;
        }
        self.context.add_command(
            Box::new(BaseNodeDestroy(self.hierarchy_id)),
            self.id,
            self.route_node(),
            CommandRoute::Node,
        );
    }
}
