//! Per-process client state and the UI-side frame driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::canvas_node::CanvasNodeCreate;
use crate::command::display_node::DisplayNodeCreate;
use crate::command::proxy_node::ProxyNodeCreate;
use crate::command::root_node::RootNodeCreate;
use crate::command::surface_node::SurfaceNodeCreate;
use crate::command::Command;
use crate::common::{AnimationId, IdGenerator, NodeId, NodeType};
use crate::pipeline::{ApplicationAgent, PipelineMessage};
use crate::transaction::{RenderClient, TransactionProxy};

use super::node::ProxyNode;
use super::node_map::NodeMap;
use super::routing::{follow_type, route, CommandRoute, RenderMode, RenderTargets, RouteNode};

/// Runs once an animation has finished or was cancelled.
pub type AnimationFinishCallback = Box<dyn FnOnce() + Send>;

/// Runs once a surface has received its first buffer.
pub type BufferAvailableCallback = Box<dyn FnOnce() + Send>;

/// Everything the client side of one process shares: the id source, the
/// live proxy nodes, the transaction proxy commands are queued on and the
/// callbacks waiting for pipeline messages.
///
/// Passed around explicitly as `Arc<UiContext>`; every [`ProxyNode`] keeps
/// its context alive.
pub struct UiContext {
    id_generator: IdGenerator,
    animation_ids: IdGenerator,
    node_map: NodeMap,
    transaction_proxy: TransactionProxy,
    uni_render_enabled: bool,
    uni_render_active: AtomicBool,
    animation_callbacks: Mutex<HashMap<AnimationId, AnimationFinishCallback>>,
    buffer_callbacks: Mutex<HashMap<NodeId, BufferAvailableCallback>>,
    /// Messages received from a pipeline, waiting for the UI thread.
    inbox: Mutex<Vec<PipelineMessage>>,
}

impl UiContext {
    pub fn new(
        pid: u32,
        uni_render_enabled: bool,
        render_thread_client: Option<Arc<dyn RenderClient>>,
        render_service_client: Option<Arc<dyn RenderClient>>,
    ) -> Arc<Self> {
        log::debug!("creating ui context for pid {pid}, uni render enabled: {uni_render_enabled}");
        Arc::new(Self {
            id_generator: IdGenerator::new(pid),
            animation_ids: IdGenerator::new(pid),
            node_map: NodeMap::new(),
            transaction_proxy: TransactionProxy::new(pid, render_thread_client, render_service_client),
            uni_render_enabled,
            uni_render_active: AtomicBool::new(uni_render_enabled),
            animation_callbacks: Mutex::new(HashMap::new()),
            buffer_callbacks: Mutex::new(HashMap::new()),
            inbox: Mutex::new(Vec::new()),
        })
    }

    pub fn pid(&self) -> u32 {
        self.id_generator.pid()
    }

    pub fn node_map(&self) -> &NodeMap {
        &self.node_map
    }

    pub fn transaction_proxy(&self) -> &TransactionProxy {
        &self.transaction_proxy
    }

    pub fn render_mode(&self) -> RenderMode {
        RenderMode {
            uni_render_enabled: self.uni_render_enabled,
            uni_render_active: self.uni_render_active.load(Ordering::Acquire),
        }
    }

    /// Switch whether uni-render is currently in effect. Ignored when the
    /// deployment does not support it.
    pub fn set_uni_render_active(&self, active: bool) {
        if !self.uni_render_enabled && active {
            log::warn!("uni render is not enabled for pid {}, ignoring switch", self.pid());
            return;
        }
        self.uni_render_active.store(active, Ordering::Release);
    }

    pub fn generate_node_id(&self) -> NodeId {
        self.id_generator.next_id()
    }

    pub fn generate_animation_id(&self) -> AnimationId {
        self.animation_ids.next_id()
    }

    /// Route `command`, issued on the node `id` described by `node`, under
    /// the current mode and queue it.
    pub fn add_command(&self, command: Box<dyn Command>, id: NodeId, node: RouteNode, kind: CommandRoute) {
        let mode = self.render_mode();
        let targets = route(node, kind, mode);
        log::trace!("queue {} for {:?}", command.name(), targets);
        self.transaction_proxy
            .add_following_command(command, targets, id, follow_type(node, mode));
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    pub fn create_canvas_node(self: &Arc<Self>, is_render_service_node: bool) -> Arc<ProxyNode> {
        let id = self.generate_node_id();
        self.create_node(id, id, NodeType::Canvas, is_render_service_node, Box::new(CanvasNodeCreate(id)))
    }

    pub fn create_root_node(self: &Arc<Self>, is_render_service_node: bool) -> Arc<ProxyNode> {
        let id = self.generate_node_id();
        self.create_node(id, id, NodeType::Root, is_render_service_node, Box::new(RootNodeCreate(id)))
    }

    /// Surfaces always live in the render service.
    pub fn create_surface_node(self: &Arc<Self>, name: &str) -> Arc<ProxyNode> {
        let id = self.generate_node_id();
        let create = SurfaceNodeCreate(id, name.to_owned());
        self.create_node(id, id, NodeType::Surface, true, Box::new(create))
    }

    /// A surface whose content is produced in this process, such as video
    /// playback. It exists in both pipelines; in the render service its
    /// commands wait for the buffers of its parent surface.
    pub fn create_self_drawing_surface_node(self: &Arc<Self>, name: &str) -> Arc<ProxyNode> {
        let id = self.generate_node_id();
        let create = SurfaceNodeCreate(id, name.to_owned());
        let node = self.create_node(id, id, NodeType::Surface, false, Box::new(create.clone()));
        if !self.render_mode().uni_render_enabled {
            // Uni-render mirrors it into the service already.
            self.transaction_proxy
                .add_command(Box::new(create), RenderTargets::RENDER_SERVICE);
        }
        node
    }

    pub fn create_display_node(self: &Arc<Self>, screen_id: u64) -> Arc<ProxyNode> {
        let id = self.generate_node_id();
        self.create_node(id, id, NodeType::Display, true, Box::new(DisplayNodeCreate(id, screen_id)))
    }

    /// A local stand-in for `target`, typically a node owned by another
    /// process. Property commands address the target; topology commands
    /// address the proxy's own hierarchy id.
    pub fn create_proxy_node(self: &Arc<Self>, target: NodeId) -> Arc<ProxyNode> {
        let hierarchy_id = self.generate_node_id();
        self.create_node(
            target,
            hierarchy_id,
            NodeType::Proxy,
            false,
            Box::new(ProxyNodeCreate(hierarchy_id, target)),
        )
    }

    fn create_node(
        self: &Arc<Self>,
        id: NodeId,
        hierarchy_id: NodeId,
        kind: NodeType,
        is_render_service_node: bool,
        create: Box<dyn Command>,
    ) -> Arc<ProxyNode> {
        let node = Arc::new(ProxyNode::new(
            Arc::clone(self),
            id,
            hierarchy_id,
            kind,
            is_render_service_node,
        ));
        self.node_map.register(&node);
        let route_node = RouteNode {
            kind,
            is_render_service_node,
        };
        self.add_command(create, id, route_node, CommandRoute::Node);
        log::debug!("created {} {hierarchy_id}", kind.dump_name());
        node
    }

    pub fn get_node(&self, id: NodeId) -> Option<Arc<ProxyNode>> {
        self.node_map.get(id)
    }

    /// Send everything queued since the last flush.
    pub fn flush(&self, timestamp: u64) {
        self.transaction_proxy.flush_implicit_transaction(timestamp);
    }

    // ------------------------------------------------------------------
    // Pipeline messages
    // ------------------------------------------------------------------

    pub(crate) fn set_animation_finish_callback(&self, animation: AnimationId, callback: AnimationFinishCallback) {
        lock(&self.animation_callbacks).insert(animation, callback);
    }

    pub(crate) fn set_buffer_available_callback(&self, node: NodeId, callback: BufferAvailableCallback) {
        lock(&self.buffer_callbacks).insert(node, callback);
    }

    /// Run the callbacks of every message received so far. Returns the
    /// number of messages handled.
    pub fn dispatch_messages(&self) -> usize {
        let messages = std::mem::take(&mut *lock(&self.inbox));
        for message in &messages {
            match *message {
                PipelineMessage::AnimationFinished { node, animation } => {
                    let callback = lock(&self.animation_callbacks).remove(&animation);
                    match callback {
                        Some(callback) => callback(),
                        None => log::trace!("animation {animation} on {node} finished without callback"),
                    }
                }
                PipelineMessage::BufferAvailable { node } => {
                    let callback = lock(&self.buffer_callbacks).remove(&node);
                    match callback {
                        Some(callback) => callback(),
                        None => log::debug!("buffer available on {node} without callback"),
                    }
                }
            }
        }
        messages.len()
    }
}

impl ApplicationAgent for UiContext {
    fn on_messages(&self, pid: u32, messages: Vec<PipelineMessage>) {
        if pid != self.pid() {
            log::warn!("pid {} received {} messages addressed to pid {pid}", self.pid(), messages.len());
        }
        lock(&self.inbox).extend(messages);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives the client side of one window: owns its root node and surface,
/// and on every UI vsync delivers pipeline messages then flushes the
/// commands the frame produced.
pub struct UiDirector {
    context: Arc<UiContext>,
    root: Option<Arc<ProxyNode>>,
    surface: Option<Arc<ProxyNode>>,
}

impl UiDirector {
    pub fn new(context: Arc<UiContext>) -> Self {
        Self {
            context,
            root: None,
            surface: None,
        }
    }

    pub fn context(&self) -> &Arc<UiContext> {
        &self.context
    }

    pub fn root(&self) -> Option<&Arc<ProxyNode>> {
        self.root.as_ref()
    }

    pub fn surface(&self) -> Option<&Arc<ProxyNode>> {
        self.surface.as_ref()
    }

    /// Install `root` as the content of this window. Must be a root node.
    pub fn set_root(&mut self, root: Arc<ProxyNode>) {
        if !root.is_instance_of(NodeType::Root) {
            log::error!("set_root: node {} is not a root node", root.hierarchy_id());
            return;
        }
        self.root = Some(root);
        self.attach();
    }

    /// Install the surface the root renders into. Must be a surface node.
    pub fn set_surface(&mut self, surface: Arc<ProxyNode>) {
        if !surface.is_instance_of(NodeType::Surface) {
            log::error!("set_surface: node {} is not a surface node", surface.hierarchy_id());
            return;
        }
        self.surface = Some(surface);
        self.attach();
    }

    fn attach(&self) {
        if let (Some(root), Some(surface)) = (&self.root, &self.surface) {
            root.attach_surface(surface);
        }
    }

    /// One UI frame at `timestamp`.
    pub fn on_vsync(&self, timestamp: u64) {
        let handled = self.context.dispatch_messages();
        if handled > 0 {
            log::trace!("dispatched {handled} pipeline messages");
        }
        self.context.flush(timestamp);
    }
}
