//! The vsync-driven pipeline loop.
//!
//! A [`Pipeline`] is the only writer of its [`RenderContext`]. Producers
//! reach it through a [`PipelineHandle`], which queues transactions, surface
//! buffers and tasks behind one mutex and requests a vsync or pings the
//! event loop. Each vsync runs one tick:
//!
//! 1. consume queued surface buffers
//! 2. apply ready transactions in `(timestamp, origin)` order; in divided
//!    render mode, commands that follow a surface wait for that surface's
//!    buffers to catch up with them
//! 3. advance animations
//! 4. prepare, draw and compose, unless nothing changed
//! 5. send pipeline-origin commands and deliver messages to their owners

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use calloop::ping::{make_ping, Ping};
use calloop::{EventLoop, LoopSignal};

use crate::command::surface_node::SurfaceNodeUpdateParentWithoutTransition;
use crate::command::Command;
use crate::common::{extract_pid, NodeId};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::transaction::{FollowType, Origin, RenderClient, TransactionData};

use super::backend::{DrawingBackend, NullBackend};
use super::composer::{ComposerAdapter, DisplayError, Fence};
use super::context::RenderContext;
use super::message::{ApplicationAgent, PipelineMessage};
use super::render_node::{DirtyFlags, RenderNode, SurfaceBuffer};
use super::visitor::RenderVisitor;
use super::vsync::{monotonic_now_ns, VsyncError, VsyncReceiver, VsyncSource};

type PipelineTask = Box<dyn FnOnce(&mut Pipeline) + Send>;

/// A command ready to apply, with the order key of its transaction.
type EffectiveCommand = (u64, Origin, Box<dyn Command>);

/// Commands waiting on one surface's buffers, by transaction timestamp.
type CachedCommands = BTreeMap<u64, Vec<(Origin, Box<dyn Command>)>>;

#[derive(Default)]
struct PendingWork {
    transactions: Vec<TransactionData>,
    buffers: Vec<(NodeId, SurfaceBuffer)>,
    tasks: Vec<PipelineTask>,
    /// Timestamp of a vsync that fired and has not been handled yet.
    vsync: Option<u64>,
}

struct PipelineShared {
    pending: Mutex<PendingWork>,
    agents: Mutex<HashMap<u32, Arc<dyn ApplicationAgent>>>,
    stats: PipelineStats,
    vsync: VsyncReceiver,
    vsync_lost: AtomicBool,
    wakeup: OnceLock<Ping>,
    sync_task_timeout: Duration,
}

impl PipelineShared {
    fn pending(&self) -> MutexGuard<'_, PendingWork> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn agent(&self, pid: u32) -> Option<Arc<dyn ApplicationAgent>> {
        self.agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pid)
            .cloned()
    }

    fn wake(&self) {
        if let Some(ping) = self.wakeup.get() {
            ping.ping();
        }
    }

    fn on_vsync_signal(&self, timestamp: u64) {
        {
            let mut pending = self.pending();
            pending.vsync = Some(pending.vsync.map_or(timestamp, |t| t.max(timestamp)));
        }
        self.wake();
    }

    fn request_vsync(self: &Arc<Self>) {
        let shared = Arc::downgrade(self);
        let result = self.vsync.request_next_vsync(Box::new(move |timestamp| {
            if let Some(shared) = shared.upgrade() {
                shared.on_vsync_signal(timestamp);
            }
        }));
        match result {
            Ok(()) => {
                self.stats.record_vsync_request();
                self.vsync_lost.store(false, Ordering::Relaxed);
            }
            Err(VsyncError::AlreadyRequested) => {}
            Err(VsyncError::SourceLost) => {
                if !self.vsync_lost.swap(true, Ordering::Relaxed) {
                    log::warn!("vsync source lost, running frames unsynchronized");
                }
                self.on_vsync_signal(monotonic_now_ns());
            }
        }
    }
}

/// Producer-side access to a pipeline. Cheap to clone; never blocks on the
/// pipeline thread except in [`post_sync_task`](Self::post_sync_task).
#[derive(Clone)]
pub struct PipelineHandle {
    shared: Arc<PipelineShared>,
}

impl PipelineHandle {
    /// Queue a transaction for the next vsync.
    pub fn submit_transaction(&self, transaction: TransactionData) {
        log::trace!(
            "queued transaction from pid {} index {} with {} commands",
            transaction.sender_pid(),
            transaction.index(),
            transaction.len()
        );
        self.shared.pending().transactions.push(transaction);
        self.shared.request_vsync();
    }

    /// Queue a content buffer produced for a surface node.
    pub fn queue_buffer(&self, node: NodeId, buffer: SurfaceBuffer) {
        self.shared.pending().buffers.push((node, buffer));
        self.shared.request_vsync();
    }

    /// Route pipeline messages for `pid` to `agent`, replacing any previous agent.
    pub fn register_application_agent(&self, pid: u32, agent: Arc<dyn ApplicationAgent>) {
        log::info!("application agent registered for pid {pid}");
        self.shared
            .agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid, agent);
    }

    pub fn unregister_application_agent(&self, pid: u32) {
        let removed = self
            .shared
            .agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid);
        if removed.is_some() {
            log::info!("application agent unregistered for pid {pid}");
        }
    }

    pub fn record_decode_failure(&self) {
        self.shared.stats.record_decode_failure();
    }

    /// Ask for a vsync even if nothing is queued.
    pub fn request_vsync(&self) {
        self.shared.request_vsync();
    }

    /// Run `task` on the pipeline thread before the next tick.
    pub fn post_task(&self, task: impl FnOnce(&mut Pipeline) + Send + 'static) {
        self.shared.pending().tasks.push(Box::new(task));
        self.shared.wake();
    }

    /// Run `task` on the pipeline thread and wait for its result for at
    /// most the configured sync task timeout. Returns `None` on timeout;
    /// the task may still run later.
    pub fn post_sync_task<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut Pipeline) -> R + Send + 'static,
    ) -> Option<R> {
        let (tx, rx) = mpsc::channel();
        self.post_task(move |pipeline| {
            // The caller may have given up waiting.
            let _ = tx.send(task(pipeline));
        });
        match rx.recv_timeout(self.shared.sync_task_timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "sync task timed out after {:?}, continuing without its result",
                    self.shared.sync_task_timeout
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("sync task dropped before it ran");
                None
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SenderOrder {
    last_index: u64,
    waited_frames: u32,
}

/// One render pipeline instance.
pub struct Pipeline {
    config: PipelineConfig,
    context: RenderContext,
    shared: Arc<PipelineShared>,
    visitor: RenderVisitor,
    backend: Box<dyn DrawingBackend>,
    composer: Option<ComposerAdapter>,
    /// Receiver of pipeline-origin transactions. Without one they are
    /// applied by this pipeline on the next tick.
    upstream: Option<Arc<dyn RenderClient>>,
    sender_order: HashMap<u32, SenderOrder>,
    /// Transactions waiting for a missing predecessor, per sender.
    held: BTreeMap<u32, BTreeMap<u64, TransactionData>>,
    /// Commands following a surface, waiting for its buffers.
    cached: BTreeMap<NodeId, CachedCommands>,
    /// Timestamps of the buffers consumed this tick, per surface.
    buffer_timestamps: HashMap<NodeId, u64>,
    timestamp: u64,
    last_animate_ns: u64,
    request_vsync_count: u32,
    requested_this_frame: bool,
    uni_render_active: bool,
    last_composition: Vec<Result<Fence, DisplayError>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, vsync: Arc<dyn VsyncSource>) -> Self {
        let shared = Arc::new(PipelineShared {
            pending: Mutex::new(PendingWork::default()),
            agents: Mutex::new(HashMap::new()),
            stats: PipelineStats::new(),
            vsync: VsyncReceiver::new(vsync),
            vsync_lost: AtomicBool::new(false),
            wakeup: OnceLock::new(),
            sync_task_timeout: config.sync_task_timeout,
        });
        let uni_render_active = config.uni_render_enabled;
        Self {
            config,
            context: RenderContext::new(),
            shared,
            visitor: RenderVisitor::new(),
            backend: Box::new(NullBackend::default()),
            composer: None,
            upstream: None,
            sender_order: HashMap::new(),
            held: BTreeMap::new(),
            cached: BTreeMap::new(),
            buffer_timestamps: HashMap::new(),
            timestamp: 0,
            last_animate_ns: 0,
            request_vsync_count: 0,
            requested_this_frame: false,
            uni_render_active,
            last_composition: Vec::new(),
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn DrawingBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_composer(mut self, composer: ComposerAdapter) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn RenderClient>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Timestamp of the tick in progress or last run.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_uni_render_active(&self) -> bool {
        self.uni_render_active
    }

    /// Per-screen composition results of the last rendered frame.
    pub fn last_composition(&self) -> &[Result<Fence, DisplayError>] {
        &self.last_composition
    }

    /// Run posted tasks, then a tick if a vsync fired since the last poll.
    pub fn poll(&mut self) {
        let (tasks, vsync) = {
            let mut pending = self.shared.pending();
            (std::mem::take(&mut pending.tasks), pending.vsync.take())
        };
        for task in tasks {
            task(self);
        }
        if let Some(timestamp) = vsync {
            self.on_vsync(timestamp);
        }
    }

    /// Run one tick for the vsync at `timestamp`.
    pub fn on_vsync(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
        self.requested_this_frame = false;

        self.consume_buffers();
        self.process_commands();
        if self.animate() {
            self.request_next_vsync();
        }
        self.render();
        self.send_upstream();
        self.notify_agents();

        if self.has_pending_work() {
            self.request_next_vsync();
        }
        if !self.requested_this_frame {
            self.request_vsync_count = 0;
        }
        self.shared.stats.maybe_log(timestamp);
    }

    /// Switch uni-render on or off at runtime. Every attached surface's
    /// parent link is re-sent upstream so the other side re-attaches it.
    pub fn set_uni_render_mode(&mut self, active: bool) {
        if !self.config.uni_render_enabled {
            log::warn!("uni render is not enabled for this pipeline, mode switch ignored");
            return;
        }
        if self.uni_render_active == active {
            return;
        }
        self.uni_render_active = active;
        log::info!("uni render {}", if active { "activated" } else { "deactivated" });

        for id in self.context.surface_ids() {
            if let Some(parent) = self.context.get(id).and_then(RenderNode::parent) {
                self.context.send_upstream(
                    Box::new(SurfaceNodeUpdateParentWithoutTransition(id, parent)),
                    id,
                    FollowType::FollowVisitor,
                );
            }
        }
        self.context.request_render();
        self.request_next_vsync();
    }

    fn request_next_vsync(&mut self) {
        self.requested_this_frame = true;
        self.request_vsync_count = self.request_vsync_count.saturating_add(1);
        if self.request_vsync_count == self.config.request_vsync_warn_limit {
            log::warn!(
                "pipeline requested {} consecutive vsyncs, something keeps scheduling frames",
                self.request_vsync_count
            );
        }
        self.shared.request_vsync();
    }

    fn has_pending_work(&self) -> bool {
        if !self.held.is_empty() || !self.cached.is_empty() {
            return true;
        }
        let pending = self.shared.pending();
        !pending.transactions.is_empty() || !pending.buffers.is_empty()
    }

    fn consume_buffers(&mut self) {
        let buffers = std::mem::take(&mut self.shared.pending().buffers);
        self.buffer_timestamps.clear();
        for (id, buffer) in buffers {
            let Some(surface) = self.context.get_mut(id).and_then(RenderNode::surface_mut) else {
                log::debug!("buffer for unknown surface {id} dropped");
                continue;
            };
            surface.buffer = Some(buffer);
            self.buffer_timestamps.insert(id, buffer.timestamp);
            let notify = surface.notify_buffer_available && !surface.buffer_available_notified;
            if notify {
                surface.buffer_available_notified = true;
            }
            self.context.mark_dirty(id, DirtyFlags::CONTENT);
            if notify {
                self.context
                    .post_message(extract_pid(id), PipelineMessage::BufferAvailable { node: id });
            }
        }
    }

    fn process_commands(&mut self) {
        let incoming = std::mem::take(&mut self.shared.pending().transactions);
        let mut ready = Vec::with_capacity(incoming.len());
        for transaction in incoming {
            if transaction.index() == 0 {
                ready.push(transaction);
                continue;
            }
            let pid = transaction.sender_pid();
            let index = transaction.index();
            let last = self.sender_order.entry(pid).or_default().last_index;
            if index <= last {
                log::warn!("transaction {index} from pid {pid} arrived after {last}, applying it late");
                ready.push(transaction);
                continue;
            }
            if self.held.entry(pid).or_default().insert(index, transaction).is_some() {
                log::warn!("duplicate transaction {index} from pid {pid}, keeping the newest");
            }
        }
        self.release_held(&mut ready);

        ready.sort_by_key(TransactionData::order_key);

        let period = self.config.refresh_period_ns;
        let start = if self.timestamp.saturating_sub(self.last_animate_ns) > 2 * period {
            self.timestamp.saturating_sub(period)
        } else {
            self.last_animate_ns
        };
        self.context.set_current_timestamp(start);

        let mut effective = Vec::new();
        for transaction in ready {
            self.shared.stats.record_transaction(transaction.len());
            let (timestamp, origin) = transaction.order_key();
            for (node, follow, command) in transaction.into_payload() {
                match self.followed_surface(node, follow) {
                    Some(surface) => self
                        .cached
                        .entry(surface)
                        .or_default()
                        .entry(timestamp)
                        .or_default()
                        .push((origin, command)),
                    None => effective.push((timestamp, origin, command)),
                }
            }
        }
        self.release_cached(&mut effective);

        effective.sort_by_key(|(timestamp, origin, _)| (*timestamp, *origin));
        for (timestamp, _, command) in effective {
            self.context.set_transaction_timestamp(timestamp);
            command.process(&mut self.context);
        }
    }

    /// The surface whose buffers a command issued on `node` waits for, or
    /// `None` to apply it right away.
    fn followed_surface(&self, node: NodeId, follow: FollowType) -> Option<NodeId> {
        if self.uni_render_active || node == 0 {
            return None;
        }
        match follow {
            FollowType::None => None,
            FollowType::FollowVisitor => Some(node),
            FollowType::FollowToParent => match self.context.get(node) {
                Some(render_node) => render_node.parent(),
                // Not created yet; cached under itself and released this tick.
                None => Some(node),
            },
        }
    }

    /// Move cached commands into `effective`. A surface that consumed a
    /// buffer this tick keeps the commands newer than that buffer; every
    /// other surface releases all of its commands.
    fn release_cached(&mut self, effective: &mut Vec<EffectiveCommand>) {
        for (&surface, commands) in self.cached.iter_mut() {
            let on_tree = self.context.get(surface).is_some_and(RenderNode::is_on_tree);
            let keep_after = match self.buffer_timestamps.get(&surface) {
                Some(&buffer) if on_tree && !self.uni_render_active => buffer.checked_add(1),
                _ => None,
            };
            let kept = match keep_after {
                Some(first_kept) => commands.split_off(&first_kept),
                None => BTreeMap::new(),
            };
            let released = std::mem::replace(commands, kept);
            if !commands.is_empty() {
                log::trace!(
                    "surface {surface}: holding {} timestamps until its buffers catch up",
                    commands.len()
                );
            }
            for (timestamp, entries) in released {
                effective.extend(entries.into_iter().map(|(origin, command)| (timestamp, origin, command)));
            }
        }
        self.cached.retain(|_, commands| !commands.is_empty());
    }

    /// Move held transactions whose predecessors have all been applied into
    /// `ready`. A gap that stays open for more than the skip limit is skipped.
    fn release_held(&mut self, ready: &mut Vec<TransactionData>) {
        let limit = self.config.skip_command_frame_limit;
        for (&pid, held) in self.held.iter_mut() {
            let order = self.sender_order.entry(pid).or_default();
            while let Some(first) = held.keys().next().copied() {
                if first == order.last_index + 1 {
                    if let Some(transaction) = held.remove(&first) {
                        ready.push(transaction);
                    }
                    order.last_index = first;
                    order.waited_frames = 0;
                    continue;
                }
                order.waited_frames += 1;
                if order.waited_frames <= limit {
                    break;
                }
                log::warn!(
                    "pid {pid}: transactions {}..{} missing for {limit} frames, skipping ahead",
                    order.last_index + 1,
                    first - 1
                );
                order.last_index = first - 1;
                order.waited_frames = 0;
            }
        }
        self.held.retain(|_, held| !held.is_empty());
    }

    fn animate(&mut self) -> bool {
        let need_next_frame = self.context.has_animations() && self.context.animate(self.timestamp);
        self.last_animate_ns = self.timestamp;
        need_next_frame
    }

    fn render(&mut self) {
        if !self.context.take_needs_render() {
            self.shared.stats.record_frame_skipped();
            return;
        }
        self.visitor.prepare(&mut self.context);
        let screens = self.visitor.process(&self.context, self.backend.as_mut());
        if let Some(composer) = self.composer.as_mut() {
            self.last_composition = composer.compose_all(&screens);
        }
        self.shared.stats.record_frame_rendered();
    }

    fn send_upstream(&mut self) {
        let commands = self.context.take_upstream();
        if commands.is_empty() {
            return;
        }
        let mut transaction = TransactionData::new(Origin::Pipeline);
        transaction.set_timestamp(self.timestamp);
        transaction.set_sender(self.config.pid, 0);
        for (node, follow, command) in commands {
            transaction.push_following(command, node, follow);
        }
        match &self.upstream {
            Some(client) => client.commit_transaction(transaction),
            None => self.shared.pending().transactions.push(transaction),
        }
    }

    fn notify_agents(&mut self) {
        for (pid, messages) in self.context.messages_mut().take() {
            match self.shared.agent(pid) {
                Some(agent) => agent.on_messages(pid, messages),
                None => log::debug!(
                    "no application agent for pid {pid}, dropping {} messages",
                    messages.len()
                ),
            }
        }
    }
}

/// A pipeline running on its own thread inside a calloop event loop.
/// Stopped and joined on drop.
pub struct PipelineThread {
    handle: PipelineHandle,
    signal: LoopSignal,
    thread: Option<JoinHandle<()>>,
}

impl PipelineThread {
    pub fn spawn(pipeline: Pipeline) -> Result<Self, PipelineError> {
        crate::init_logging();
        let handle = pipeline.handle();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("strata-pipeline".into())
            .spawn(move || run_event_loop(pipeline, ready_tx))
            .map_err(PipelineError::ThreadSpawn)?;

        let signal = match ready_rx.recv() {
            Ok(Ok(signal)) => signal,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(PipelineError::Disconnected);
            }
        };
        Ok(Self {
            handle,
            signal,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.signal.stop();
        self.signal.wakeup();
        if thread.join().is_err() {
            log::error!("pipeline thread panicked");
        }
    }
}

impl Drop for PipelineThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_event_loop(mut pipeline: Pipeline, ready: mpsc::Sender<Result<LoopSignal, PipelineError>>) {
    let mut event_loop: EventLoop<Pipeline> = match EventLoop::try_new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            let _ = ready.send(Err(PipelineError::EventLoop(err.to_string())));
            return;
        }
    };
    let (ping, ping_source) = match make_ping() {
        Ok(ping) => ping,
        Err(err) => {
            let _ = ready.send(Err(PipelineError::EventLoop(err.to_string())));
            return;
        }
    };
    let inserted = event_loop
        .handle()
        .insert_source(ping_source, |_, _, pipeline: &mut Pipeline| pipeline.poll());
    if let Err(err) = inserted {
        let _ = ready.send(Err(PipelineError::EventLoop(err.error.to_string())));
        return;
    }

    let _ = pipeline.shared.wakeup.set(ping.clone());
    // Pick up anything queued before the loop existed.
    ping.ping();
    if ready.send(Ok(event_loop.get_signal())).is_err() {
        return;
    }

    log::info!("pipeline thread started for pid {}", pipeline.config.pid);
    if let Err(err) = event_loop.run(None, &mut pipeline, |_| {}) {
        log::error!("pipeline event loop failed: {err}");
    }
    log::info!("pipeline thread stopped");
}
