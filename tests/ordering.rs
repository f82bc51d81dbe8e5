use std::sync::{Arc, Mutex};

use strata::client::{ProxyNode, UiContext};
use strata::command::canvas_node::CanvasNodeCreate;
use strata::command::node::NodeSetProperty;
use strata::config::PipelineConfig;
use strata::pipeline::{Pipeline, PropertyUpdate, VsyncCallback, VsyncError, VsyncSource};
use strata::transaction::{Origin, RenderClient, RenderThreadClient, TransactionData};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct ManualVsync {
    pending: Mutex<Option<VsyncCallback>>,
}

impl VsyncSource for ManualVsync {
    fn request_next_vsync(&self, callback: VsyncCallback) -> Result<(), VsyncError> {
        *self.pending.lock().unwrap() = Some(callback);
        Ok(())
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default().pid(1), Arc::new(ManualVsync::default()))
}

fn set_alpha(origin: Origin, pid: u32, index: u64, timestamp: u64, alpha: f32) -> TransactionData {
    let mut transaction = TransactionData::new(origin);
    transaction.set_sender(pid, index);
    transaction.set_timestamp(timestamp);
    transaction.push(Box::new(NodeSetProperty(50, PropertyUpdate::Alpha(alpha))));
    transaction
}

fn alpha(pipeline: &Pipeline) -> f32 {
    pipeline.context().get(50).unwrap().properties().alpha
}

#[test]
fn test_last_timestamp_wins_regardless_of_arrival() {
    init();
    let mut pipeline = pipeline();
    let handle = pipeline.handle();

    let mut create = TransactionData::new(Origin::Ui);
    create.push(Box::new(CanvasNodeCreate(50)));
    handle.submit_transaction(create);
    pipeline.on_vsync(1);

    handle.submit_transaction(set_alpha(Origin::Ui, 2, 0, 30, 0.3));
    handle.submit_transaction(set_alpha(Origin::Ui, 3, 0, 10, 0.1));
    handle.submit_transaction(set_alpha(Origin::Ui, 4, 0, 20, 0.2));
    pipeline.on_vsync(40);
    assert_eq!(alpha(&pipeline), 0.3);
}

#[test]
fn test_same_timestamp_keeps_submission_order() {
    init();
    let mut pipeline = pipeline();
    let handle = pipeline.handle();
    let mut create = TransactionData::new(Origin::Ui);
    create.push(Box::new(CanvasNodeCreate(50)));
    handle.submit_transaction(create);

    handle.submit_transaction(set_alpha(Origin::Ui, 2, 0, 30, 0.6));
    handle.submit_transaction(set_alpha(Origin::Ui, 3, 0, 30, 0.7));
    pipeline.on_vsync(40);
    assert_eq!(alpha(&pipeline), 0.7);
}

#[test]
fn test_pipeline_origin_sorts_before_ui_at_same_timestamp() {
    init();
    let mut pipeline = pipeline();
    let handle = pipeline.handle();
    let mut create = TransactionData::new(Origin::Ui);
    create.push(Box::new(CanvasNodeCreate(50)));
    handle.submit_transaction(create);

    handle.submit_transaction(set_alpha(Origin::Ui, 2, 0, 30, 0.4));
    handle.submit_transaction(set_alpha(Origin::Pipeline, 1, 0, 30, 0.9));
    pipeline.on_vsync(40);
    assert_eq!(alpha(&pipeline), 0.4);
}

#[test]
fn test_sender_indexes_apply_in_sequence() {
    init();
    let mut pipeline = pipeline();
    let handle = pipeline.handle();
    let mut create = TransactionData::new(Origin::Ui);
    create.push(Box::new(CanvasNodeCreate(50)));
    handle.submit_transaction(create);
    pipeline.on_vsync(1);

    // Index 3 arrives first and carries the newest timestamp, but must
    // still wait for 2.
    handle.submit_transaction(set_alpha(Origin::Ui, 9, 1, 10, 0.1));
    handle.submit_transaction(set_alpha(Origin::Ui, 9, 3, 30, 0.3));
    pipeline.on_vsync(2);
    assert_eq!(alpha(&pipeline), 0.1);

    handle.submit_transaction(set_alpha(Origin::Ui, 9, 2, 20, 0.2));
    pipeline.on_vsync(3);
    assert_eq!(alpha(&pipeline), 0.3);
}

struct Harness {
    ui: Arc<UiContext>,
    pipeline: Pipeline,
    timestamp: u64,
}

impl Harness {
    fn new() -> Self {
        let pipeline = pipeline();
        let client: Arc<dyn RenderClient> = Arc::new(RenderThreadClient::new(pipeline.handle()));
        let ui = UiContext::new(11, false, Some(client), None);
        Self {
            ui,
            pipeline,
            timestamp: 0,
        }
    }

    fn frame(&mut self) {
        self.timestamp += 16;
        self.ui.flush(self.timestamp);
        self.pipeline.on_vsync(self.timestamp);
    }

    fn assert_consistent(&self, node: &ProxyNode) {
        assert_eq!(
            node.children(),
            self.pipeline.context().children(node.id()),
            "children of {} diverged",
            node.id()
        );
        for child in node.children() {
            let render_parent = self.pipeline.context().get(child).and_then(|n| n.parent());
            assert_eq!(render_parent, Some(node.id()));
        }
    }
}

#[test]
fn test_proxy_and_render_trees_stay_consistent() {
    init();
    let mut harness = Harness::new();
    let parent = harness.ui.create_canvas_node(false);
    let other = harness.ui.create_canvas_node(false);
    let nodes: Vec<_> = (0..5).map(|_| harness.ui.create_canvas_node(false)).collect();

    for node in &nodes {
        parent.add_child(node, -1);
    }
    harness.frame();
    harness.assert_consistent(&parent);

    parent.move_child(&nodes[0], 3);
    parent.move_child(&nodes[4], 0);
    parent.move_child(&nodes[2], 100);
    parent.add_child(&nodes[1], 0);
    harness.frame();
    harness.assert_consistent(&parent);

    other.add_child(&nodes[3], 0);
    parent.remove_child(&nodes[2]);
    nodes[0].remove_from_tree();
    parent.add_child(&nodes[2], 1);
    harness.frame();
    harness.assert_consistent(&parent);
    harness.assert_consistent(&other);

    parent.clear_children();
    harness.frame();
    harness.assert_consistent(&parent);
    assert!(parent.children().is_empty());
}

#[test]
fn test_dropped_proxy_destroys_render_node() {
    init();
    let mut harness = Harness::new();
    let parent = harness.ui.create_canvas_node(false);
    let child = harness.ui.create_canvas_node(false);
    parent.add_child(&child, -1);
    harness.frame();
    let child_id = child.id();
    assert!(harness.pipeline.context().contains(child_id));

    drop(child);
    harness.frame();
    assert!(!harness.pipeline.context().contains(child_id));
    harness.assert_consistent(&parent);
}
