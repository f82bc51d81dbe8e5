use std::sync::{Arc, Mutex};

use strata::client::UiContext;
use strata::command::base_node::{BaseNodeAddChild, BaseNodeRemoveFromTree};
use strata::command::canvas_node::CanvasNodeCreate;
use strata::command::node::NodeSetProperty;
use strata::command::{Command, CommandRegistry};
use strata::config::PipelineConfig;
use strata::pipeline::{
    Pipeline, PropertyUpdate, RenderContext, VsyncCallback, VsyncError, VsyncSource,
};
use strata::transaction::{
    FollowType, Marshal, Origin, Parcel, RenderClient, RenderThreadClient, TransactionData,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct ManualVsync {
    pending: Mutex<Option<VsyncCallback>>,
}

impl ManualVsync {
    fn fire(&self, timestamp: u64) -> bool {
        let callback = self.pending.lock().unwrap().take();
        callback.map(|cb| cb(timestamp)).is_some()
    }
}

impl VsyncSource for ManualVsync {
    fn request_next_vsync(&self, callback: VsyncCallback) -> Result<(), VsyncError> {
        *self.pending.lock().unwrap() = Some(callback);
        Ok(())
    }
}

fn scenario_a() -> TransactionData {
    let mut t1 = TransactionData::new(Origin::Ui);
    t1.push(Box::new(CanvasNodeCreate(100)));
    t1.push(Box::new(CanvasNodeCreate(101)));
    t1.push(Box::new(BaseNodeAddChild(100, 101, -1)));
    t1
}

#[test]
fn test_scenario_a_add_child() {
    init();
    let mut context = RenderContext::new();
    scenario_a().process(&mut context);

    assert_eq!(context.children(100), vec![101]);
    assert_eq!(context.get(101).and_then(|n| n.parent()), Some(100));
}

#[test]
fn test_scenario_b_remove_from_tree() {
    init();
    let mut context = RenderContext::new();
    scenario_a().process(&mut context);

    let mut t2 = TransactionData::new(Origin::Ui);
    t2.push(Box::new(BaseNodeRemoveFromTree(101)));
    t2.process(&mut context);

    assert!(context.children(100).is_empty());
    assert!(context.contains(101));
    assert_eq!(context.get(101).and_then(|n| n.parent()), None);
}

#[test]
fn test_scenario_c_unknown_subtype_is_not_executed() {
    init();
    let valid: [Box<dyn Command>; 3] = [
        Box::new(CanvasNodeCreate(100)),
        Box::new(CanvasNodeCreate(101)),
        Box::new(NodeSetProperty(100, PropertyUpdate::Alpha(0.5))),
    ];

    // Header announcing four commands; the last one has a subtype nothing
    // registers.
    let mut parcel = Parcel::new();
    7u64.marshal(&mut parcel).unwrap();
    Origin::Ui.marshal(&mut parcel).unwrap();
    42u32.marshal(&mut parcel).unwrap();
    0u64.marshal(&mut parcel).unwrap();
    4u32.marshal(&mut parcel).unwrap();
    for command in &valid {
        0u64.marshal(&mut parcel).unwrap();
        FollowType::None.marshal(&mut parcel).unwrap();
        Command::marshal(command.as_ref(), &mut parcel).unwrap();
    }
    0u64.marshal(&mut parcel).unwrap();
    FollowType::None.marshal(&mut parcel).unwrap();
    parcel.write_pod(&0u16);
    parcel.write_pod(&999u16);
    parcel.write_pod(&100u64);

    let registry = CommandRegistry::with_builtin_commands();
    let mut incoming = Parcel::from_bytes(parcel.into_bytes());
    let transaction = TransactionData::unmarshal(&mut incoming, &registry).unwrap();
    assert_eq!(transaction.len(), 3);
    assert!(transaction.is_truncated());

    let mut context = RenderContext::new();
    transaction.process(&mut context);
    assert!(context.contains(100));
    assert!(context.contains(101));
    assert_eq!(context.get(100).unwrap().properties().alpha, 0.5);
}

#[test]
fn test_scenarios_through_client_and_pipeline() {
    init();
    let vsync = Arc::new(ManualVsync::default());
    let mut pipeline = Pipeline::new(PipelineConfig::default().pid(1), vsync.clone());
    let client: Arc<dyn RenderClient> = Arc::new(RenderThreadClient::new(pipeline.handle()));
    let ui = UiContext::new(7, false, Some(client), None);

    let a = ui.create_canvas_node(false);
    let b = ui.create_canvas_node(false);
    a.add_child(&b, -1);
    ui.flush(16);
    assert!(vsync.fire(16));
    pipeline.poll();
    assert_eq!(pipeline.context().children(a.id()), vec![b.id()]);

    b.remove_from_tree();
    ui.flush(32);
    assert!(vsync.fire(32));
    pipeline.poll();
    assert!(pipeline.context().children(a.id()).is_empty());
    assert!(a.children().is_empty());
}
