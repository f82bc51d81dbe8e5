use strata::command::animation::{
    AnimationCancel, AnimationCreate, AnimationFinish, AnimationPause, AnimationResume,
};
use strata::command::base_node::{
    BaseNodeAddChild, BaseNodeAddCrossParentChild, BaseNodeClearChild, BaseNodeDestroy,
    BaseNodeMoveChild, BaseNodeRemoveChild, BaseNodeRemoveCrossParentChild, BaseNodeRemoveFromTree,
};
use strata::command::canvas_node::{CanvasNodeClearRecording, CanvasNodeCreate, CanvasNodeUpdateRecording};
use strata::command::display_node::{
    DisplayNodeCreate, DisplayNodeSetDisplayOffset, DisplayNodeSetScreenId,
};
use strata::command::node::{NodeResetProperties, NodeSetProperty};
use strata::command::proxy_node::ProxyNodeCreate;
use strata::command::root_node::{RootNodeAttachRsSurfaceNode, RootNodeCreate, RootNodeSetEnableRender};
use strata::command::surface_node::{
    SurfaceNodeCreate, SurfaceNodeSetCallbackForBufferAvailable,
    SurfaceNodeUpdateParentWithoutTransition,
};
use strata::command::{Command, CommandRegistry};
use strata::common::{Color, Vector2f, Vector4f};
use strata::pipeline::{DrawCmdList, DrawOp, DrawSlot, PropertyUpdate, RenderAnimation, REPEAT_INFINITE};
use strata::transaction::{MarshalError, Origin, Parcel, TransactionData};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn recording() -> DrawCmdList {
    let mut list = DrawCmdList::new(320, 240);
    list.push(DrawOp::RoundRect {
        rect: Vector4f::new(0.0, 0.0, 320.0, 240.0),
        radius: 8.0,
        color: Color::rgba(30, 30, 40, 255),
    })
    .push(DrawOp::Text {
        origin: Vector2f::new(12.0, 24.0),
        text: "héllo".to_owned(),
        font_size: 14.0,
        color: Color::WHITE,
    })
    .push(DrawOp::Image {
        rect: Vector4f::new(4.0, 4.0, 16.0, 16.0),
        image_id: u64::MAX,
    });
    list
}

/// One instance of every built-in command, with operands at the edges of
/// their ranges where it matters.
fn every_command() -> Vec<Box<dyn Command>> {
    let max = u64::MAX;
    let animation = RenderAnimation::new(max, PropertyUpdate::Scale(Vector2f::new(2.0, 0.5)), 300_000_000)
        .delay(1)
        .repeat(REPEAT_INFINITE)
        .auto_reverse(true);
    vec![
        Box::new(BaseNodeDestroy(max)),
        Box::new(BaseNodeAddChild(0, max, -1)),
        Box::new(BaseNodeMoveChild(1, 2, i32::MAX)),
        Box::new(BaseNodeRemoveChild(max, 0)),
        Box::new(BaseNodeAddCrossParentChild(3, 4, i32::MIN)),
        Box::new(BaseNodeRemoveCrossParentChild(3, 4, 0)),
        Box::new(BaseNodeRemoveFromTree(0)),
        Box::new(BaseNodeClearChild(max)),
        Box::new(NodeSetProperty(5, PropertyUpdate::BackgroundColor(Color::rgba(1, 2, 3, 4)))),
        Box::new(NodeResetProperties(5)),
        Box::new(CanvasNodeCreate(6)),
        Box::new(CanvasNodeUpdateRecording(6, recording(), DrawSlot::Overlay)),
        Box::new(CanvasNodeClearRecording(6)),
        Box::new(SurfaceNodeCreate(7, String::new())),
        Box::new(SurfaceNodeSetCallbackForBufferAvailable(7, true)),
        Box::new(SurfaceNodeUpdateParentWithoutTransition(7, max)),
        Box::new(ProxyNodeCreate(8, max)),
        Box::new(RootNodeCreate(9)),
        Box::new(RootNodeAttachRsSurfaceNode(9, 7)),
        Box::new(RootNodeSetEnableRender(9, false)),
        Box::new(DisplayNodeCreate(10, max)),
        Box::new(DisplayNodeSetScreenId(10, 0)),
        Box::new(DisplayNodeSetDisplayOffset(10, i32::MIN, i32::MAX)),
        Box::new(AnimationCreate(5, animation)),
        Box::new(AnimationPause(5, max)),
        Box::new(AnimationResume(5, max)),
        Box::new(AnimationFinish(5, 0)),
        Box::new(AnimationCancel(5, 1)),
    ]
}

fn encode(commands: &[Box<dyn Command>]) -> Vec<u8> {
    let mut transaction = TransactionData::new(Origin::Ui);
    transaction.set_timestamp(u64::MAX);
    transaction.set_sender(u32::MAX, u64::MAX);
    for command in commands {
        transaction.push(command.clone());
    }
    let mut parcel = Parcel::new();
    transaction.marshal(&mut parcel).unwrap();
    parcel.into_bytes()
}

#[test]
fn test_every_command_survives_the_wire() {
    init();
    let commands = every_command();
    assert_eq!(commands.len(), 28);

    let registry = CommandRegistry::with_builtin_commands();
    let bytes = encode(&commands);
    let decoded = TransactionData::unmarshal(&mut Parcel::from_bytes(bytes), &registry).unwrap();

    assert!(!decoded.is_truncated());
    assert_eq!(decoded.timestamp(), u64::MAX);
    assert_eq!(decoded.sender_pid(), u32::MAX);
    assert_eq!(decoded.index(), u64::MAX);
    assert_eq!(decoded.len(), commands.len());
    for (sent, received) in commands.iter().zip(decoded.commands()) {
        assert_eq!(sent.key(), received.key(), "{}", sent.name());
        assert_eq!(format!("{sent:?}"), format!("{received:?}"));
    }
    let recording = decoded.commands()[11]
        .downcast_ref::<CanvasNodeUpdateRecording>()
        .unwrap();
    assert_eq!(recording.1, self::recording());
}

#[test]
fn test_every_command_has_a_distinct_key() {
    let mut keys: Vec<u32> = every_command().iter().map(|c| c.key()).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), 28);
}

#[test]
fn test_truncated_bytes_keep_decoded_prefix() {
    init();
    let commands = every_command();
    let mut bytes = encode(&commands[..3]);
    // Cut into the third command's operands.
    bytes.truncate(bytes.len() - 2);

    let registry = CommandRegistry::with_builtin_commands();
    let decoded = TransactionData::unmarshal(&mut Parcel::from_bytes(bytes), &registry).unwrap();
    assert_eq!(decoded.len(), 2);
    assert!(decoded.is_truncated());
}

#[test]
fn test_truncated_header_is_an_error() {
    let registry = CommandRegistry::with_builtin_commands();
    let result = TransactionData::unmarshal(&mut Parcel::from_bytes(vec![1, 2, 3]), &registry);
    assert!(matches!(result, Err(MarshalError::UnexpectedEof { .. })));
}

#[test]
fn test_empty_registry_decodes_nothing() {
    init();
    let bytes = encode(&every_command()[..1]);
    let decoded = TransactionData::unmarshal(&mut Parcel::from_bytes(bytes), &CommandRegistry::new()).unwrap();
    assert!(decoded.is_empty());
    assert!(decoded.is_truncated());
}
