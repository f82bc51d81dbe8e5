//! Render commands: the only way the authoritative tree is mutated.
//!
//! A command is an immutable operand tuple tagged with a `(type, subtype)`
//! pair. Concrete commands are plain structs declared with
//! `#[derive(Command)]`, which supplies marshalling, unmarshalling and the
//! call into the command's apply function.
//!
//! Wire shape of one command: `[u16 type][u16 subtype][operand_0..operand_n]`.

use std::any::Any;
use std::fmt;

use crate::pipeline::RenderContext;
use crate::transaction::{MarshalError, Parcel};

pub mod animation;
pub mod base_node;
pub mod canvas_node;
pub mod display_node;
pub mod node;
pub mod proxy_node;
pub mod registry;
pub mod root_node;
pub mod surface_node;

pub use registry::{register_builtin_commands, CommandRegistry, RegistryEntry, UnmarshalFn};
pub use strata_macros::Command;

/// Command families. The discriminant is the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum CommandType {
    BaseNode = 0,
    RsNode = 1,
    CanvasNode = 2,
    SurfaceNode = 3,
    ProxyNode = 4,
    RootNode = 5,
    DisplayNode = 6,
    Animation = 7,
}

impl CommandType {
    pub fn from_u16(value: u16) -> Option<Self> {
        let kind = match value {
            0 => CommandType::BaseNode,
            1 => CommandType::RsNode,
            2 => CommandType::CanvasNode,
            3 => CommandType::SurfaceNode,
            4 => CommandType::ProxyNode,
            5 => CommandType::RootNode,
            6 => CommandType::DisplayNode,
            7 => CommandType::Animation,
            _ => return None,
        };
        Some(kind)
    }
}

/// Registry key of a `(type, subtype)` pair. Both halves are 16 bits wide, so
/// distinct pairs never collide.
#[inline]
pub const fn registry_key(command_type: u16, subtype: u16) -> u32 {
    ((command_type as u32) << 16) | subtype as u32
}

/// A replayable mutation of the authoritative tree.
pub trait Command: Send + Sync + fmt::Debug + 'static {
    fn command_type(&self) -> CommandType;

    fn subtype(&self) -> u16;

    /// Type name, for logs.
    fn name(&self) -> &'static str;

    /// Write the operands, without the `(type, subtype)` header.
    fn marshal_operands(&self, parcel: &mut Parcel) -> Result<(), MarshalError>;

    /// Replay the command. A target that no longer exists makes this a no-op.
    fn process(&self, context: &mut RenderContext);

    fn clone_box(&self) -> Box<dyn Command>;

    fn as_any(&self) -> &dyn Any;

    fn key(&self) -> u32 {
        registry_key(self.command_type() as u16, self.subtype())
    }

    /// Write the full command: header, then operands.
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        parcel.write_pod(&(self.command_type() as u16));
        parcel.write_pod(&self.subtype());
        self.marshal_operands(parcel)
    }
}

impl dyn Command {
    pub fn downcast_ref<T: Command>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Clone for Box<dyn Command> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Static description of a concrete command type, used for registration.
pub trait CommandDescriptor: Command + Sized {
    const TYPE: CommandType;
    const SUBTYPE: u16;
    const NAME: &'static str;

    /// Decode the operands that follow an already consumed header.
    fn unmarshal(parcel: &mut Parcel) -> Result<Box<dyn Command>, MarshalError>;
}
