//! Mapping from `(type, subtype)` to the function that decodes a command.

use std::collections::HashMap;

use super::{
    animation, base_node, canvas_node, display_node, node, proxy_node, registry_key, root_node,
    surface_node, Command, CommandDescriptor,
};
use crate::transaction::{MarshalError, Parcel};

/// Decodes the operands of one command kind.
pub type UnmarshalFn = fn(&mut Parcel) -> Result<Box<dyn Command>, MarshalError>;

#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub unmarshal: UnmarshalFn,
}

/// Lookup table used to decode incoming transactions.
///
/// Registration is first-writer-wins: a second registration under a key that
/// is already taken is logged and ignored.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    entries: HashMap<u32, RegistryEntry>,
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in command.
    pub fn with_builtin_commands() -> Self {
        let mut registry = Self::new();
        register_builtin_commands(&mut registry);
        registry
    }

    pub fn register<C: CommandDescriptor>(&mut self) -> bool {
        self.register_fn(C::TYPE as u16, C::SUBTYPE, C::NAME, C::unmarshal)
    }

    pub fn register_fn(
        &mut self,
        command_type: u16,
        subtype: u16,
        name: &'static str,
        unmarshal: UnmarshalFn,
    ) -> bool {
        let key = registry_key(command_type, subtype);
        if let Some(existing) = self.entries.get(&key) {
            log::error!(
                "duplicate registration of command type {command_type} subtype {subtype}: \
                 keeping {}, ignoring {name}",
                existing.name
            );
            return false;
        }
        self.entries.insert(key, RegistryEntry { name, unmarshal });
        true
    }

    pub fn get(&self, command_type: u16, subtype: u16) -> Option<&RegistryEntry> {
        self.entries.get(&registry_key(command_type, subtype))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode one command, header included.
    pub fn unmarshal_command(&self, parcel: &mut Parcel) -> Result<Box<dyn Command>, MarshalError> {
        let command_type = parcel.read_pod::<u16>()?;
        let subtype = parcel.read_pod::<u16>()?;
        let entry = self
            .get(command_type, subtype)
            .ok_or(MarshalError::UnknownCommand {
                command_type,
                subtype,
            })?;
        (entry.unmarshal)(parcel)
    }
}

/// Register every built-in command kind, family by family.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register::<base_node::BaseNodeDestroy>();
    registry.register::<base_node::BaseNodeAddChild>();
    registry.register::<base_node::BaseNodeMoveChild>();
    registry.register::<base_node::BaseNodeRemoveChild>();
    registry.register::<base_node::BaseNodeAddCrossParentChild>();
    registry.register::<base_node::BaseNodeRemoveCrossParentChild>();
    registry.register::<base_node::BaseNodeRemoveFromTree>();
    registry.register::<base_node::BaseNodeClearChild>();

    registry.register::<node::NodeSetProperty>();
    registry.register::<node::NodeResetProperties>();

    registry.register::<canvas_node::CanvasNodeCreate>();
    registry.register::<canvas_node::CanvasNodeUpdateRecording>();
    registry.register::<canvas_node::CanvasNodeClearRecording>();

    registry.register::<surface_node::SurfaceNodeCreate>();
    registry.register::<surface_node::SurfaceNodeSetCallbackForBufferAvailable>();
    registry.register::<surface_node::SurfaceNodeUpdateParentWithoutTransition>();

    registry.register::<proxy_node::ProxyNodeCreate>();

    registry.register::<root_node::RootNodeCreate>();
    registry.register::<root_node::RootNodeAttachRsSurfaceNode>();
    registry.register::<root_node::RootNodeSetEnableRender>();

    registry.register::<display_node::DisplayNodeCreate>();
    registry.register::<display_node::DisplayNodeSetScreenId>();
    registry.register::<display_node::DisplayNodeSetDisplayOffset>();

    registry.register::<animation::AnimationCreate>();
    registry.register::<animation::AnimationPause>();
    registry.register::<animation::AnimationResume>();
    registry.register::<animation::AnimationFinish>();
    registry.register::<animation::AnimationCancel>();
}
