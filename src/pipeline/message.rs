//! Messages the pipeline sends back to the processes that own nodes.

use std::collections::BTreeMap;

use crate::common::{AnimationId, NodeId};
use crate::transaction::{Marshal, MarshalError, Parcel};

/// A side effect observed by the pipeline that the owning client should hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMessage {
    /// An animation ran to completion, was finished early or was cancelled.
    AnimationFinished {
        node: NodeId,
        animation: AnimationId,
    },
    /// A surface received its first content buffer.
    BufferAvailable { node: NodeId },
}

/// Receiver of pipeline messages for one client process.
///
/// Called on the pipeline thread; implementations should hand the messages
/// over to their own thread rather than run callbacks inline.
pub trait ApplicationAgent: Send + Sync {
    fn on_messages(&self, pid: u32, messages: Vec<PipelineMessage>);
}

/// Outgoing messages collected during a frame, grouped by destination pid.
#[derive(Debug, Default)]
pub struct MessageProcessor {
    outbox: BTreeMap<u32, Vec<PipelineMessage>>,
}

impl MessageProcessor {
    pub fn post(&mut self, pid: u32, message: PipelineMessage) {
        self.outbox.entry(pid).or_default().push(message);
    }

    pub fn has_messages(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Take everything posted so far, in pid order.
    pub fn take(&mut self) -> BTreeMap<u32, Vec<PipelineMessage>> {
        std::mem::take(&mut self.outbox)
    }
}

impl Marshal for PipelineMessage {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        match self {
            PipelineMessage::AnimationFinished { node, animation } => {
                0u8.marshal(parcel)?;
                node.marshal(parcel)?;
                animation.marshal(parcel)
            }
            PipelineMessage::BufferAvailable { node } => {
                1u8.marshal(parcel)?;
                node.marshal(parcel)
            }
        }
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        match u8::unmarshal(parcel)? {
            0 => Ok(PipelineMessage::AnimationFinished {
                node: Marshal::unmarshal(parcel)?,
                animation: Marshal::unmarshal(parcel)?,
            }),
            1 => Ok(PipelineMessage::BufferAvailable {
                node: Marshal::unmarshal(parcel)?,
            }),
            other => Err(MarshalError::InvalidValue {
                what: "pipeline message",
                value: other as u64,
            }),
        }
    }
}
