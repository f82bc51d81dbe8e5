//! A batch of commands delivered and applied as one unit.

use std::fmt;

use super::marshal::Marshal;
use super::parcel::{MarshalError, Parcel};
use crate::command::{Command, CommandRegistry};
use crate::common::NodeId;
use crate::pipeline::RenderContext;

/// Which thread produced a transaction.
///
/// Ordering matters: at equal timestamps, pipeline-origin transactions apply
/// before UI-origin ones, so side effects of a frame land before the UI
/// commands issued for that same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Origin {
    Pipeline = 0,
    Ui = 1,
}

impl Marshal for Origin {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        (*self as u8).marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        match u8::unmarshal(parcel)? {
            0 => Ok(Origin::Pipeline),
            1 => Ok(Origin::Ui),
            other => Err(MarshalError::InvalidValue {
                what: "transaction origin",
                value: other as u64,
            }),
        }
    }
}

/// Whose buffers a command waits for in divided render mode.
///
/// Geometry of a surface that draws its own content has to change together
/// with that content, so the render service holds such commands until the
/// followed surface consumes a buffer at least as new as the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FollowType {
    /// Applied as soon as the transaction is.
    #[default]
    None = 0,
    /// Waits for the buffers of the issuing node's parent surface.
    FollowToParent = 1,
    /// Sent by a pipeline's visitor; waits for the buffers of the node itself.
    FollowVisitor = 2,
}

impl Marshal for FollowType {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        (*self as u8).marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        match u8::unmarshal(parcel)? {
            0 => Ok(FollowType::None),
            1 => Ok(FollowType::FollowToParent),
            2 => Ok(FollowType::FollowVisitor),
            other => Err(MarshalError::InvalidValue {
                what: "follow type",
                value: other as u64,
            }),
        }
    }
}

/// One command together with the node it was issued on.
pub type PayloadEntry = (NodeId, FollowType, Box<dyn Command>);

/// Ordered commands plus the metadata used to order whole transactions.
///
/// Wire layout: `[u64 timestamp][u8 origin][u32 pid][u64 index][u32 count]`
/// followed by `count` entries of `[u64 node][u8 follow][command]`.
#[derive(Clone)]
pub struct TransactionData {
    commands: Vec<Box<dyn Command>>,
    /// Issuing node and follow type of each command, parallel to `commands`.
    follows: Vec<(NodeId, FollowType)>,
    timestamp: u64,
    origin: Origin,
    sender_pid: u32,
    /// Per-sender sequence number; `0` opts out of sequence checks.
    index: u64,
    /// Decoding stopped early; only a prefix of the sent commands is present.
    truncated: bool,
}

impl TransactionData {
    pub fn new(origin: Origin) -> Self {
        Self {
            commands: Vec::new(),
            follows: Vec::new(),
            timestamp: 0,
            origin,
            sender_pid: 0,
            index: 0,
            truncated: false,
        }
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        self.push_following(command, 0, FollowType::None);
    }

    /// Append a command issued on `node` that is scheduled per `follow`.
    pub fn push_following(&mut self, command: Box<dyn Command>, node: NodeId, follow: FollowType) {
        self.commands.push(command);
        self.follows.push((node, follow));
    }

    pub fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }

    /// Issuing node and follow type of the command at `position`.
    pub fn follow(&self, position: usize) -> Option<(NodeId, FollowType)> {
        self.follows.get(position).copied()
    }

    /// Split into commands with their issuing node and follow type.
    pub fn into_payload(self) -> Vec<PayloadEntry> {
        self.follows
            .into_iter()
            .zip(self.commands)
            .map(|((node, follow), command)| (node, follow, command))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn sender_pid(&self) -> u32 {
        self.sender_pid
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn set_sender(&mut self, pid: u32, index: u64) {
        self.sender_pid = pid;
        self.index = index;
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Key transactions are applied by.
    pub fn order_key(&self) -> (u64, Origin) {
        (self.timestamp, self.origin)
    }

    /// Replay every command, in order.
    pub fn process(&self, context: &mut RenderContext) {
        context.set_transaction_timestamp(self.timestamp);
        for command in &self.commands {
            command.process(context);
        }
    }

    pub fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        self.timestamp.marshal(parcel)?;
        self.origin.marshal(parcel)?;
        self.sender_pid.marshal(parcel)?;
        self.index.marshal(parcel)?;
        parcel.write_len(self.commands.len())?;
        for (command, (node, follow)) in self.commands.iter().zip(&self.follows) {
            node.marshal(parcel)?;
            follow.marshal(parcel)?;
            command.marshal(parcel)?;
        }
        Ok(())
    }

    /// Decode a transaction.
    ///
    /// A corrupt header fails the whole transaction. A command that fails to
    /// decode ends decoding: the commands before it are kept and the
    /// transaction is marked truncated, since the size of whatever follows
    /// can no longer be known.
    pub fn unmarshal(parcel: &mut Parcel, registry: &CommandRegistry) -> Result<Self, MarshalError> {
        let timestamp = u64::unmarshal(parcel)?;
        let origin = Origin::unmarshal(parcel)?;
        let sender_pid = u32::unmarshal(parcel)?;
        let index = u64::unmarshal(parcel)?;
        let count = u32::unmarshal(parcel)? as usize;

        let mut data = Self {
            commands: Vec::with_capacity(count.min(parcel.remaining())),
            follows: Vec::with_capacity(count.min(parcel.remaining())),
            timestamp,
            origin,
            sender_pid,
            index,
            truncated: false,
        };
        for position in 0..count {
            let entry = NodeId::unmarshal(parcel).and_then(|node| {
                let follow = FollowType::unmarshal(parcel)?;
                Ok((node, follow, registry.unmarshal_command(parcel)?))
            });
            match entry {
                Ok((node, follow, command)) => data.push_following(command, node, follow),
                Err(err) => {
                    log::error!(
                        "transaction from pid {sender_pid} index {index}: command {position} of \
                         {count} failed to decode ({err}), dropping the remaining {} commands",
                        count - position
                    );
                    data.truncated = true;
                    break;
                }
            }
        }
        Ok(data)
    }
}

impl fmt::Debug for TransactionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionData")
            .field("timestamp", &self.timestamp)
            .field("origin", &self.origin)
            .field("sender_pid", &self.sender_pid)
            .field("index", &self.index)
            .field(
                "commands",
                &self.commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("truncated", &self.truncated)
            .finish()
    }
}
