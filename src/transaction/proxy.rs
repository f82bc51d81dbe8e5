//! Client-side batching of commands into transactions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::client::RenderClient;
use super::data::{FollowType, Origin, TransactionData};
use crate::client::RenderTargets;
use crate::command::Command;
use crate::common::NodeId;

struct ProxyState {
    /// Commands for the in-process pipeline since the last flush.
    local: TransactionData,
    /// Commands for the render service since the last flush.
    remote: TransactionData,
    /// Open explicit transactions, innermost last.
    explicit: Vec<TransactionData>,
    /// Sequence number of the last transaction sent to the render service.
    last_index: u64,
}

/// Collects commands issued between flush points and commits them, one
/// transaction per destination, to the render clients.
///
/// Commands keep their issuance order. Remote transactions carry this
/// process's pid and a contiguous sequence number so the service can apply
/// them in order even if the transport reorders them.
pub struct TransactionProxy {
    pid: u32,
    render_thread_client: Option<Arc<dyn RenderClient>>,
    render_service_client: Option<Arc<dyn RenderClient>>,
    state: Mutex<ProxyState>,
}

impl TransactionProxy {
    pub fn new(
        pid: u32,
        render_thread_client: Option<Arc<dyn RenderClient>>,
        render_service_client: Option<Arc<dyn RenderClient>>,
    ) -> Self {
        if render_thread_client.is_none() && render_service_client.is_none() {
            log::warn!("transaction proxy for pid {pid} has no render client, commands will be dropped");
        }
        Self {
            pid,
            render_thread_client,
            render_service_client,
            state: Mutex::new(ProxyState {
                local: TransactionData::new(Origin::Ui),
                remote: TransactionData::new(Origin::Ui),
                explicit: Vec::new(),
                last_index: 0,
            }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Queue a command for every destination in `targets`.
    pub fn add_command(&self, command: Box<dyn Command>, targets: RenderTargets) {
        self.add_following_command(command, targets, 0, FollowType::None);
    }

    /// Like [`add_command`](Self::add_command), tagging the render-service
    /// copy with the issuing node and its follow type. The in-process
    /// pipeline always applies commands immediately.
    pub fn add_following_command(
        &self,
        command: Box<dyn Command>,
        targets: RenderTargets,
        node: NodeId,
        follow: FollowType,
    ) {
        let mut state = self.lock();
        if targets.contains(RenderTargets::RENDER_THREAD) {
            if self.render_thread_client.is_some() {
                state.local.push(command.clone());
            } else {
                log::debug!("no render thread client, dropping {}", command.name());
            }
        }
        if targets.contains(RenderTargets::RENDER_SERVICE) {
            if self.render_service_client.is_some() {
                match state.explicit.last_mut() {
                    Some(explicit) => explicit.push_following(command, node, follow),
                    None => state.remote.push_following(command, node, follow),
                }
            } else {
                log::debug!("no render service client, dropping {}", command.name());
            }
        }
    }

    /// Send everything queued since the last flush, stamped with `timestamp`.
    /// Open explicit transactions are left alone.
    pub fn flush_implicit_transaction(&self, timestamp: u64) {
        let mut state = self.lock();

        if !state.remote.is_empty() {
            if let Some(client) = &self.render_service_client {
                let mut remote = std::mem::replace(&mut state.remote, TransactionData::new(Origin::Ui));
                state.last_index += 1;
                remote.set_timestamp(timestamp);
                remote.set_sender(self.pid, state.last_index);
                client.commit_transaction(remote);
            }
        }

        if !state.local.is_empty() {
            if let Some(client) = &self.render_thread_client {
                let mut local = std::mem::replace(&mut state.local, TransactionData::new(Origin::Ui));
                local.set_timestamp(timestamp);
                local.set_sender(self.pid, 0);
                client.commit_transaction(local);
            }
        }
    }

    /// Open an explicit transaction. Render-service commands issued until the
    /// matching [`commit`](Self::commit) are delivered together.
    pub fn begin(&self) {
        self.lock().explicit.push(TransactionData::new(Origin::Ui));
    }

    /// Close the innermost explicit transaction. Nested transactions fold into
    /// their parent; the outermost one is sent immediately.
    pub fn commit(&self, timestamp: u64) {
        let mut state = self.lock();
        let Some(transaction) = state.explicit.pop() else {
            log::warn!("commit without a matching begin ignored");
            return;
        };
        if let Some(parent) = state.explicit.last_mut() {
            for (node, follow, command) in transaction.into_payload() {
                parent.push_following(command, node, follow);
            }
            return;
        }
        if transaction.is_empty() {
            return;
        }
        if let Some(client) = &self.render_service_client {
            let mut transaction = transaction;
            state.last_index += 1;
            transaction.set_timestamp(timestamp);
            transaction.set_sender(self.pid, state.last_index);
            client.commit_transaction(transaction);
        }
    }

    /// Commands are waiting for a flush or commit.
    pub fn has_pending(&self) -> bool {
        let state = self.lock();
        !state.local.is_empty() || !state.remote.is_empty() || state.explicit.iter().any(|t| !t.is_empty())
    }

    fn lock(&self) -> MutexGuard<'_, ProxyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
