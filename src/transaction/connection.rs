//! Service-side endpoint that client transactions arrive at.

use std::sync::Arc;

use super::client::TransactionSink;
use super::data::TransactionData;
use super::parcel::Parcel;
use crate::command::CommandRegistry;
use crate::pipeline::{ApplicationAgent, PipelineHandle};

/// Decodes incoming transaction bytes and queues them on a pipeline.
pub struct RenderServiceConnection {
    registry: Arc<CommandRegistry>,
    pipeline: PipelineHandle,
}

impl RenderServiceConnection {
    pub fn new(registry: Arc<CommandRegistry>, pipeline: PipelineHandle) -> Self {
        Self { registry, pipeline }
    }

    /// Decode and queue one transaction.
    ///
    /// A transaction whose header cannot be decoded is dropped and logged;
    /// one that decodes partially is queued with the commands that did.
    /// Both count as decode failures.
    pub fn commit_transaction(&self, bytes: Vec<u8>) {
        let mut parcel = Parcel::from_bytes(bytes);
        match TransactionData::unmarshal(&mut parcel, &self.registry) {
            Ok(transaction) => {
                if transaction.is_truncated() {
                    self.pipeline.record_decode_failure();
                }
                self.pipeline.submit_transaction(transaction);
            }
            Err(err) => {
                self.pipeline.record_decode_failure();
                log::error!("dropping undecodable transaction ({} bytes): {err}", parcel.len());
            }
        }
    }

    /// Route pipeline messages for `pid` to `agent`.
    pub fn register_application_agent(&self, pid: u32, agent: Arc<dyn ApplicationAgent>) {
        self.pipeline.register_application_agent(pid, agent);
    }

    pub fn unregister_application_agent(&self, pid: u32) {
        self.pipeline.unregister_application_agent(pid);
    }
}

impl TransactionSink for RenderServiceConnection {
    fn send(&self, bytes: Vec<u8>) {
        self.commit_transaction(bytes);
    }
}
