//! Render clients: where a flushed transaction is sent.

use std::sync::Arc;

use super::data::TransactionData;
use super::parcel::Parcel;
use crate::pipeline::PipelineHandle;

/// Destination of flushed transactions. Committing never blocks on the
/// receiving pipeline.
pub trait RenderClient: Send + Sync {
    fn commit_transaction(&self, transaction: TransactionData);
}

/// In-process client: hands transactions straight to a local pipeline's queue.
#[derive(Clone)]
pub struct RenderThreadClient {
    pipeline: PipelineHandle,
}

impl RenderThreadClient {
    pub fn new(pipeline: PipelineHandle) -> Self {
        Self { pipeline }
    }
}

impl RenderClient for RenderThreadClient {
    fn commit_transaction(&self, transaction: TransactionData) {
        self.pipeline.submit_transaction(transaction);
    }
}

/// Byte transport towards a render service.
pub trait TransactionSink: Send + Sync {
    fn send(&self, bytes: Vec<u8>);
}

/// Cross-process client: marshals each transaction and ships the bytes.
#[derive(Clone)]
pub struct RenderServiceClient {
    sink: Arc<dyn TransactionSink>,
}

impl RenderServiceClient {
    pub fn new(sink: Arc<dyn TransactionSink>) -> Self {
        Self { sink }
    }
}

impl RenderClient for RenderServiceClient {
    fn commit_transaction(&self, transaction: TransactionData) {
        let mut parcel = Parcel::new();
        if let Err(err) = transaction.marshal(&mut parcel) {
            log::error!(
                "failed to marshal transaction of {} commands from pid {}: {err}",
                transaction.len(),
                transaction.sender_pid()
            );
            return;
        }
        self.sink.send(parcel.into_bytes());
    }
}
