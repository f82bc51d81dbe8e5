//! Strata is a cross-process scene-graph compositor.
//!
//! Client processes build a tree of lightweight [`ProxyNode`](client::ProxyNode)s.
//! Every mutation is recorded as a [`Command`](command::Command), batched
//! into transactions and delivered to a render pipeline, either in-process or
//! in a separate render service. The pipeline replays the commands against
//! its authoritative tree of render nodes once per vsync, advances
//! animations and composes the result through a hardware display interface.
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata::prelude::*;
//!
//! let vsync = Arc::new(SoftwareVsync::new(DEFAULT_REFRESH_PERIOD_NS)?);
//! let pipeline = PipelineThread::spawn(Pipeline::new(PipelineConfig::default(), vsync))?;
//! let client = Arc::new(RenderThreadClient::new(pipeline.handle()));
//! let ui = UiContext::new(std::process::id(), false, Some(client), None);
//!
//! let node = ui.create_canvas_node(false);
//! node.set_bounds(0.0, 0.0, 200.0, 100.0);
//! ui.flush(monotonic_now_ns());
//! ```

// Lets `#[derive(Command)]` name this crate as `::strata` from inside it.
extern crate self as strata;

pub mod client;
pub mod command;
pub mod common;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stats;
pub mod transaction;

pub use error::{Error, PipelineError, Result};

pub mod prelude {
    pub use crate::client::{ProxyNode, RenderMode, UiContext, UiDirector};
    pub use crate::command::{Command, CommandRegistry};
    pub use crate::common::{Color, NodeId, NodeType, Vector2f, Vector4f};
    pub use crate::config::{PipelineConfig, DEFAULT_REFRESH_PERIOD_NS};
    pub use crate::pipeline::{
        monotonic_now_ns, ComposerAdapter, DrawCmdList, DrawOp, DrawSlot, HdiDevice, Pipeline,
        PipelineHandle, PipelineThread, PropertyUpdate, RenderAnimation, SoftwareVsync, VsyncSource,
    };
    pub use crate::transaction::{
        RenderClient, RenderServiceClient, RenderServiceConnection, RenderThreadClient, TransactionSink,
    };
}

/// Install the `env_logger` backend for the `log` facade, configured from
/// `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
