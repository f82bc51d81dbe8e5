//! Crate-level error type.

use thiserror::Error;

use crate::pipeline::{DisplayError, VsyncError};
use crate::transaction::MarshalError;

/// Starting or running a pipeline thread failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to spawn the pipeline thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
    #[error("pipeline event loop error: {0}")]
    EventLoop(String),
    #[error("pipeline thread exited before it was ready")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Marshal(#[from] MarshalError),
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Vsync(#[from] VsyncError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub type Result<T> = std::result::Result<T, Error>;
