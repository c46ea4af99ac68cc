//! Error types for each layer of the conversion pipeline.

use crate::job::JobState;
use std::path::PathBuf;
use thiserror::Error;

/// Structural rejection of submitted markup. Never creates a job.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content is empty")]
    Empty,

    #[error("content is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("content is not valid UTF-8 text: {0}")]
    NotText(String),

    #[error("content has no ^XA label start marker")]
    MissingStartMarker,

    #[error("content has no ^XZ label end marker after ^XA")]
    MissingEndMarker,
}

/// Errors raised by the job store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },
}

/// Errors raised while parsing or rendering ZPL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unsupported instruction {command} in label {block}")]
    UnsupportedInstruction { command: String, block: usize },

    #[error("failed to build page {page}: {reason}")]
    Svg { page: usize, reason: String },

    #[error("failed to render preview: {0}")]
    Preview(String),
}

/// Errors raised by artifact stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact not found for job {0}")]
    NotFound(String),

    #[error("artifact I/O failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("job {job_id} already processed (state: {state})")]
    AlreadyProcessed { job_id: String, state: JobState },

    #[error("job store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ConversionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ConversionError::NotFound(format!("job {}", id)),
            other => ConversionError::Store(other),
        }
    }
}
