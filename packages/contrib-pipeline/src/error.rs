use crate::config::ConfigError;
use crate::state::StageId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("A pipeline job already started")]
    AlreadyRunning,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Stage(#[from] StageFailure),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// A failure raised at a stage boundary, tagged with the stage it came from.
///
/// The stage tag is what the retry handler uses to pick the resume point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Stage {stage} failed: {cause}")]
pub struct StageFailure {
    pub stage: StageId,
    pub cause: String,
}

impl StageFailure {
    pub fn new<E: std::fmt::Display>(stage: StageId, cause: E) -> Self {
        Self {
            stage,
            cause: cause.to_string(),
        }
    }
}

/// Errors raised by the remote API fetchers
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Upstream(String),
}

impl FetchError {
    pub fn upstream<E: std::fmt::Display>(e: E) -> Self {
        Self::Upstream(e.to_string())
    }
}
