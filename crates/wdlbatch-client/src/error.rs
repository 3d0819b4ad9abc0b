use thiserror::Error;
use wdlbatch_core::errors::{ConfigError, DomainError, LabelError};
use wdlbatch_core::model::WorkflowId;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("Could not reach the workflow server at {url}: {message}")]
    RemoteUnavailable { url: String, message: String },

    #[error("Workflow '{0}' does not exist on the server.")]
    JobNotFound(WorkflowId),

    #[error("Server rejected the submission of '{label}' (HTTP {status}): {message}")]
    Submission {
        label: String,
        status: u16,
        message: String,
    },

    #[error("Failed to abort workflow '{id}' (HTTP {status}): {message}")]
    Abort {
        id: WorkflowId,
        status: u16,
        message: String,
    },

    #[error("Failed to update labels of workflow '{id}' (HTTP {status}): {message}")]
    PatchLabels {
        id: WorkflowId,
        status: u16,
        message: String,
    },

    #[error("Request '{request}' failed (HTTP {status}): {message}")]
    Server {
        request: String,
        status: u16,
        message: String,
    },

    #[error("Workflow server at {url} is reachable but not functional: {message}")]
    Unhealthy { url: String, message: String },

    #[error("Malformed response to '{request}': {reason}")]
    MalformedResponse { request: String, reason: String },

    #[error("Batch submission stopped at item {} ('{label}'): {source}", .index + 1)]
    BatchInterrupted {
        index: usize,
        label: String,
        source: Box<ClientError>,
    },

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ClientError {
    /// Transport-level failures, as opposed to the server answering with an error.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::RemoteUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
