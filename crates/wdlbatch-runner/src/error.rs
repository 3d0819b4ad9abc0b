use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] wdlbatch_core::errors::ConfigError),

    #[error(transparent)]
    Domain(#[from] wdlbatch_core::errors::DomainError),

    #[error(transparent)]
    Label(#[from] wdlbatch_core::errors::LabelError),

    #[error(transparent)]
    Client(#[from] wdlbatch_client::error::ClientError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Batch submission failed: {source}\nPartial report: {}", .report.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "not written".to_string()))]
    SubmissionFailed {
        #[source]
        source: wdlbatch_client::error::ClientError,
        report: Option<std::path::PathBuf>,
    },

    #[error("Submission worker stopped unexpectedly")]
    WorkerPanicked,
}
