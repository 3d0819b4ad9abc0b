pub mod abort;
pub mod cromwell;
pub mod engine;
pub mod error;
pub mod report;
pub mod resolver;
pub mod status;
pub mod submission;

pub use abort::{abort_batch, AbortSummary};
pub use cromwell::CromwellEngine;
pub use engine::{Engine, LabelQuery, MetadataKeys, WorkflowSource, WorkflowSubmission};
pub use error::{ClientError, Result};
pub use status::{get_batch_status, BatchStatusReport, StatusOptions};
pub use submission::{
    load_batch, submit_batch, validate_batch, BatchEvent, BatchItem, CsvReportSink, ReportSink,
    SubmitOptions, SubmitReport,
};
