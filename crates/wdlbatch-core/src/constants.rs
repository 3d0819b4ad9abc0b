pub mod labels {
    pub const BATCH: &str = "cromwell-batch-label";
    pub const SAMPLE: &str = "cromwell-sample-label";
    pub const BATCH_SAMPLE: &str = "cromwell-batch-sample-label";
    pub const BATCH_STATUS: &str = "cromwell-batch-status";
    pub const UNIQUE: &str = "cromwell-unique-label";

    /// Not a label on the server; only used as a report column and as a
    /// batch-import token target.
    pub const WORKFLOW_ID: &str = "cromwell-workflow-id";

    pub const REQUIRED: [&str; 5] = [UNIQUE, BATCH_STATUS, BATCH, BATCH_SAMPLE, SAMPLE];
}

pub mod batch_status {
    pub const INCLUDE: &str = "include";
    pub const EXCLUDE: &str = "exclude";
}

pub mod metadata {
    pub const ID: &str = "id";
    pub const STATUS: &str = "status";
    pub const LABELS: &str = "labels";
    pub const SUBMISSION: &str = "submission";
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const WORKFLOW_NAME: &str = "workflowName";
    pub const INPUTS: &str = "inputs";
    pub const OUTPUTS: &str = "outputs";

    pub const SUMMARY_INCLUDE: [&str; 6] = [END, START, SUBMISSION, STATUS, LABELS, WORKFLOW_NAME];
    pub const SUMMARY_EXCLUDE: [&str; 5] = ["submittedFiles", "calls", INPUTS, "imports", OUTPUTS];
}

pub mod report {
    use super::{labels, metadata};

    pub const SUPERSEDED: &str = "SupercededWFs";
    pub const INFO: &str = "Info";
    pub const FAILED: &str = "Failed";

    pub const NOT_SUBMITTED: &str = "Not submitted";
    pub const FAILED_WORKFLOW: &str = "FAILED WORKFLOW";

    pub const SUBMIT_COLUMNS: [&str; 8] = [
        labels::WORKFLOW_ID,
        labels::UNIQUE,
        labels::SAMPLE,
        labels::BATCH,
        labels::BATCH_SAMPLE,
        labels::BATCH_STATUS,
        SUPERSEDED,
        INFO,
    ];

    pub const STATUS_COLUMNS: [&str; 11] = [
        labels::WORKFLOW_ID,
        labels::BATCH_STATUS,
        labels::SAMPLE,
        labels::UNIQUE,
        labels::BATCH,
        labels::BATCH_SAMPLE,
        metadata::STATUS,
        metadata::SUBMISSION,
        metadata::START,
        metadata::END,
        metadata::WORKFLOW_NAME,
    ];

    pub const STATUS_PROGRESS_INTERVAL: usize = 20;
}

pub mod template {
    pub const BATCH_INPUT_TOKEN: &str = "<<<IMPORT_WF_INPUT>>>";
    pub const BATCH_OUTPUT_TOKEN: &str = "<<<IMPORT_WF_OUTPUT>>>";
    pub const BATCH_LABEL_TOKEN: &str = "<<<IMPORT_WF_LABEL>>>";
}

pub mod files {
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
}

pub const UNIQUE_SUFFIX_LEN: usize = 7;
