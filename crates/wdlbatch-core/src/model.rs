use crate::constants::batch_status;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl WorkflowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short_id(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        WorkflowId(s)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        WorkflowId(s.to_string())
    }
}

/// Lifecycle of a job as reported by the execution engine.
///
/// `Submitted -> Running -> {Succeeded | Failed | Aborting -> Aborted}`
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum JobState {
    Submitted,
    Running,
    Aborting,
    Aborted,
    Failed,
    Succeeded,
}

impl JobState {
    pub const ALL: [JobState; 6] = [
        JobState::Submitted,
        JobState::Running,
        JobState::Aborting,
        JobState::Aborted,
        JobState::Failed,
        JobState::Succeeded,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Aborted
        )
    }

    /// True for jobs that an abort request can still act on.
    pub fn is_abortable(&self) -> bool {
        matches!(self, JobState::Submitted | JobState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "Submitted",
            JobState::Running => "Running",
            JobState::Aborting => "Aborting",
            JobState::Aborted => "Aborted",
            JobState::Failed => "Failed",
            JobState::Succeeded => "Succeeded",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJobStateError(pub String);

impl fmt::Display for ParseJobStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid job state: '{}'. Valid values are: Submitted, Running, Aborting, Aborted, Failed, Succeeded",
            self.0
        )
    }
}

impl std::error::Error for ParseJobStateError {}

impl FromStr for JobState {
    type Err = ParseJobStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseJobStateError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Include,
    Exclude,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Include => batch_status::INCLUDE,
            BatchStatus::Exclude => batch_status::EXCLUDE,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBatchStatusError(pub String);

impl fmt::Display for ParseBatchStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid batch status: '{}'. Valid values are: include, exclude",
            self.0
        )
    }
}

impl std::error::Error for ParseBatchStatusError {}

impl FromStr for BatchStatus {
    type Err = ParseBatchStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            batch_status::INCLUDE => Ok(BatchStatus::Include),
            batch_status::EXCLUDE => Ok(BatchStatus::Exclude),
            _ => Err(ParseBatchStatusError(s.to_string())),
        }
    }
}

/// How a new submission treats earlier jobs that share its batch-sample label.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Only replace jobs that ended in failure or were aborted.
    #[default]
    RerunFailed,
    /// Replace anything that has not succeeded, aborting jobs still in flight.
    RerunUnlessSuccess,
    /// Replace everything, aborting jobs still in flight.
    RerunAll,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::RerunFailed => write!(f, "rerun-failed"),
            ConflictPolicy::RerunUnlessSuccess => write!(f, "rerun-unless-success"),
            ConflictPolicy::RerunAll => write!(f, "rerun-all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConflictPolicyError(pub String);

impl fmt::Display for ParseConflictPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid conflict policy: '{}'. Valid values are: rerun-failed, rerun-unless-success, rerun-all",
            self.0
        )
    }
}

impl std::error::Error for ParseConflictPolicyError {}

impl FromStr for ConflictPolicy {
    type Err = ParseConflictPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rerun-failed" => Ok(ConflictPolicy::RerunFailed),
            "rerun-unless-success" => Ok(ConflictPolicy::RerunUnlessSuccess),
            "rerun-all" => Ok(ConflictPolicy::RerunAll),
            _ => Err(ParseConflictPolicyError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    /// One workflow per sample sheet row.
    #[default]
    Scatter,
    /// One workflow for the whole sheet, each column passed as a list.
    Gather,
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowType::Scatter => write!(f, "scatter"),
            WorkflowType::Gather => write!(f, "gather"),
        }
    }
}
