use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to read or write delimited table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    General(String),

    #[error("Could not determine the {0} directory.")]
    HomeDirectoryNotFound(&'static str),

    #[error("Configuration file '{path}' is invalid: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("Label set for '{context}' is missing required label(s): {}", .missing.join(", "))]
    Missing {
        context: String,
        missing: Vec<String>,
    },

    #[error("Invalid {kind} '{value}': labels may only contain alphanumeric characters, hyphens (-) and underscores (_), and must start with an alphanumeric character.")]
    InvalidValue { kind: String, value: String },

    #[error("Label '{label}' has batch status '{value}'. Expected 'include' or 'exclude'.")]
    InvalidBatchStatus { label: String, value: String },

    #[error("Label set for '{context}' is invalid:\n  - {}", .problems.join("\n  - "))]
    Multiple {
        context: String,
        problems: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("{subject} failed validation with {} error(s):\n  - {}", .violations.len(), .violations.join("\n  - "))]
    Validation {
        subject: String,
        violations: Vec<String>,
    },

    #[error("No batch exists on the server with batch name '{0}'.")]
    BatchNotFound(String),

    #[error("Batch name '{0}' is already in use on the server. Pick another name for this batch.")]
    BatchNameInUse(String),

    #[error("Unknown conflict policy '{0}'. Valid values are: rerun-failed, rerun-unless-success, rerun-all")]
    UnknownConflictPolicy(String),

    #[error("Batch inputs and labels have different sizes ({inputs} inputs, {labels} label sets).")]
    LengthMismatch { inputs: usize, labels: usize },
}

impl DomainError {
    pub fn validation(subject: impl Into<String>, violations: Vec<String>) -> Self {
        DomainError::Validation {
            subject: subject.into(),
            violations,
        }
    }

    /// Converts a list of violations into `Ok(())` when empty.
    pub fn check(subject: impl Into<String>, violations: Vec<String>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self::validation(subject, violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_violation() {
        let err = DomainError::validation(
            "Sample sheet",
            vec!["first problem".to_string(), "second problem".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Sample sheet failed validation with 2 error(s)"));
        assert!(msg.contains("  - first problem"));
        assert!(msg.contains("  - second problem"));
    }

    #[test]
    fn test_check_empty_is_ok() {
        assert!(DomainError::check("anything", vec![]).is_ok());
        assert!(DomainError::check("anything", vec!["x".to_string()]).is_err());
    }

    #[test]
    fn test_missing_labels_message_names_all() {
        let err = LabelError::Missing {
            context: "S1".to_string(),
            missing: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Label set for 'S1' is missing required label(s): a, b"
        );
    }
}
