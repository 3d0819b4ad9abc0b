//! The contract every workflow server backend implements.
//!
//! Labels are the only index the server keeps for us, so every read the
//! client does is either a label query or a per-workflow lookup.

use crate::error::{ClientError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use wdlbatch_core::constants::{labels, metadata};
use wdlbatch_core::labels::LabelSet;
use wdlbatch_core::model::{BatchStatus, JobState, WorkflowId};

/// Label filter for a workflow query. Entries are ANDed and matched as a
/// subset of each workflow's labels.
///
/// A query is always scoped by batch or by batch-sample key, so it can never
/// select every workflow on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelQuery {
    filter: BTreeMap<String, String>,
}

impl LabelQuery {
    pub fn batch(batch: &str) -> Self {
        Self::scoped(labels::BATCH, batch)
    }

    pub fn batch_sample(batch_sample: &str) -> Self {
        Self::scoped(labels::BATCH_SAMPLE, batch_sample)
    }

    fn scoped(key: &str, value: &str) -> Self {
        let mut filter = BTreeMap::new();
        filter.insert(key.to_string(), value.to_string());
        Self { filter }
    }

    pub fn with_batch_status(mut self, status: BatchStatus) -> Self {
        self.filter
            .insert(labels::BATCH_STATUS.to_string(), status.as_str().to_string());
        self
    }

    /// Only workflows that still count towards their batch.
    pub fn included(self) -> Self {
        self.with_batch_status(BatchStatus::Include)
    }

    pub fn filter(&self) -> &BTreeMap<String, String> {
        &self.filter
    }

    /// `key:value` strings as the query endpoint expects them.
    pub fn label_params(&self) -> Vec<String> {
        self.filter
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect()
    }
}

impl std::fmt::Display for LabelQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label_params().join(" AND "))
    }
}

/// Which top-level metadata keys to fetch. The server accepts either an
/// include list or an exclude list, never both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MetadataKeys {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl MetadataKeys {
    pub fn include(keys: &[&str]) -> Self {
        MetadataKeys::Include(keys.iter().map(|k| k.to_string()).collect())
    }

    /// Everything except the large per-call sections.
    pub fn summary() -> Self {
        MetadataKeys::Exclude(metadata::SUMMARY_EXCLUDE.iter().map(|k| k.to_string()).collect())
    }
}

/// WDL source and optional zipped imports shared by every workflow of a batch.
#[derive(Debug, Clone)]
pub struct WorkflowSource {
    pub workflow: PathBuf,
    pub dependencies: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowSubmission<'a> {
    pub source: &'a WorkflowSource,
    pub inputs: &'a Map<String, Value>,
    pub labels: &'a LabelSet,
}

pub trait Engine: Send + Sync {
    /// Fails with `Unhealthy` when the server answers but reports a problem.
    fn health(&self) -> Result<()>;

    /// Top-level workflows whose labels contain every entry of `query`.
    fn query(&self, query: &LabelQuery) -> Result<Vec<WorkflowId>>;

    fn status(&self, id: &WorkflowId) -> Result<JobState>;

    fn metadata(&self, id: &WorkflowId, keys: &MetadataKeys) -> Result<Map<String, Value>>;

    /// Applies every entry of `labels` in a single request.
    fn patch_labels(&self, id: &WorkflowId, labels: &LabelSet) -> Result<()>;

    fn submit(&self, submission: &WorkflowSubmission<'_>) -> Result<WorkflowId>;

    /// Succeeds without effect when the workflow has already finished.
    fn abort(&self, id: &WorkflowId) -> Result<()>;
}

/// Reads the labels currently attached to a workflow.
pub fn current_labels(engine: &dyn Engine, id: &WorkflowId) -> Result<LabelSet> {
    let meta = engine.metadata(id, &MetadataKeys::include(&[metadata::LABELS]))?;
    labels_from_metadata(id, &meta)
}

pub(crate) fn labels_from_metadata(id: &WorkflowId, meta: &Map<String, Value>) -> Result<LabelSet> {
    match meta.get(metadata::LABELS) {
        None | Some(Value::Null) => Ok(LabelSet::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()),
        Some(other) => Err(ClientError::MalformedResponse {
            request: format!("metadata of {}", id),
            reason: format!("'labels' is not an object: {}", other),
        }),
    }
}
