//! Submits a batch of workflows one at a time, resolving batch-sample
//! conflicts before each submission.
//!
//! Items are handled strictly in input order. A blocked item is recorded and
//! skipped. Any other failure stops the batch: the rows recorded so far, plus
//! the failing item, are written out before the error is returned.

use crate::engine::{Engine, WorkflowSource, WorkflowSubmission};
use crate::error::{ClientError, Result};
use crate::report::{timestamped_path, ReportTable};
use crate::resolver::{find_conflicts, retire_superseded};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use wdlbatch_core::constants::{labels as keys, report};
use wdlbatch_core::errors::DomainError;
use wdlbatch_core::labels::{LabelSet, LabelStage};
use wdlbatch_core::model::{ConflictPolicy, WorkflowId};

/// One workflow of a batch: its inputs document and its labels.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    inputs: Map<String, Value>,
    labels: LabelSet,
}

impl BatchItem {
    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn batch_sample(&self) -> &str {
        self.labels.batch_sample().unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let text = fs_err::read_to_string(path)?;
    let parsed: OneOrMany<T> = serde_json::from_str(&text)?;
    Ok(parsed.into())
}

/// Reads and validates a batch from its inputs and labels files. A single
/// object in either file is a one-item batch.
pub fn load_batch(inputs_path: &Path, labels_path: &Path) -> Result<Vec<BatchItem>> {
    let inputs: Vec<Value> = read_json(inputs_path)?;
    let labels: Vec<LabelSet> = read_json(labels_path)?;
    Ok(validate_batch(inputs, labels)?)
}

/// Checks a whole batch before anything is sent to the server and reports
/// every problem at once.
pub fn validate_batch(
    inputs: Vec<Value>,
    labels: Vec<LabelSet>,
) -> std::result::Result<Vec<BatchItem>, DomainError> {
    let mut violations = Vec::new();

    if inputs.len() != labels.len() {
        violations.push(
            DomainError::LengthMismatch {
                inputs: inputs.len(),
                labels: labels.len(),
            }
            .to_string(),
        );
    }
    if inputs.is_empty() {
        violations.push("batch contains no workflows".to_string());
    }

    for (i, doc) in inputs.iter().enumerate() {
        if !doc.is_object() {
            violations.push(format!("inputs for item {} are not a JSON object", i + 1));
        }
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut batches: Vec<&str> = Vec::new();
    for (i, label_set) in labels.iter().enumerate() {
        if let Err(e) = label_set.validate(LabelStage::PreSubmission) {
            violations.push(format!("item {}: {}", i + 1, e));
        }
        if let Some(key) = label_set.batch_sample() {
            if let Some(first) = seen.insert(key, i) {
                violations.push(format!(
                    "items {} and {} share batch-sample label '{}'",
                    first + 1,
                    i + 1,
                    key
                ));
            }
        }
        if let Some(batch) = label_set.batch() {
            if !batches.contains(&batch) {
                batches.push(batch);
            }
        }
    }
    if batches.len() > 1 {
        violations.push(format!(
            "workflows belong to more than one batch: {}",
            batches.join(", ")
        ));
    }

    DomainError::check("Batch", violations)?;

    Ok(inputs
        .into_iter()
        .zip(labels)
        .filter_map(|(doc, labels)| match doc {
            Value::Object(inputs) => Some(BatchItem { inputs, labels }),
            _ => None,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Submitted(WorkflowId),
    Blocked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub labels: LabelSet,
    pub outcome: SubmissionOutcome,
    pub superseded: Vec<WorkflowId>,
    pub info: String,
}

impl SubmissionRecord {
    fn row(&self) -> BTreeMap<String, String> {
        let mut row: BTreeMap<String, String> = self
            .labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let id = match &self.outcome {
            SubmissionOutcome::Submitted(id) => id.to_string(),
            SubmissionOutcome::Blocked => report::NOT_SUBMITTED.to_string(),
            SubmissionOutcome::Failed => String::new(),
        };
        row.insert(keys::WORKFLOW_ID.to_string(), id);
        row.insert(
            report::SUPERSEDED.to_string(),
            self.superseded
                .iter()
                .map(WorkflowId::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        );
        row.insert(report::INFO.to_string(), self.info.clone());
        if self.outcome == SubmissionOutcome::Failed {
            row.insert(report::FAILED.to_string(), report::FAILED_WORKFLOW.to_string());
        }
        row
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub batch: String,
    pub total: usize,
    pub records: Vec<SubmissionRecord>,
    pub failed_index: Option<usize>,
}

impl SubmitReport {
    pub fn submitted(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, SubmissionOutcome::Submitted(_)))
            .count()
    }

    pub fn blocked(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == SubmissionOutcome::Blocked)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Submitted {}/{} workflows in batch '{}'",
            self.submitted(),
            self.total,
            self.batch
        )
    }

    /// Report rows in submission order. The `Failed` column only appears
    /// when the batch was interrupted.
    pub fn to_table(&self) -> ReportTable {
        let rows: Vec<BTreeMap<String, String>> = self.records.iter().map(|r| r.row()).collect();
        let mut columns: Vec<&str> = report::SUBMIT_COLUMNS.to_vec();
        if self.failed_index.is_some() {
            columns.push(report::FAILED);
        }
        ReportTable::from_records(&columns, &rows)
    }
}

/// Destination for the submission report. Written once at the end of a
/// batch, or once when a batch is interrupted.
pub trait ReportSink {
    fn write(&mut self, report: &SubmitReport) -> Result<()>;
}

/// Writes `{prefix}.submit_batch.{timestamp}.csv`.
pub struct CsvReportSink {
    prefix: PathBuf,
    written: Option<PathBuf>,
}

impl CsvReportSink {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            written: None,
        }
    }

    pub fn written(&self) -> Option<&Path> {
        self.written.as_deref()
    }
}

impl ReportSink for CsvReportSink {
    fn write(&mut self, report: &SubmitReport) -> Result<()> {
        let path = timestamped_path(&self.prefix, "submit_batch", "csv");
        report.to_table().write_csv(&path)?;
        self.written = Some(path);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        batch: String,
        total: usize,
    },
    CheckingConflicts {
        index: usize,
        batch_sample: String,
    },
    Superseding {
        index: usize,
        ids: Vec<WorkflowId>,
    },
    Submitted {
        index: usize,
        id: WorkflowId,
    },
    Blocked {
        index: usize,
        reason: String,
    },
    Failed {
        index: usize,
        error: String,
    },
    Finished {
        submitted: usize,
        total: usize,
    },
}

#[derive(Default)]
pub struct SubmitOptions {
    pub policy: ConflictPolicy,
    pub event_sender: Option<Sender<BatchEvent>>,
}

impl SubmitOptions {
    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }
}

fn submit_one(
    engine: &dyn Engine,
    source: &WorkflowSource,
    item: &BatchItem,
    index: usize,
    options: &SubmitOptions,
) -> Result<SubmissionRecord> {
    let resolution = find_conflicts(engine, item.batch_sample(), options.policy)?;
    if !resolution.is_permitted() {
        let reason = resolution.block_reason();
        tracing::warn!("{}", reason);
        options.emit(BatchEvent::Blocked {
            index,
            reason: reason.clone(),
        });
        return Ok(SubmissionRecord {
            labels: item.labels.clone(),
            outcome: SubmissionOutcome::Blocked,
            superseded: Vec::new(),
            info: reason,
        });
    }

    let mut info = String::new();
    if resolution.has_conflicts() {
        options.emit(BatchEvent::Superseding {
            index,
            ids: resolution.superseded_ids(),
        });
        let retirement = retire_superseded(engine, &resolution)?;
        info = format!(
            "Superseded {} workflow(s) under policy '{}'",
            resolution.prior.len(),
            options.policy
        );
        if !retirement.aborted.is_empty() {
            info.push_str(&format!(", aborted {}", retirement.aborted.len()));
        }
    }

    let id = engine.submit(&WorkflowSubmission {
        source,
        inputs: &item.inputs,
        labels: &item.labels,
    })?;
    tracing::info!("Submitted '{}' as workflow {}", item.labels.display_name(), id);
    options.emit(BatchEvent::Submitted {
        index,
        id: id.clone(),
    });

    Ok(SubmissionRecord {
        labels: item.labels.clone(),
        outcome: SubmissionOutcome::Submitted(id),
        superseded: resolution.superseded_ids(),
        info,
    })
}

/// Submits every item of a validated batch and writes the report through
/// `sink`.
///
/// On an unexpected failure the partial report is written first and the
/// failure is returned as `BatchInterrupted`. Items after the failing one are
/// not attempted and do not appear in the report.
pub fn submit_batch(
    engine: &dyn Engine,
    source: &WorkflowSource,
    items: &[BatchItem],
    options: &SubmitOptions,
    sink: &mut dyn ReportSink,
) -> Result<SubmitReport> {
    let batch = items
        .first()
        .and_then(|item| item.labels.batch())
        .unwrap_or_default()
        .to_string();
    let mut report = SubmitReport {
        batch: batch.clone(),
        total: items.len(),
        records: Vec::with_capacity(items.len()),
        failed_index: None,
    };
    options.emit(BatchEvent::Started {
        batch,
        total: items.len(),
    });

    for (index, item) in items.iter().enumerate() {
        options.emit(BatchEvent::CheckingConflicts {
            index,
            batch_sample: item.batch_sample().to_string(),
        });
        match submit_one(engine, source, item, index, options) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                tracing::error!(
                    "Submission of '{}' failed: {}",
                    item.labels.display_name(),
                    e
                );
                options.emit(BatchEvent::Failed {
                    index,
                    error: e.to_string(),
                });
                report.records.push(SubmissionRecord {
                    labels: item.labels.clone(),
                    outcome: SubmissionOutcome::Failed,
                    superseded: Vec::new(),
                    info: e.to_string(),
                });
                report.failed_index = Some(index);
                tracing::info!("{}", report.summary());
                if let Err(write_err) = sink.write(&report) {
                    tracing::error!("Failed to write partial submission report: {}", write_err);
                }
                return Err(ClientError::BatchInterrupted {
                    index,
                    label: item.labels.display_name().to_string(),
                    source: Box::new(e),
                });
            }
        }
    }

    tracing::info!("{}", report.summary());
    options.emit(BatchEvent::Finished {
        submitted: report.submitted(),
        total: report.total,
    });
    sink.write(&report)?;
    Ok(report)
}
