use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use wdlbatch_client::engine::{Engine, LabelQuery, MetadataKeys, WorkflowSubmission};
use wdlbatch_client::error::{ClientError, Result};
use wdlbatch_client::submission::{ReportSink, SubmitReport};
use wdlbatch_core::labels::LabelSet;
use wdlbatch_core::model::{JobState, WorkflowId};

/// One call made against a [`FakeEngine`], in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Health,
    Query(BTreeMap<String, String>),
    Status(WorkflowId),
    Metadata(WorkflowId),
    PatchLabels(WorkflowId, LabelSet),
    Submit(LabelSet),
    Abort(WorkflowId),
}

#[derive(Debug, Clone)]
pub struct FakeWorkflow {
    pub labels: LabelSet,
    pub state: JobState,
    pub inputs: Map<String, Value>,
    pub extra: Map<String, Value>,
    pub parent: Option<WorkflowId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The nth submit call (0-based) cannot reach the server.
    Unreachable,
    /// The nth submit call is rejected by the server.
    Rejected,
}

#[derive(Default)]
struct State {
    workflows: BTreeMap<WorkflowId, FakeWorkflow>,
    order: Vec<WorkflowId>,
    calls: Vec<Call>,
    submits: usize,
    submit_faults: BTreeMap<usize, Fault>,
    unabortable: Vec<WorkflowId>,
    next_id: usize,
}

/// In-memory workflow server. Queries only see top-level workflows, like the
/// real server with sub-workflows filtered out.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<State>,
    /// State assigned to newly submitted workflows.
    pub initial_state: Option<JobState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_workflow(&self, id: &str, labels: LabelSet, state: JobState) -> WorkflowId {
        self.add(id, labels, state, None)
    }

    pub fn add_subworkflow(&self, id: &str, labels: LabelSet, state: JobState, parent: &str) -> WorkflowId {
        self.add(id, labels, state, Some(WorkflowId::from(parent)))
    }

    fn add(&self, id: &str, labels: LabelSet, state: JobState, parent: Option<WorkflowId>) -> WorkflowId {
        let id = WorkflowId::from(id);
        let mut s = self.lock();
        s.order.push(id.clone());
        s.workflows.insert(
            id.clone(),
            FakeWorkflow {
                labels,
                state,
                inputs: Map::new(),
                extra: Map::new(),
                parent,
            },
        );
        id
    }

    /// Extra top-level metadata, such as `outputs` or `end`.
    pub fn set_metadata(&self, id: &WorkflowId, key: &str, value: Value) {
        if let Some(wf) = self.lock().workflows.get_mut(id) {
            wf.extra.insert(key.to_string(), value);
        }
    }

    pub fn set_inputs(&self, id: &WorkflowId, inputs: Value) {
        if let (Some(wf), Value::Object(map)) = (self.lock().workflows.get_mut(id), inputs) {
            wf.inputs = map;
        }
    }

    pub fn set_state(&self, id: &WorkflowId, state: JobState) {
        if let Some(wf) = self.lock().workflows.get_mut(id) {
            wf.state = state;
        }
    }

    pub fn fail_submit(&self, nth: usize, fault: Fault) {
        self.lock().submit_faults.insert(nth, fault);
    }

    /// Abort requests for `id` are refused while it keeps running.
    pub fn refuse_abort(&self, id: &WorkflowId) {
        self.lock().unabortable.push(id.clone());
    }

    pub fn workflow(&self, id: &WorkflowId) -> Option<FakeWorkflow> {
        self.lock().workflows.get(id).cloned()
    }

    pub fn workflow_ids(&self) -> Vec<WorkflowId> {
        self.lock().order.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn submitted(&self) -> Vec<LabelSet> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit(labels) => Some(labels),
                _ => None,
            })
            .collect()
    }

    pub fn aborted(&self) -> Vec<WorkflowId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Abort(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn patched(&self) -> Vec<(WorkflowId, LabelSet)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PatchLabels(id, labels) => Some((id, labels)),
                _ => None,
            })
            .collect()
    }
}

fn unreachable_error() -> ClientError {
    ClientError::RemoteUnavailable {
        url: "http://fake-server".to_string(),
        message: "connection refused".to_string(),
    }
}

impl Engine for FakeEngine {
    fn health(&self) -> Result<()> {
        self.lock().calls.push(Call::Health);
        Ok(())
    }

    fn query(&self, query: &LabelQuery) -> Result<Vec<WorkflowId>> {
        let mut s = self.lock();
        s.calls.push(Call::Query(query.filter().clone()));
        Ok(s.order
            .iter()
            .filter(|id| {
                s.workflows
                    .get(*id)
                    .is_some_and(|wf| wf.parent.is_none() && wf.labels.matches(query.filter()))
            })
            .cloned()
            .collect())
    }

    fn status(&self, id: &WorkflowId) -> Result<JobState> {
        let mut s = self.lock();
        s.calls.push(Call::Status(id.clone()));
        s.workflows
            .get(id)
            .map(|wf| wf.state)
            .ok_or_else(|| ClientError::JobNotFound(id.clone()))
    }

    fn metadata(&self, id: &WorkflowId, keys: &MetadataKeys) -> Result<Map<String, Value>> {
        let mut s = self.lock();
        s.calls.push(Call::Metadata(id.clone()));
        let wf = s
            .workflows
            .get(id)
            .ok_or_else(|| ClientError::JobNotFound(id.clone()))?;
        let mut meta = Map::new();
        meta.insert("id".to_string(), json!(id.as_str()));
        meta.insert("status".to_string(), json!(wf.state.as_str()));
        meta.insert("labels".to_string(), json!(wf.labels));
        meta.insert("inputs".to_string(), Value::Object(wf.inputs.clone()));
        meta.insert("calls".to_string(), json!({}));
        for (k, v) in &wf.extra {
            meta.insert(k.clone(), v.clone());
        }
        match keys {
            MetadataKeys::All => {}
            MetadataKeys::Include(keep) => meta.retain(|k, _| k == "id" || keep.contains(k)),
            MetadataKeys::Exclude(drop) => meta.retain(|k, _| !drop.contains(k)),
        }
        Ok(meta)
    }

    fn patch_labels(&self, id: &WorkflowId, labels: &LabelSet) -> Result<()> {
        let mut s = self.lock();
        s.calls.push(Call::PatchLabels(id.clone(), labels.clone()));
        let wf = s
            .workflows
            .get_mut(id)
            .ok_or_else(|| ClientError::JobNotFound(id.clone()))?;
        for (k, v) in labels.iter() {
            wf.labels.insert(k, v);
        }
        Ok(())
    }

    fn submit(&self, submission: &WorkflowSubmission<'_>) -> Result<WorkflowId> {
        let mut s = self.lock();
        s.calls.push(Call::Submit(submission.labels.clone()));
        let nth = s.submits;
        s.submits += 1;
        match s.submit_faults.get(&nth) {
            Some(Fault::Unreachable) => return Err(unreachable_error()),
            Some(Fault::Rejected) => {
                return Err(ClientError::Submission {
                    label: submission.labels.display_name().to_string(),
                    status: 400,
                    message: "invalid workflow inputs".to_string(),
                })
            }
            None => {}
        }
        s.next_id += 1;
        let id = WorkflowId::from(format!("fake-{:04}", s.next_id));
        s.order.push(id.clone());
        s.workflows.insert(
            id.clone(),
            FakeWorkflow {
                labels: submission.labels.clone(),
                state: self.initial_state.unwrap_or(JobState::Submitted),
                inputs: submission.inputs.clone(),
                extra: Map::new(),
                parent: None,
            },
        );
        Ok(id)
    }

    fn abort(&self, id: &WorkflowId) -> Result<()> {
        let mut s = self.lock();
        s.calls.push(Call::Abort(id.clone()));
        let refused = s.unabortable.contains(id);
        let wf = s
            .workflows
            .get_mut(id)
            .ok_or_else(|| ClientError::JobNotFound(id.clone()))?;
        if wf.state.is_terminal() {
            return Ok(());
        }
        if refused {
            return Err(ClientError::Abort {
                id: id.clone(),
                status: 500,
                message: "abort refused".to_string(),
            });
        }
        wf.state = JobState::Aborted;
        Ok(())
    }
}

/// Keeps every report handed to it.
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Vec<SubmitReport>,
}

impl ReportSink for RecordingSink {
    fn write(&mut self, report: &SubmitReport) -> wdlbatch_client::error::Result<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}

/// Full pre-submission label set for `sample` of `batch`.
pub fn sample_labels(batch: &str, sample: &str) -> LabelSet {
    LabelSet::for_sample("wf", batch, sample).expect("valid test labels")
}

/// Submitted label set with an explicit batch status.
pub fn labels_with_status(batch: &str, sample: &str, status: &str) -> LabelSet {
    let mut labels = sample_labels(batch, sample);
    labels.insert(wdlbatch_core::constants::labels::BATCH_STATUS, status);
    labels
}

pub struct TestContext {
    pub _temp_dir: tempfile::TempDir,
    pub root: PathBuf,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("wdlbatch-test-")
            .tempdir()
            .expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    pub fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let text = serde_json::to_string_pretty(value).expect("Failed to serialise JSON");
        self.write(name, &text)
    }

    /// A batch config for workflow `wf` with a `sample` id column, one list
    /// column and one optional column.
    pub fn write_batch_config(&self) -> PathBuf {
        self.write(
            "batch.toml",
            r#"
sample_id_col = "wf.sample"
wf_type = "scatter"
input_template = '''
{
  "wf.sample": "",
  "wf.reads": [],
  "wf.threads": 4
}
'''
"#,
        )
    }

    pub fn write_sample_sheet(&self, name: &str, rows: &[(&str, &str)]) -> PathBuf {
        let mut text = String::from("wf.sample,wf.reads\n");
        for (sample, reads) in rows {
            text.push_str(&format!("{},\"{}\"\n", sample, reads));
        }
        self.write(name, &text)
    }

    pub fn files_matching(&self, dir: &Path, needle: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.contains(needle))
                    })
                    .collect()
            })
            .unwrap_or_default();
        found.sort();
        found
    }
}
