use crate::engine::{labels_from_metadata, Engine, LabelQuery, MetadataKeys};
use crate::error::Result;
use crate::report::ReportTable;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets, Attribute, Cell, Color, Table};
use serde_json::Value;
use std::collections::BTreeMap;
use wdlbatch_core::constants::{batch_status, labels as keys, metadata, report};
use wdlbatch_core::errors::DomainError;
use wdlbatch_core::labels::LabelStage;
use wdlbatch_core::model::{JobState, WorkflowId};

#[derive(Debug, Clone)]
pub struct StatusOptions {
    /// Also report workflows that were superseded or excluded by hand.
    pub include_excluded: bool,
    pub progress_interval: usize,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self {
            include_excluded: false,
            progress_interval: report::STATUS_PROGRESS_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStatusReport {
    pub batch: String,
    pub include_excluded: bool,
    /// One row per workflow, keyed by report column, sorted by sample label.
    pub rows: Vec<BTreeMap<String, String>>,
    /// Workflow count per state, split by batch status.
    pub counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl BatchStatusReport {
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    /// Only the columns some workflow actually has, in report order.
    pub fn to_table(&self) -> ReportTable {
        ReportTable::from_populated_records(&report::STATUS_COLUMNS, &self.rows)
    }

    pub fn count(&self, batch_status: &str, state: JobState) -> usize {
        self.counts
            .get(batch_status)
            .and_then(|by_state| by_state.get(state.as_str()))
            .copied()
            .unwrap_or(0)
    }

    pub fn render_counts(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Batch status").add_attribute(Attribute::Bold).fg(Color::Cyan),
                Cell::new("State").add_attribute(Attribute::Bold).fg(Color::Cyan),
                Cell::new("Workflows").add_attribute(Attribute::Bold).fg(Color::Cyan),
                Cell::new("Share").add_attribute(Attribute::Bold).fg(Color::Cyan),
            ]);
        for (flag, by_state) in &self.counts {
            let partition_total: usize = by_state.values().sum();
            for (state, n) in by_state {
                let color = match state.parse::<JobState>() {
                    Ok(JobState::Succeeded) => Color::Green,
                    Ok(JobState::Failed) => Color::Red,
                    Ok(JobState::Aborted | JobState::Aborting) => Color::Yellow,
                    _ => Color::Reset,
                };
                table.add_row(vec![
                    Cell::new(flag),
                    Cell::new(state).fg(color),
                    Cell::new(n),
                    Cell::new(format!("{:.1}%", percent(*n, partition_total))),
                ]);
            }
        }
        table
    }
}

fn percent(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 * 100.0 / total as f64
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Report row for one workflow: summary metadata plus its batch labels.
pub fn workflow_summary(engine: &dyn Engine, id: &WorkflowId) -> Result<BTreeMap<String, String>> {
    let meta = engine.metadata(id, &MetadataKeys::summary())?;

    let mut row = BTreeMap::new();
    for key in metadata::SUMMARY_INCLUDE {
        if key == metadata::LABELS {
            continue;
        }
        if let Some(text) = meta.get(key).and_then(value_text) {
            row.insert(key.to_string(), text);
        }
    }
    let labels = labels_from_metadata(id, &meta)?;
    if let Err(e) = labels.validate(LabelStage::Submitted) {
        tracing::warn!("Workflow {}: {}", id, e);
    }
    for (k, v) in labels.iter() {
        if keys::REQUIRED.contains(&k) {
            row.insert(k.to_string(), v.to_string());
        }
    }
    row.insert(keys::WORKFLOW_ID.to_string(), id.to_string());
    Ok(row)
}

/// Summarises every workflow of `batch`.
pub fn get_batch_status(
    engine: &dyn Engine,
    batch: &str,
    options: &StatusOptions,
) -> Result<BatchStatusReport> {
    let mut query = LabelQuery::batch(batch);
    if !options.include_excluded {
        query = query.included();
    }
    let ids = engine.query(&query)?;
    if ids.is_empty() {
        return Err(DomainError::BatchNotFound(batch.to_string()).into());
    }

    tracing::info!("Fetching metadata for {} workflow(s) in batch '{}'", ids.len(), batch);
    let interval = options.progress_interval.max(1);
    let mut rows = Vec::with_capacity(ids.len());
    for (n, id) in ids.iter().enumerate() {
        rows.push(workflow_summary(engine, id)?);
        if (n + 1) % interval == 0 {
            tracing::info!("Processed {}/{} workflows...", n + 1, ids.len());
        }
    }

    rows.sort_by(|a, b| a.get(keys::SAMPLE).cmp(&b.get(keys::SAMPLE)));

    let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for row in &rows {
        let flag = row
            .get(keys::BATCH_STATUS)
            .cloned()
            .unwrap_or_else(|| batch_status::INCLUDE.to_string());
        let state = row
            .get(metadata::STATUS)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        *counts.entry(flag).or_default().entry(state).or_default() += 1;
    }

    let report = BatchStatusReport {
        batch: batch.to_string(),
        include_excluded: options.include_excluded,
        rows,
        counts,
    };
    let scope = if options.include_excluded {
        "complete batch (include+exclude)"
    } else {
        "active batch"
    };
    for state in JobState::ALL {
        let n: usize = report
            .counts
            .values()
            .filter_map(|by_state| by_state.get(state.as_str()))
            .sum();
        tracing::info!(
            "{}/{} ({:.1}%) workflows {} in {}",
            n,
            report.total(),
            percent(n, report.total()),
            state,
            scope
        );
    }
    Ok(report)
}
