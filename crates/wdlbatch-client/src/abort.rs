use crate::engine::{Engine, LabelQuery};
use crate::error::Result;
use wdlbatch_core::errors::DomainError;
use wdlbatch_core::model::WorkflowId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbortSummary {
    pub total: usize,
    pub attempted: usize,
    pub aborted: Vec<WorkflowId>,
    pub failed: Vec<(WorkflowId, String)>,
}

impl AbortSummary {
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.aborted.len() as f64 * 100.0 / self.attempted as f64
        }
    }
}

/// Aborts every workflow of `batch` that is still queued or running,
/// included or not. A workflow that refuses to abort is reported and skipped.
pub fn abort_batch(engine: &dyn Engine, batch: &str) -> Result<AbortSummary> {
    let ids = engine.query(&LabelQuery::batch(batch))?;
    if ids.is_empty() {
        return Err(DomainError::BatchNotFound(batch.to_string()).into());
    }

    let mut summary = AbortSummary {
        total: ids.len(),
        ..Default::default()
    };
    for id in ids {
        let state = engine.status(&id)?;
        if !state.is_abortable() {
            tracing::debug!("Skipping workflow {} ({})", id, state);
            continue;
        }
        summary.attempted += 1;
        tracing::info!("Aborting workflow {}", id);
        match engine.abort(&id) {
            Ok(()) => summary.aborted.push(id),
            Err(e) => {
                tracing::warn!("Unable to abort workflow {}: {}", id, e);
                summary.failed.push((id, e.to_string()));
            }
        }
    }

    tracing::info!(
        "{}/{} ({:.1}%) pending workflows in batch '{}' aborted",
        summary.aborted.len(),
        summary.attempted,
        summary.success_rate(),
        batch
    );
    Ok(summary)
}
