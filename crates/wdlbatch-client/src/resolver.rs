//! Decides whether a new workflow may replace earlier workflows that share its
//! batch-sample key, and retires the ones it replaces.

use crate::engine::{current_labels, Engine, LabelQuery};
use crate::error::Result;
use wdlbatch_core::labels::LabelSet;
use wdlbatch_core::model::{BatchStatus, ConflictPolicy, JobState, WorkflowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictDecision {
    pub can_overwrite: bool,
    pub must_abort: bool,
}

impl ConflictDecision {
    const BLOCK: Self = Self {
        can_overwrite: false,
        must_abort: false,
    };
    const OVERWRITE: Self = Self {
        can_overwrite: true,
        must_abort: false,
    };
    const OVERWRITE_AND_ABORT: Self = Self {
        can_overwrite: true,
        must_abort: true,
    };
}

pub fn decide(policy: ConflictPolicy, state: JobState) -> ConflictDecision {
    use JobState::*;
    match (policy, state) {
        (ConflictPolicy::RerunFailed, Failed | Aborted) => ConflictDecision::OVERWRITE,
        (ConflictPolicy::RerunFailed, _) => ConflictDecision::BLOCK,

        (ConflictPolicy::RerunUnlessSuccess, Succeeded) => ConflictDecision::BLOCK,
        (ConflictPolicy::RerunUnlessSuccess, Failed | Aborted) => ConflictDecision::OVERWRITE,
        (ConflictPolicy::RerunUnlessSuccess, Submitted | Running | Aborting) => {
            ConflictDecision::OVERWRITE_AND_ABORT
        }

        (ConflictPolicy::RerunAll, Succeeded | Failed | Aborted) => ConflictDecision::OVERWRITE,
        (ConflictPolicy::RerunAll, Submitted | Running | Aborting) => {
            ConflictDecision::OVERWRITE_AND_ABORT
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorWorkflow {
    pub id: WorkflowId,
    pub state: JobState,
    pub decision: ConflictDecision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictResolution {
    pub batch_sample: String,
    pub policy: ConflictPolicy,
    pub prior: Vec<PriorWorkflow>,
}

impl ConflictResolution {
    pub fn has_conflicts(&self) -> bool {
        !self.prior.is_empty()
    }

    /// A submission goes ahead only if every earlier workflow can be replaced.
    pub fn is_permitted(&self) -> bool {
        self.prior.iter().all(|p| p.decision.can_overwrite)
    }

    pub fn blockers(&self) -> impl Iterator<Item = &PriorWorkflow> {
        self.prior.iter().filter(|p| !p.decision.can_overwrite)
    }

    pub fn superseded_ids(&self) -> Vec<WorkflowId> {
        self.prior.iter().map(|p| p.id.clone()).collect()
    }

    pub fn block_reason(&self) -> String {
        let blockers: Vec<String> = self
            .blockers()
            .map(|p| format!("{} ({})", p.id, p.state))
            .collect();
        format!(
            "Not submitted under policy '{}': active workflow(s) for '{}' cannot be replaced: {}",
            self.policy,
            self.batch_sample,
            blockers.join(", ")
        )
    }
}

/// Looks up active workflows sharing `batch_sample` and decides, from each
/// one's current state, whether the new submission may replace it.
pub fn find_conflicts(
    engine: &dyn Engine,
    batch_sample: &str,
    policy: ConflictPolicy,
) -> Result<ConflictResolution> {
    let ids = engine.query(&LabelQuery::batch_sample(batch_sample).included())?;
    let mut prior = Vec::with_capacity(ids.len());
    for id in ids {
        let state = engine.status(&id)?;
        let decision = decide(policy, state);
        tracing::debug!(
            "Existing workflow {} for '{}' is {}: {:?}",
            id,
            batch_sample,
            state,
            decision
        );
        prior.push(PriorWorkflow {
            id,
            state,
            decision,
        });
    }
    if !prior.is_empty() {
        tracing::warn!(
            "Batch-sample '{}' already has {} active workflow(s) in the batch",
            batch_sample,
            prior.len()
        );
    }
    Ok(ConflictResolution {
        batch_sample: batch_sample.to_string(),
        policy,
        prior,
    })
}

/// Patches `id` to `exclude` only if it still reads `include`.
///
/// Returns `false` when the workflow had already been retired.
pub fn exclude_if_included(engine: &dyn Engine, id: &WorkflowId) -> Result<bool> {
    let labels = current_labels(engine, id)?;
    if labels.batch_status() == Some(BatchStatus::Exclude) {
        tracing::debug!("Workflow {} was already excluded from its batch", id);
        return Ok(false);
    }
    engine.patch_labels(id, &LabelSet::batch_status_patch(BatchStatus::Exclude))?;
    Ok(true)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retirement {
    pub excluded: Vec<WorkflowId>,
    pub already_excluded: Vec<WorkflowId>,
    pub aborted: Vec<WorkflowId>,
}

/// Excludes every workflow the resolution replaces and aborts the ones it
/// says must stop. Call only for a permitted resolution, before submitting.
/// Nothing here is undone if the later submission fails.
pub fn retire_superseded(engine: &dyn Engine, resolution: &ConflictResolution) -> Result<Retirement> {
    let mut retirement = Retirement::default();
    for prior in &resolution.prior {
        if exclude_if_included(engine, &prior.id)? {
            tracing::warn!(
                "Excluding workflow {} from batch; superseded by a new '{}' submission",
                prior.id,
                resolution.batch_sample
            );
            retirement.excluded.push(prior.id.clone());
        } else {
            retirement.already_excluded.push(prior.id.clone());
        }

        if prior.decision.must_abort {
            let state = engine.status(&prior.id)?;
            if state.is_abortable() {
                engine.abort(&prior.id)?;
                tracing::warn!(
                    "Aborted superseded workflow {} for '{}'",
                    prior.id,
                    resolution.batch_sample
                );
                retirement.aborted.push(prior.id.clone());
            } else {
                tracing::debug!("Superseded workflow {} is {}; not aborting", prior.id, state);
            }
        }
    }
    Ok(retirement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        use ConflictPolicy::*;
        use JobState::*;

        let cases = [
            (RerunFailed, Succeeded, false, false),
            (RerunFailed, Failed, true, false),
            (RerunFailed, Aborted, true, false),
            (RerunFailed, Running, false, false),
            (RerunFailed, Submitted, false, false),
            (RerunFailed, Aborting, false, false),
            (RerunUnlessSuccess, Succeeded, false, false),
            (RerunUnlessSuccess, Failed, true, false),
            (RerunUnlessSuccess, Running, true, true),
            (RerunUnlessSuccess, Aborting, true, true),
            (RerunAll, Succeeded, true, false),
            (RerunAll, Aborted, true, false),
            (RerunAll, Submitted, true, true),
        ];
        for (policy, state, can_overwrite, must_abort) in cases {
            assert_eq!(
                decide(policy, state),
                ConflictDecision {
                    can_overwrite,
                    must_abort
                },
                "{} / {}",
                policy,
                state
            );
        }
    }

    #[test]
    fn test_abort_implies_overwrite() {
        for policy in [
            ConflictPolicy::RerunFailed,
            ConflictPolicy::RerunUnlessSuccess,
            ConflictPolicy::RerunAll,
        ] {
            for state in JobState::ALL {
                let d = decide(policy, state);
                assert!(!d.must_abort || d.can_overwrite);
                if state.is_terminal() {
                    assert!(!d.must_abort);
                }
            }
        }
    }

    #[test]
    fn test_resolution_permission() {
        let prior = |state| PriorWorkflow {
            id: WorkflowId::from(format!("wf-{}", state)),
            state,
            decision: decide(ConflictPolicy::RerunFailed, state),
        };
        let mut resolution = ConflictResolution {
            batch_sample: "B1_S1".to_string(),
            policy: ConflictPolicy::RerunFailed,
            prior: vec![],
        };
        assert!(resolution.is_permitted());

        resolution.prior = vec![prior(JobState::Failed), prior(JobState::Running)];
        assert!(!resolution.is_permitted());
        let reason = resolution.block_reason();
        assert!(reason.contains("wf-Running (Running)"));
        assert!(!reason.contains("wf-Failed"));
    }
}
