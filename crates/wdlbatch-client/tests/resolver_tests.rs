use wdlbatch_client::abort::abort_batch;
use wdlbatch_client::engine::Engine;
use wdlbatch_client::error::ClientError;
use wdlbatch_client::resolver::{exclude_if_included, find_conflicts, retire_superseded};
use wdlbatch_core::errors::DomainError;
use wdlbatch_core::model::{BatchStatus, ConflictPolicy, JobState};
use wdlbatch_test_utils::{labels_with_status, FakeEngine};

#[test]
fn test_find_conflicts_sees_only_included_workflows() {
    let engine = FakeEngine::new();
    engine.add_workflow("a", labels_with_status("B1", "S1", "include"), JobState::Running);
    engine.add_workflow("b", labels_with_status("B1", "S1", "exclude"), JobState::Failed);
    engine.add_workflow("c", labels_with_status("B1", "S2", "include"), JobState::Failed);

    let resolution = find_conflicts(&engine, "B1_S1", ConflictPolicy::RerunAll).unwrap();
    assert_eq!(resolution.superseded_ids().len(), 1);
    assert_eq!(resolution.prior[0].state, JobState::Running);
    assert!(resolution.prior[0].decision.must_abort);
    assert!(resolution.is_permitted());
}

#[test]
fn test_find_conflicts_ignores_subworkflows() {
    let engine = FakeEngine::new();
    engine.add_workflow("parent", labels_with_status("B1", "S1", "include"), JobState::Failed);
    engine.add_subworkflow("child", labels_with_status("B1", "S1", "include"), JobState::Running, "parent");

    let resolution = find_conflicts(&engine, "B1_S1", ConflictPolicy::RerunFailed).unwrap();
    assert_eq!(resolution.prior.len(), 1);
    assert!(resolution.is_permitted());
}

#[test]
fn test_exclude_is_compare_and_patch() {
    let engine = FakeEngine::new();
    let id = engine.add_workflow("a", labels_with_status("B1", "S1", "include"), JobState::Failed);

    assert!(exclude_if_included(&engine, &id).unwrap());
    assert!(!exclude_if_included(&engine, &id).unwrap());
    assert_eq!(engine.patched().len(), 1);
    assert_eq!(
        engine.workflow(&id).unwrap().labels.batch_status(),
        Some(BatchStatus::Exclude)
    );
}

#[test]
fn test_retire_leaves_aborting_workflow_alone() {
    let engine = FakeEngine::new();
    let id = engine.add_workflow("a", labels_with_status("B1", "S1", "include"), JobState::Aborting);

    let resolution = find_conflicts(&engine, "B1_S1", ConflictPolicy::RerunAll).unwrap();
    let retirement = retire_superseded(&engine, &resolution).unwrap();

    assert_eq!(retirement.excluded, vec![id]);
    assert!(retirement.aborted.is_empty());
    assert!(engine.aborted().is_empty());
}

#[test]
fn test_retire_skips_abort_when_workflow_finished_meanwhile() {
    let engine = FakeEngine::new();
    let id = engine.add_workflow("a", labels_with_status("B1", "S1", "include"), JobState::Running);

    let resolution = find_conflicts(&engine, "B1_S1", ConflictPolicy::RerunAll).unwrap();
    engine.set_state(&id, JobState::Succeeded);
    let retirement = retire_superseded(&engine, &resolution).unwrap();

    assert!(retirement.aborted.is_empty());
    assert_eq!(engine.workflow(&id).unwrap().state, JobState::Succeeded);
}

#[test]
fn test_abort_batch_targets_pending_workflows() {
    let engine = FakeEngine::new();
    let running = engine.add_workflow("a", labels_with_status("B1", "S1", "include"), JobState::Running);
    let queued = engine.add_workflow("b", labels_with_status("B1", "S2", "exclude"), JobState::Submitted);
    engine.add_workflow("c", labels_with_status("B1", "S3", "include"), JobState::Succeeded);
    engine.add_workflow("d", labels_with_status("B1", "S4", "include"), JobState::Aborting);
    engine.add_workflow("e", labels_with_status("B2", "S1", "include"), JobState::Running);

    let summary = abort_batch(&engine, "B1").unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.aborted, vec![running, queued]);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.success_rate(), 100.0);
}

#[test]
fn test_abort_batch_reports_refusals() {
    let engine = FakeEngine::new();
    let stuck = engine.add_workflow("a", labels_with_status("B1", "S1", "include"), JobState::Running);
    engine.add_workflow("b", labels_with_status("B1", "S2", "include"), JobState::Running);
    engine.refuse_abort(&stuck);

    let summary = abort_batch(&engine, "B1").unwrap();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.aborted.len(), 1);
    assert_eq!(summary.failed[0].0, stuck);
    assert_eq!(summary.success_rate(), 50.0);
}

#[test]
fn test_abort_unknown_batch() {
    let engine = FakeEngine::new();
    let err = abort_batch(&engine, "nope").unwrap_err();
    assert!(matches!(err, ClientError::Domain(DomainError::BatchNotFound(ref b)) if b == "nope"));
}

#[test]
fn test_abort_of_aborted_workflow_twice() {
    let engine = FakeEngine::new();
    let id = engine.add_workflow("a", labels_with_status("B1", "S1", "include"), JobState::Aborted);

    engine.abort(&id).unwrap();
    engine.abort(&id).unwrap();
    assert_eq!(engine.aborted().len(), 2);
    assert_eq!(engine.workflow(&id).unwrap().state, JobState::Aborted);
}
