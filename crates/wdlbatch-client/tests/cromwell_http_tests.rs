use serde_json::{json, Map};
use wdlbatch_client::cromwell::CromwellEngine;
use wdlbatch_client::engine::{Engine, LabelQuery, MetadataKeys, WorkflowSource, WorkflowSubmission};
use wdlbatch_client::error::ClientError;
use wdlbatch_core::labels::LabelSet;
use wdlbatch_core::model::{BatchStatus, JobState, WorkflowId};
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The blocking client must not run on the async runtime's own threads.
async fn with_engine<T, F>(server: &MockServer, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce(&CromwellEngine) -> T + Send + 'static,
{
    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let engine = CromwellEngine::new(&uri).unwrap();
        f(&engine)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/engine/v1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    with_engine(&server, |e| e.health()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unhealthy_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/engine/v1/status"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"Engine Database": {"ok": false}})))
        .mount(&server)
        .await;

    let err = with_engine(&server, |e| e.health()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unhealthy { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_server_is_transport_error() {
    let err = tokio::task::spawn_blocking(|| {
        let engine = CromwellEngine::new("127.0.0.1:1").unwrap();
        engine.status(&WorkflowId::from("abc"))
    })
    .await
    .unwrap()
    .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_query_filters_subworkflows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/query"))
        .and(query_param("includeSubworkflows", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "top-1", "status": "Running"},
                {"id": "sub-1", "status": "Running", "parentWorkflowId": "top-1"},
                {"id": "top-2", "status": "Failed"}
            ],
            "totalResultsCount": 3
        })))
        .mount(&server)
        .await;

    let ids = with_engine(&server, |e| e.query(&LabelQuery::batch("B1").included()))
        .await
        .unwrap();
    assert_eq!(ids, vec![WorkflowId::from("top-1"), WorkflowId::from("top-2")]);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("label=cromwell-batch-label%3AB1"));
    assert!(query.contains("label=cromwell-batch-status%3Ainclude"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_and_missing_workflow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "status": "Aborting"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-2/status"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"status": "fail", "message": "Unrecognized workflow ID: wf-2"})),
        )
        .mount(&server)
        .await;

    let (found, missing) = with_engine(&server, |e| {
        (
            e.status(&WorkflowId::from("wf-1")),
            e.status(&WorkflowId::from("wf-2")),
        )
    })
    .await;
    assert_eq!(found.unwrap(), JobState::Aborting);
    assert!(matches!(missing.unwrap_err(), ClientError::JobNotFound(id) if id.as_str() == "wf-2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_metadata_requests_include_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/metadata"))
        .and(query_param("includeKey", "labels"))
        .and(query_param("expandSubWorkflows", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "wf-1",
            "labels": {"cromwell-batch-status": "include", "cromwell-workflow-id": "cromwell-wf-1"}
        })))
        .mount(&server)
        .await;

    let labels = with_engine(&server, |e| {
        wdlbatch_client::engine::current_labels(e, &WorkflowId::from("wf-1"))
    })
    .await
    .unwrap();
    assert_eq!(labels.batch_status(), Some(BatchStatus::Include));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_patch_labels_sends_single_request() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/workflows/v1/wf-1/labels"))
        .and(body_json(json!({"cromwell-batch-status": "exclude"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "labels": {}})))
        .expect(1)
        .mount(&server)
        .await;

    with_engine(&server, |e| {
        e.patch_labels(
            &WorkflowId::from("wf-1"),
            &LabelSet::batch_status_patch(BatchStatus::Exclude),
        )
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_submit_sends_multipart_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/v1"))
        .and(body_string_contains("name=\"workflowSource\""))
        .and(body_string_contains("name=\"workflowInputs\""))
        .and(body_string_contains("name=\"labels\""))
        .and(body_string_contains("cromwell-batch-sample-label"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "new-1", "status": "Submitted"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let wdl = dir.path().join("wf.wdl");
    std::fs::write(&wdl, "version 1.0\nworkflow wf {}\n").unwrap();

    let id = with_engine(&server, move |e| {
        let source = WorkflowSource {
            workflow: wdl,
            dependencies: None,
        };
        let mut inputs = Map::new();
        inputs.insert("wf.sample".to_string(), json!("S1"));
        let labels = LabelSet::for_sample("wf", "B1", "S1").unwrap();
        e.submit(&WorkflowSubmission {
            source: &source,
            inputs: &inputs,
            labels: &labels,
        })
    })
    .await
    .unwrap();
    assert_eq!(id, WorkflowId::from("new-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_submission_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/v1"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"status": "fail", "message": "Error(s): Required workflow input 'wf.x' not specified"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let wdl = dir.path().join("wf.wdl");
    std::fs::write(&wdl, "workflow wf {}\n").unwrap();

    let err = with_engine(&server, move |e| {
        let source = WorkflowSource {
            workflow: wdl,
            dependencies: None,
        };
        let labels = LabelSet::for_sample("wf", "B1", "S1").unwrap();
        e.submit(&WorkflowSubmission {
            source: &source,
            inputs: &Map::new(),
            labels: &labels,
        })
    })
    .await
    .unwrap_err();
    match err {
        ClientError::Submission { status, message, .. } => {
            assert_eq!(status, 400);
            assert!(message.contains("Required workflow input"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abort_of_finished_workflow_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/v1/wf-1/abort"))
        .respond_with(ResponseTemplate::new(403).set_body_json(
            json!({"status": "error", "message": "Couldn't abort wf-1 because the workflow is in terminal state 'Succeeded'"}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "status": "Succeeded"})))
        .mount(&server)
        .await;

    with_engine(&server, |e| e.abort(&WorkflowId::from("wf-1")))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abort_of_aborted_workflow_twice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/v1/wf-1/abort"))
        .respond_with(ResponseTemplate::new(403).set_body_json(
            json!({"status": "error", "message": "Couldn't abort wf-1 because the workflow is in terminal state 'Aborted'"}),
        ))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "status": "Aborted"})))
        .mount(&server)
        .await;

    let (first, second) = with_engine(&server, |e| {
        let id = WorkflowId::from("wf-1");
        (e.abort(&id), e.abort(&id))
    })
    .await;
    first.unwrap();
    second.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abort_failure_of_running_workflow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/v1/wf-1/abort"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"status": "error", "message": "boom"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "status": "Running"})))
        .mount(&server)
        .await;

    let err = with_engine(&server, |e| e.abort(&WorkflowId::from("wf-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Abort { status: 500, ref message, .. } if message == "boom"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_metadata_summary_uses_exclude_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows/v1/wf-1/metadata"))
        .and(query_param("excludeKey", "calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wf-1", "status": "Running"})))
        .mount(&server)
        .await;

    let meta = with_engine(&server, |e| e.metadata(&WorkflowId::from("wf-1"), &MetadataKeys::summary()))
        .await
        .unwrap();
    assert_eq!(meta["status"], "Running");
}
