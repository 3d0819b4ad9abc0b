use crate::engine::{Engine, LabelQuery, MetadataKeys, WorkflowSubmission};
use crate::error::{ClientError, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use wdlbatch_core::labels::LabelSet;
use wdlbatch_core::model::{JobState, WorkflowId};

const WORKFLOWS_API: &str = "api/workflows/v1";

/// Adds `http://` to scheme-less addresses and drops trailing slashes.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    id: String,
    #[serde(default, rename = "parentWorkflowId")]
    parent_workflow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// Blocking client for a Cromwell server's REST API.
pub struct CromwellEngine {
    base_url: String,
    client: Client,
}

impl CromwellEngine {
    pub fn new(url: &str) -> Result<Self> {
        let base_url = normalize_url(url);
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::RemoteUnavailable {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn workflow_url(&self, id: &WorkflowId, action: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, WORKFLOWS_API, id, action)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().map_err(|e| ClientError::RemoteUnavailable {
            url: self.base_url.clone(),
            message: e.to_string(),
        })
    }

    fn parse<T: for<'de> Deserialize<'de>>(request: &str, response: Response) -> Result<T> {
        response.json::<T>().map_err(|e| ClientError::MalformedResponse {
            request: request.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Pulls the `message` out of `{"status": "fail", "message": ...}` bodies.
fn server_message(response: Response) -> String {
    let text = response.text().unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(text)
}

impl Engine for CromwellEngine {
    fn health(&self) -> Result<()> {
        tracing::info!("Checking health of workflow server at {}", self.base_url);
        let response = self.send(self.client.get(format!("{}/engine/v1/status", self.base_url)))?;
        if !response.status().is_success() {
            return Err(ClientError::Unhealthy {
                url: self.base_url.clone(),
                message: server_message(response),
            });
        }
        tracing::info!("Workflow server is up and running");
        Ok(())
    }

    fn query(&self, query: &LabelQuery) -> Result<Vec<WorkflowId>> {
        let mut params: Vec<(&str, String)> = query
            .label_params()
            .into_iter()
            .map(|p| ("label", p))
            .collect();
        params.push(("includeSubworkflows", "false".to_string()));

        let request = format!("query {}", query);
        let response = self.send(
            self.client
                .get(format!("{}/{}/query", self.base_url, WORKFLOWS_API))
                .query(&params),
        )?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Server {
                request,
                status: status.as_u16(),
                message: server_message(response),
            });
        }
        let body: QueryResponse = Self::parse(&request, response)?;
        let ids: Vec<WorkflowId> = body
            .results
            .into_iter()
            .filter(|r| r.parent_workflow_id.is_none())
            .map(|r| WorkflowId(r.id))
            .collect();
        tracing::debug!("Query {} matched {} workflow(s)", query, ids.len());
        Ok(ids)
    }

    fn status(&self, id: &WorkflowId) -> Result<JobState> {
        let request = format!("status of {}", id);
        let response = self.send(self.client.get(self.workflow_url(id, "status")))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::JobNotFound(id.clone()));
        }
        if !status.is_success() {
            return Err(ClientError::Server {
                request,
                status: status.as_u16(),
                message: server_message(response),
            });
        }
        let body: StatusResponse = Self::parse(&request, response)?;
        body.status
            .parse::<JobState>()
            .map_err(|e| ClientError::MalformedResponse {
                request,
                reason: e.to_string(),
            })
    }

    fn metadata(&self, id: &WorkflowId, keys: &MetadataKeys) -> Result<Map<String, Value>> {
        let request = format!("metadata of {}", id);
        let mut params: Vec<(&str, &str)> = vec![("expandSubWorkflows", "false")];
        match keys {
            MetadataKeys::All => {}
            MetadataKeys::Include(keys) => params.extend(keys.iter().map(|k| ("includeKey", k.as_str()))),
            MetadataKeys::Exclude(keys) => params.extend(keys.iter().map(|k| ("excludeKey", k.as_str()))),
        }

        let response = self.send(self.client.get(self.workflow_url(id, "metadata")).query(&params))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::JobNotFound(id.clone()));
        }
        if !status.is_success() {
            return Err(ClientError::Server {
                request,
                status: status.as_u16(),
                message: server_message(response),
            });
        }
        match Self::parse::<Value>(&request, response)? {
            Value::Object(map) => Ok(map),
            other => Err(ClientError::MalformedResponse {
                request,
                reason: format!("expected a JSON object, got {}", other),
            }),
        }
    }

    fn patch_labels(&self, id: &WorkflowId, labels: &LabelSet) -> Result<()> {
        tracing::debug!("Patching labels of {}: {:?}", id, labels);
        let response = self.send(self.client.patch(self.workflow_url(id, "labels")).json(labels))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::PatchLabels {
                id: id.clone(),
                status: status.as_u16(),
                message: server_message(response),
            });
        }
        Ok(())
    }

    fn submit(&self, submission: &WorkflowSubmission<'_>) -> Result<WorkflowId> {
        let source = submission.source;
        let label = submission.labels.display_name().to_string();

        let mut form = multipart::Form::new()
            .file("workflowSource", &source.workflow)
            .map_err(|e| ClientError::PathIo {
                path: source.workflow.clone(),
                source: e,
            })?
            .text("workflowInputs", serde_json::to_string(submission.inputs)?)
            .text("labels", serde_json::to_string(submission.labels)?);
        if let Some(deps) = &source.dependencies {
            form = form
                .file("workflowDependencies", deps)
                .map_err(|e| ClientError::PathIo {
                    path: deps.clone(),
                    source: e,
                })?;
        }

        let response = self.send(
            self.client
                .post(format!("{}/{}", self.base_url, WORKFLOWS_API))
                .multipart(form),
        )?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Submission {
                label,
                status: status.as_u16(),
                message: server_message(response),
            });
        }
        let body: SubmitResponse = Self::parse(&format!("submission of {}", label), response)?;
        Ok(WorkflowId(body.id))
    }

    fn abort(&self, id: &WorkflowId) -> Result<()> {
        let response = self.send(self.client.post(self.workflow_url(id, "abort")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = server_message(response);
        match self.status(id) {
            Ok(state) if state.is_terminal() => {
                tracing::debug!("Workflow {} is already {}; nothing to abort", id, state);
                Ok(())
            }
            _ => Err(ClientError::Abort {
                id: id.clone(),
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("10.0.0.5:8000"), "http://10.0.0.5:8000");
        assert_eq!(normalize_url("https://cromwell.example.org/"), "https://cromwell.example.org");
        assert_eq!(normalize_url(" localhost:8000// "), "http://localhost:8000");
    }
}
