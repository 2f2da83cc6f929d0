//! Kubeflow Pipelines run lookups over HTTP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::manifest::Workflow;
use super::run::{RunManifest, RunStatusApi};
use crate::errors::{PipesyncError, WatchError};

const RESOURCE: &str = "kfp runs";

/// [`RunStatusApi`] backed by the pipelines REST API (`/apis/v1beta1/runs`).
#[derive(Debug, Clone)]
pub struct KfpRunClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RunDetail {
    run: RunBody,
    pipeline_runtime: PipelineRuntime,
}

#[derive(Deserialize)]
struct RunBody {
    id: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct PipelineRuntime {
    /// The workflow, JSON-encoded as a string.
    workflow_manifest: String,
}

impl KfpRunClient {
    /// Creates a client for a pipelines API host, e.g. `http://ml-pipeline.kubeflow:8888`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Uses a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl RunStatusApi for KfpRunClient {
    async fn get_run(&self, run_id: &str) -> Result<RunManifest, PipesyncError> {
        let url = format!("{}/apis/v1beta1/runs/{run_id}", self.base_url);
        debug!(%url, "Fetching run");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WatchError::transient(RESOURCE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::from_status(RESOURCE, status.as_u16(), body).into());
        }

        let detail: RunDetail = response
            .json()
            .await
            .map_err(|e| PipesyncError::Manifest(format!("run {run_id}: {e}")))?;
        parse_run(detail)
    }
}

fn parse_run(detail: RunDetail) -> Result<RunManifest, PipesyncError> {
    let value: serde_json::Value = serde_json::from_str(&detail.pipeline_runtime.workflow_manifest)?;
    Ok(RunManifest {
        run_id: detail.run.id,
        created_at: detail.run.created_at,
        workflow: Workflow::from_value(&value)?,
    })
}
