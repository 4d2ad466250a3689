use indexmap::IndexMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::auth::Token;
use crate::error::{CitrigError, Result};

use super::types::{Environment, Job, Note, Pipeline};

/// Listings are fetched in pages of this size; a short page ends the listing.
const PAGE_SIZE: usize = 100;

/// REST client for the GitLab v4 API of a single host.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
}

impl GitLabClient {
    /// Create a client for `base_url` (e.g., "https://gitlab.com").
    ///
    /// # Arguments
    ///
    /// * `base_url` - Host to talk to; the v4 API path is appended here
    /// * `token` - Optional access token for authenticated endpoints
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("citrig/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CitrigError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| CitrigError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| CitrigError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Construct project base URL
    fn project_url(&self, project_path: &str) -> Result<Url> {
        self.api_url
            .join(&format!("projects/{}/", urlencoding::encode(project_path)))
            .map_err(|e| CitrigError::Config(format!("Invalid project URL: {e}")))
    }

    fn project_endpoint(&self, project_path: &str, tail: &str) -> Result<Url> {
        self.project_url(project_path)?
            .join(tail)
            .map_err(|e| CitrigError::Config(format!("Invalid endpoint URL: {e}")))
    }

    /// Send a request, mapping non-success responses to an API error that
    /// carries the response body.
    async fn request_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.auth_request(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let url = response.url().to_string();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(CitrigError::Api {
                status: status.as_u16(),
                url,
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Drain every page of a listing endpoint.
    async fn paginated<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1_usize;

        loop {
            let request = self.client.get(url.clone()).query(&[
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ]);

            let chunk: Vec<T> = self.request_json(request).await?;
            let chunk_len = chunk.len();
            all.extend(chunk);

            if chunk_len < PAGE_SIZE {
                break;
            }

            page += 1;
        }

        Ok(all)
    }

    /// Create a pipeline in `project_path` via the trigger endpoint.
    ///
    /// Deliberately single-shot: the endpoint is not idempotent, so a blind
    /// retry could start a second downstream pipeline.
    ///
    /// # Arguments
    ///
    /// * `trigger_token` - Trigger (or job) token authorizing the creation
    /// * `ref_` - Branch or tag to run the pipeline on
    /// * `variables` - Trigger variables forwarded to the pipeline
    pub async fn run_trigger(
        &self,
        project_path: &str,
        trigger_token: &Token,
        ref_: &str,
        variables: &IndexMap<String, String>,
    ) -> Result<Pipeline> {
        let url = self.project_endpoint(project_path, "trigger/pipeline")?;
        let body = json!({
            "token": trigger_token.as_str(),
            "ref": ref_,
            "variables": variables,
        });

        self.request_json(self.client.post(url).json(&body)).await
    }

    /// Fetch a single pipeline.
    pub async fn pipeline(&self, project_path: &str, pipeline_id: u64) -> Result<Pipeline> {
        let url = self.project_endpoint(project_path, &format!("pipelines/{pipeline_id}"))?;

        self.request_json(self.client.get(url)).await
    }

    /// Fetch every job of a pipeline.
    pub async fn pipeline_jobs(&self, project_path: &str, pipeline_id: u64) -> Result<Vec<Job>> {
        let url = self.project_endpoint(project_path, &format!("pipelines/{pipeline_id}/jobs"))?;

        self.paginated(url).await
    }

    /// Fetch a single job.
    pub async fn job(&self, project_path: &str, job_id: u64) -> Result<Job> {
        let url = self.project_endpoint(project_path, &format!("jobs/{job_id}"))?;

        self.request_json(self.client.get(url)).await
    }

    /// Fetch every note of a merge request.
    pub async fn merge_request_notes(
        &self,
        project_path: &str,
        merge_request_iid: &str,
    ) -> Result<Vec<Note>> {
        let url = self.project_endpoint(
            project_path,
            &format!("merge_requests/{merge_request_iid}/notes"),
        )?;

        self.paginated(url).await
    }

    /// Post a new note on a merge request.
    pub async fn create_merge_request_note(
        &self,
        project_path: &str,
        merge_request_iid: &str,
        body: &str,
    ) -> Result<Note> {
        let url = self.project_endpoint(
            project_path,
            &format!("merge_requests/{merge_request_iid}/notes"),
        )?;

        self.request_json(self.client.post(url).json(&json!({ "body": body })))
            .await
    }

    /// Replace the body of an existing merge request note.
    pub async fn update_merge_request_note(
        &self,
        project_path: &str,
        merge_request_iid: &str,
        note_id: u64,
        body: &str,
    ) -> Result<Note> {
        let url = self.project_endpoint(
            project_path,
            &format!("merge_requests/{merge_request_iid}/notes/{note_id}"),
        )?;

        self.request_json(self.client.put(url).json(&json!({ "body": body })))
            .await
    }

    /// Fetch the environments of a project whose name matches `name` exactly.
    pub async fn environments(&self, project_path: &str, name: &str) -> Result<Vec<Environment>> {
        let url = self.project_endpoint(project_path, "environments")?;

        self.request_json(self.client.get(url).query(&[("name", name)]))
            .await
    }

    /// Stop an environment, returning its post-stop state.
    pub async fn stop_environment(
        &self,
        project_path: &str,
        environment_id: u64,
    ) -> Result<Environment> {
        let url = self.project_endpoint(project_path, &format!("environments/{environment_id}/stop"))?;

        self.request_json(self.client.post(url)).await
    }
}
