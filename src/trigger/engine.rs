use log::{debug, info};

use crate::api::GitLabClient;
use crate::auth::Token;
use crate::context::CiContext;
use crate::error::Result;

use super::comment;
use super::refs;
use super::target::{self, Target};
use super::variables;
use super::versions::{FileVersionSource, VersionSource};
use super::watch::{self, WaitPolicy, WaitSubject};
use super::{JobHandle, PipelineHandle};

/// Everything an invocation produced.
#[derive(Debug)]
pub struct TriggerOutcome {
    pub pipeline: PipelineHandle,
    /// Set when a downstream job was requested and found; waiting then
    /// follows the job instead of the whole pipeline.
    pub job: Option<JobHandle>,
}

/// One trigger invocation: derives parameters from the CI environment and
/// drives the downstream (and, for note-posting targets, upstream) API.
pub struct PipelineTrigger {
    target: Target,
    ctx: CiContext,
    downstream_project_path: String,
    downstream: GitLabClient,
    upstream: GitLabClient,
    versions: Box<dyn VersionSource>,
}

impl PipelineTrigger {
    /// Build an invocation against the production endpoints, reading pin
    /// files from the current directory.
    pub fn new(target: Target, ctx: CiContext) -> Result<Self> {
        Self::with_endpoints(target, ctx, target.api_endpoint(), target::UPSTREAM_ENDPOINT)
    }

    /// Endpoint-injecting constructor; tests point this at a local server.
    pub fn with_endpoints(
        target: Target,
        ctx: CiContext,
        downstream_endpoint: &str,
        upstream_endpoint: &str,
    ) -> Result<Self> {
        let downstream = GitLabClient::new(downstream_endpoint, target.access_token(&ctx))?;
        let upstream = GitLabClient::new(upstream_endpoint, base_access_token(&ctx))?;
        let downstream_project_path = target.downstream_project_path(&ctx).to_string();

        Ok(Self {
            target,
            ctx,
            downstream_project_path,
            downstream,
            upstream,
            versions: Box::new(FileVersionSource::new(".")),
        })
    }

    /// Substitute the pin-file source; tests use an in-memory one.
    #[cfg(test)]
    pub fn with_version_source(mut self, versions: impl VersionSource + 'static) -> Self {
        self.versions = Box::new(versions);
        self
    }

    /// Resolve parameters, create the downstream pipeline, optionally
    /// resolve `downstream_job_name` inside it, and report back on the
    /// upstream merge request for targets that do so.
    pub async fn invoke(&self, downstream_job_name: Option<&str>) -> Result<TriggerOutcome> {
        let ref_ = refs::resolve_ref(&self.ctx, self.target);
        let variables =
            variables::resolve(&self.ctx, self.target, self.versions.as_ref(), &ref_)?;
        let trigger_token = self.target.trigger_token(&self.ctx)?;

        info!(
            "Triggering downstream pipeline on {} (ref: {ref_})",
            self.downstream_project_path
        );
        let payload = variables.into_payload();
        debug!("Trigger variables: {payload:?}");

        let pipeline = self
            .downstream
            .run_trigger(&self.downstream_project_path, &trigger_token, &ref_, &payload)
            .await?;
        let pipeline = PipelineHandle {
            id: pipeline.id,
            url: pipeline.web_url,
        };
        info!("Triggered downstream pipeline: {}", pipeline.url);

        let job = match downstream_job_name {
            Some(name) => {
                watch::find_job(&self.downstream, &self.downstream_project_path, &pipeline, name)
                    .await?
            }
            None => None,
        };

        if self.target.posts_status_note() {
            comment::publish_status_note(&self.upstream, &self.ctx, &pipeline).await?;
        }

        Ok(TriggerOutcome { pipeline, job })
    }

    /// Block until the downstream build finishes; non-success is an error.
    pub async fn wait(&self, outcome: &TriggerOutcome) -> Result<()> {
        self.wait_with_policy(outcome, &WaitPolicy::default()).await
    }

    pub async fn wait_with_policy(
        &self,
        outcome: &TriggerOutcome,
        policy: &WaitPolicy,
    ) -> Result<()> {
        let subject = match &outcome.job {
            Some(job) => WaitSubject::Job(job),
            None => WaitSubject::Pipeline(&outcome.pipeline),
        };

        watch::wait(&self.downstream, &self.downstream_project_path, subject, policy).await
    }

    /// Stop the downstream review-app environment of the current ref.
    ///
    /// Already-gone environments are fine; stopping is best-effort cleanup.
    pub async fn cleanup_review_app(&self) -> Result<()> {
        let slug = target::docs_source_slug(&self.ctx)?;
        let review_slug = target::docs_review_slug(&self.ctx, slug);
        let ref_slug = self.ctx.get("CI_COMMIT_REF_SLUG").unwrap_or_default();
        let name = format!("review/{ref_slug}{review_slug}");

        let environments = self
            .downstream
            .environments(&self.downstream_project_path, &name)
            .await?;
        let Some(environment) = environments.first() else {
            info!("No review environment named '{name}' to stop");
            return Ok(());
        };

        let stopped = self
            .downstream
            .stop_environment(&self.downstream_project_path, environment.id)
            .await?;
        info!("Review environment '{}' is now {}", stopped.name, stopped.state);

        Ok(())
    }
}

fn base_access_token(ctx: &CiContext) -> Option<Token> {
    ctx.get(target::BASE_ACCESS_TOKEN_VAR).map(Token::from)
}
