use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, warn};

use crate::api::{BuildStatus, GitLabClient};
use crate::error::{CitrigError, Result};

use super::{JobHandle, PipelineHandle};

const POLL_INTERVAL: Duration = Duration::from_secs(60);
const MAX_WAIT: Duration = Duration::from_secs(3 * 60 * 60);

/// How long and how often the wait protocol polls.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub budget: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            budget: MAX_WAIT,
        }
    }
}

/// What the wait protocol polls: the resolved job when one was requested and
/// found, the pipeline itself otherwise.
pub(super) enum WaitSubject<'a> {
    Pipeline(&'a PipelineHandle),
    Job(&'a JobHandle),
}

impl WaitSubject<'_> {
    fn label(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::Job(_) => "job",
        }
    }

    fn id(&self) -> u64 {
        match self {
            Self::Pipeline(pipeline) => pipeline.id,
            Self::Job(job) => job.id,
        }
    }
}

/// Resolve the first job named `job_name` in the downstream pipeline.
///
/// Drains every page of the job listing; an unmatched name is reported but
/// is not an error.
pub(super) async fn find_job(
    client: &GitLabClient,
    project_path: &str,
    pipeline: &PipelineHandle,
    job_name: &str,
) -> Result<Option<JobHandle>> {
    let jobs = client.pipeline_jobs(project_path, pipeline.id).await?;

    match jobs.into_iter().find(|job| job.name == job_name) {
        Some(job) => {
            info!("Resolved downstream job '{}' (id {})", job.name, job.id);
            Ok(Some(JobHandle {
                id: job.id,
                name: job.name,
            }))
        }
        None => {
            warn!(
                "No job named '{job_name}' in downstream pipeline {}, watching the pipeline instead",
                pipeline.id
            );
            Ok(None)
        }
    }
}

/// Poll `subject` until it finishes, fails, or the budget runs out.
pub(super) async fn wait(
    client: &GitLabClient,
    project_path: &str,
    subject: WaitSubject<'_>,
    policy: &WaitPolicy,
) -> Result<()> {
    let label = subject.label();
    let spinner = wait_spinner(format!("Waiting for downstream {label} {}...", subject.id()));
    let started = Instant::now();

    while started.elapsed() < policy.budget {
        let status = poll_status(client, project_path, &subject).await;

        if status == BuildStatus::Success {
            spinner.finish_with_message(format!("✓ Downstream {label} succeeded"));
            info!("Downstream {label} {} succeeded", subject.id());
            return Ok(());
        }

        if !status.in_flight() {
            spinner.abandon_with_message(format!(
                "✗ Downstream {label} finished with status '{}'",
                status.as_str()
            ));
            return Err(CitrigError::PipelineFailed {
                subject: label,
                status: status.as_str().to_string(),
            });
        }

        spinner.set_message(format!(
            "Waiting for downstream {label} {} (currently {})...",
            subject.id(),
            status.as_str()
        ));
        tokio::time::sleep(policy.interval).await;
    }

    spinner.abandon_with_message(format!("✗ Gave up waiting for downstream {label}"));
    Err(CitrigError::WaitTimeout {
        subject: label,
        minutes: policy.budget.as_secs() / 60,
    })
}

/// One status probe. Poll failures read as still-running; a persistent
/// outage runs into the overall wait budget instead of failing the build.
async fn poll_status(
    client: &GitLabClient,
    project_path: &str,
    subject: &WaitSubject<'_>,
) -> BuildStatus {
    let polled = match subject {
        WaitSubject::Pipeline(pipeline) => client
            .pipeline(project_path, pipeline.id)
            .await
            .map(|pipeline| pipeline.status),
        WaitSubject::Job(job) => client.job(project_path, job.id).await.map(|job| job.status),
    };

    match polled {
        Ok(Some(status)) => status,
        Ok(None) => BuildStatus::Running,
        Err(error) => {
            warn!("Ignoring status poll failure: {error}");
            BuildStatus::Running
        }
    }
}

fn wait_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap(),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GitLabClient;

    fn fast_policy() -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_millis(10),
            budget: Duration::from_millis(300),
        }
    }

    fn pipeline_handle() -> PipelineHandle {
        PipelineHandle {
            id: 42,
            url: "https://example.com/p/42".to_string(),
        }
    }

    mod find_job {
        use super::*;

        #[tokio::test]
        async fn returns_the_first_job_matching_the_name() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/projects/foo%2Fbar/pipelines/42/jobs")
                .match_query(mockito::Matcher::Any)
                .with_body(
                    r#"[
                        {"id": 1, "name": "build", "status": "success"},
                        {"id": 2, "name": "Trigger:qa-test", "status": "pending"},
                        {"id": 3, "name": "Trigger:qa-test", "status": "pending"}
                    ]"#,
                )
                .create_async()
                .await;

            let client = GitLabClient::new(&server.url(), None).unwrap();
            let job = find_job(&client, "foo/bar", &pipeline_handle(), "Trigger:qa-test")
                .await
                .unwrap();

            let job = job.unwrap();
            assert_eq!(job.id, 2);
            assert_eq!(job.name, "Trigger:qa-test");
        }

        #[tokio::test]
        async fn an_unmatched_name_yields_none() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/projects/foo%2Fbar/pipelines/42/jobs")
                .match_query(mockito::Matcher::Any)
                .with_body(r#"[{"id": 1, "name": "build", "status": "success"}]"#)
                .create_async()
                .await;

            let client = GitLabClient::new(&server.url(), None).unwrap();
            let job = find_job(&client, "foo/bar", &pipeline_handle(), "does-not-exist")
                .await
                .unwrap();

            assert!(job.is_none());
        }
    }

    mod wait {
        use super::*;

        #[tokio::test]
        async fn succeeds_when_the_pipeline_succeeds() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/projects/foo%2Fbar/pipelines/42")
                .with_body(r#"{"id": 42, "web_url": "https://example.com/p/42", "status": "success"}"#)
                .create_async()
                .await;

            let client = GitLabClient::new(&server.url(), None).unwrap();
            let handle = pipeline_handle();
            let result = wait(
                &client,
                "foo/bar",
                WaitSubject::Pipeline(&handle),
                &fast_policy(),
            )
            .await;

            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn a_terminal_non_success_status_is_an_error() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/projects/foo%2Fbar/pipelines/42")
                .with_body(r#"{"id": 42, "web_url": "https://example.com/p/42", "status": "failed"}"#)
                .create_async()
                .await;

            let client = GitLabClient::new(&server.url(), None).unwrap();
            let handle = pipeline_handle();
            let error = wait(
                &client,
                "foo/bar",
                WaitSubject::Pipeline(&handle),
                &fast_policy(),
            )
            .await
            .unwrap_err();

            assert!(matches!(
                error,
                CitrigError::PipelineFailed { subject: "pipeline", status } if status == "failed"
            ));
        }

        #[tokio::test]
        async fn polls_the_job_when_one_was_resolved() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/api/v4/projects/foo%2Fbar/jobs/7")
                .with_body(r#"{"id": 7, "name": "Trigger:qa-test", "status": "success"}"#)
                .create_async()
                .await;

            let client = GitLabClient::new(&server.url(), None).unwrap();
            let job = JobHandle {
                id: 7,
                name: "Trigger:qa-test".to_string(),
            };
            let result = wait(&client, "foo/bar", WaitSubject::Job(&job), &fast_policy()).await;

            mock.assert_async().await;
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn an_exhausted_budget_times_out() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/projects/foo%2Fbar/pipelines/42")
                .with_body(r#"{"id": 42, "web_url": "https://example.com/p/42", "status": "running"}"#)
                .expect_at_least(2)
                .create_async()
                .await;

            let client = GitLabClient::new(&server.url(), None).unwrap();
            let handle = pipeline_handle();
            let error = wait(
                &client,
                "foo/bar",
                WaitSubject::Pipeline(&handle),
                &fast_policy(),
            )
            .await
            .unwrap_err();

            assert!(matches!(error, CitrigError::WaitTimeout { subject: "pipeline", .. }));
        }

        #[tokio::test]
        async fn poll_failures_read_as_still_running() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v4/projects/foo%2Fbar/pipelines/42")
                .with_status(502)
                .with_body("Bad Gateway")
                .expect_at_least(2)
                .create_async()
                .await;

            let client = GitLabClient::new(&server.url(), None).unwrap();
            let handle = pipeline_handle();
            let error = wait(
                &client,
                "foo/bar",
                WaitSubject::Pipeline(&handle),
                &fast_policy(),
            )
            .await
            .unwrap_err();

            // The poll errors never surface; only the budget does.
            assert!(matches!(error, CitrigError::WaitTimeout { .. }));
        }
    }
}
