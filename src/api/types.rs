use serde::Deserialize;

/// A GitLab pipeline, as returned by the trigger and pipeline endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    /// Unique identifier within the host instance
    pub id: u64,
    /// Browser URL of the pipeline
    pub web_url: String,
    /// Current status; the trigger endpoint reports "created"
    #[serde(default)]
    pub status: Option<BuildStatus>,
}

/// A job within a GitLab pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Unique identifier within the host instance
    pub id: u64,
    /// Job name as defined in .gitlab-ci.yml
    pub name: String,
    /// Current status
    #[serde(default)]
    pub status: Option<BuildStatus>,
}

/// A note (comment) on a merge request.
#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    /// Unique identifier within the host instance
    pub id: u64,
    /// Markdown body of the note
    pub body: String,
}

/// A deployment environment within a project.
#[derive(Debug, Clone, Deserialize)]
pub struct Environment {
    /// Unique identifier within the project
    pub id: u64,
    /// Environment name (e.g., "review/my-branch-ce-1234")
    pub name: String,
    /// Lifecycle state (e.g., "available", "stopped")
    pub state: String,
}

/// Build status shared by pipelines and jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    /// Statuses this version does not know about yet
    #[serde(other)]
    Unknown,
}

impl BuildStatus {
    /// Whether the build is still making progress toward a result.
    ///
    /// Mirrors the statuses the wait protocol keeps polling on; everything
    /// else is treated as terminal.
    pub fn in_flight(self) -> bool {
        matches!(self, Self::Created | Self::Pending | Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::WaitingForResource => "waiting_for_resource",
            Self::Preparing => "preparing",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Unknown => "unknown",
        }
    }
}
