use serde::{Deserialize, Serialize};

/// Status value that marks an inbound job as ready for processing.
pub const STATUS_SUCCESS: &str = "success";

/// Repository hosting providers supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    GitHub,
    Bitbucket,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::GitHub => write!(f, "github"),
            Provider::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

/// Owner (or workspace) and repository name parsed from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub name: String,
}

/// A file changed in a commit, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
}

impl FileRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Inbound job message.
///
/// `taskId` is accepted for producers that still use the older field name.
#[derive(Debug, Clone, Deserialize)]
pub struct JobMessage {
    #[serde(rename = "jobId", alias = "taskId")]
    pub job_id: String,
    pub data: JobMessageData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessageData {
    pub repository: String,
    pub commit_id: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A commit replication job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitJob {
    pub job_id: String,
    pub repository: String,
    pub commit_id: String,
    pub branch: Option<String>,
    pub status: Option<String>,
}

impl CommitJob {
    /// Whether the upstream producer marked this job as processable.
    /// Jobs without a status are processed.
    pub fn is_processable(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == STATUS_SUCCESS)
    }
}

impl From<JobMessage> for CommitJob {
    fn from(message: JobMessage) -> Self {
        Self {
            job_id: message.job_id,
            repository: message.data.repository,
            commit_id: message.data.commit_id,
            branch: message.data.branch,
            status: message.data.status,
        }
    }
}

/// Terminal record of a job, produced exactly once per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub success: bool,
    pub message: String,
    pub commit_id: String,
    pub uploaded_keys: Vec<String>,
}

/// Detail payload of the outcome event.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeDetail {
    pub job_id: String,
    pub success: bool,
    pub message: String,
    pub data: OutcomeData,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeData {
    pub commit_id: String,
    pub uploaded_files: Vec<String>,
}

impl From<&JobOutcome> for OutcomeDetail {
    fn from(outcome: &JobOutcome) -> Self {
        Self {
            job_id: outcome.job_id.clone(),
            success: outcome.success,
            message: outcome.message.clone(),
            data: OutcomeData {
                commit_id: outcome.commit_id.clone(),
                uploaded_files: outcome.uploaded_keys.clone(),
            },
        }
    }
}
