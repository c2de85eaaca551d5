use serde::{Deserialize, Serialize};

pub mod page;
pub use page::Page;

// -------------------------------------------------------------------------------------------------
// Commit
// Defined as in: https://docs.gitlab.com/ee/api/merge_requests.html#get-single-merge-request-commits
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct Commit {
    pub id: String,
    pub short_id: Option<String>,
    pub title: Option<String>,
    /// Absent only for ill-formed responses
    pub author_name: Option<String>,
    /// Absent or null when the commit was authored without a configured email address
    #[serde(default)]
    pub author_email: Option<String>,
    pub created_at: Option<String>,
    pub message: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// User
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: Option<String>,
    pub state: Option<String>,
    pub web_url: Option<String>,
    /// Linked accounts from external identity providers; only visible to administrators
    #[serde(default)]
    pub identities: Vec<Identity>,
}

// -------------------------------------------------------------------------------------------------
// Identity
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct Identity {
    pub provider: String,
    pub extern_uid: String,
}

// -------------------------------------------------------------------------------------------------
// MergeRequest
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    pub project_id: u64,
    pub title: Option<String>,
    pub state: Option<String>,
    /// The head commit; null while GitLab is still preparing the merge request
    pub sha: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub source_branch: Option<String>,
    pub target_branch: String,
    pub web_url: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// Label
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct Label {
    pub id: u64,
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// Note
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct Note {
    pub id: u64,
    pub body: String,
}

// -------------------------------------------------------------------------------------------------
// CommitStatus
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct CommitStatus {
    pub id: u64,
    pub sha: String,
    pub status: String,
    /// The status context
    pub name: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// CommitState
// -------------------------------------------------------------------------------------------------
/// The states a commit status can be set to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Running => "running",
            CommitState::Success => "success",
            CommitState::Failed => "failed",
            CommitState::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
