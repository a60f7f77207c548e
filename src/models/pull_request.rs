//! Pull request model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a pull request. `Merged` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestStatus::Open => "OPEN",
            PullRequestStatus::Merged => "MERGED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(PullRequestStatus::Open),
            "MERGED" => Some(PullRequestStatus::Merged),
            _ => None,
        }
    }
}

/// A pull request with its assigned reviewers (at most two, never the author).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    pub assigned_reviewers: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|id| id == user_id)
    }

    pub fn to_short(&self) -> PullRequestShort {
        PullRequestShort {
            pull_request_id: self.pull_request_id.clone(),
            pull_request_name: self.pull_request_name.clone(),
            author_id: self.author_id.clone(),
            status: self.status,
        }
    }
}

/// Compact listing form of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// Request body for opening a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePullRequestRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

/// Request body for merging a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct MergePullRequestRequest {
    pub pull_request_id: String,
}

/// Request body for replacing one assigned reviewer.
#[derive(Debug, Clone, Deserialize)]
pub struct ReassignReviewerRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

/// Outcome of a single-reviewer reassignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignResult {
    pub pr: PullRequest,
    pub replaced_by: String,
}
