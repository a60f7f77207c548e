//! Storage abstraction consumed by the assignment engine.
//!
//! The engine only talks to `ReviewStore`; `Repository` (SQLite) and
//! `InMemoryStore` are the two backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{
    PullRequest, PullRequestShort, PullRequestStatus, ReviewerStat, Team, User,
};

/// Persistence operations for teams, users and pull requests.
///
/// Writes that touch a single pull request are atomic. Reviewer and status
/// writes only ever apply to OPEN pull requests.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    // ==================== TEAMS ====================

    async fn team_exists(&self, team_name: &str) -> Result<bool, AppError>;

    /// Create the team and upsert its members in one transaction.
    /// Fails with `TeamExists` if the name is taken.
    async fn create_team(&self, team: &Team) -> Result<(), AppError>;

    /// Team with all members (inactive included) ordered by user id.
    async fn get_team(&self, team_name: &str) -> Result<Option<Team>, AppError>;

    /// Flip `is_active` off for the team's active members listed in
    /// `user_ids`. Returns the number of users changed.
    async fn bulk_deactivate_by_team(
        &self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<u64, AppError>;

    // ==================== USERS ====================

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    async fn create_or_update_user(&self, user: &User) -> Result<(), AppError>;

    /// Active members of a team ordered by user id, minus `exclude_user_id`.
    async fn get_active_users_by_team(
        &self,
        team_name: &str,
        exclude_user_id: Option<&str>,
    ) -> Result<Vec<User>, AppError>;

    /// Every active user ordered by user id, minus `exclude_ids`.
    async fn get_all_active_users(&self, exclude_ids: &[String]) -> Result<Vec<User>, AppError>;

    /// Fails with `NotFound` if the user does not exist.
    async fn update_user_active(&self, user_id: &str, is_active: bool) -> Result<(), AppError>;

    async fn get_users_by_team(&self, team_name: &str) -> Result<Vec<User>, AppError>;

    // ==================== PULL REQUESTS ====================

    async fn pr_exists(&self, pull_request_id: &str) -> Result<bool, AppError>;

    /// Insert a pull request with its reviewers. Fails with `PrExists` if the
    /// id is taken, including when a concurrent insert wins the race.
    async fn create_pr(&self, pr: &PullRequest) -> Result<(), AppError>;

    async fn get_pr(&self, pull_request_id: &str) -> Result<Option<PullRequest>, AppError>;

    /// Transition an OPEN pull request. Returns `false` when the row was not
    /// OPEN (or does not exist) and nothing changed.
    async fn update_pr_status(
        &self,
        pull_request_id: &str,
        status: PullRequestStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError>;

    /// Replace the reviewer list of an OPEN pull request, returning the new
    /// version. With `expected_version` set, a mismatch fails with `Conflict`.
    /// A pull request that is no longer OPEN fails with `PrMerged`.
    async fn update_pr_reviewers(
        &self,
        pull_request_id: &str,
        reviewers: &[String],
        expected_version: Option<i64>,
    ) -> Result<i64, AppError>;

    /// Pull requests where the user is currently a reviewer, newest first.
    async fn get_prs_by_reviewer(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AppError>;

    /// Ids of OPEN pull requests listing any of `user_ids` as a reviewer.
    async fn get_open_prs_by_reviewers(&self, user_ids: &[String])
        -> Result<Vec<String>, AppError>;

    /// Assignment counts per reviewer (count descending) and their total.
    async fn get_reviewer_stats(&self) -> Result<(Vec<ReviewerStat>, i64), AppError>;
}
