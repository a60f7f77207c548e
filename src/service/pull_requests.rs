//! Pull request lifecycle and reviewer statistics.

use chrono::Utc;

use super::{require, ReviewService};
use crate::errors::AppError;
use crate::models::{
    CreatePullRequestRequest, PullRequest, PullRequestStatus, ReassignResult, ReviewerStats,
};

const REVIEWERS_PER_REQUEST: usize = 2;

impl ReviewService {
    /// Open a pull request with up to two reviewers drawn from the author's
    /// active teammates.
    pub async fn create_pull_request(
        &self,
        request: CreatePullRequestRequest,
    ) -> Result<PullRequest, AppError> {
        require(&request.pull_request_id, "pull_request_id")?;
        require(&request.pull_request_name, "pull_request_name")?;
        require(&request.author_id, "author_id")?;

        self.within_deadline(async {
            if self.store.pr_exists(&request.pull_request_id).await? {
                return Err(AppError::PrExists(format!(
                    "Pull request {} already exists",
                    request.pull_request_id
                )));
            }

            let author = self.store.get_user(&request.author_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Author {} not found", request.author_id))
            })?;

            let candidates = self
                .store
                .get_active_users_by_team(&author.team_name, Some(&author.user_id))
                .await?;
            let reviewers = self
                .selector
                .select_random(&candidates, REVIEWERS_PER_REQUEST);

            let pr = PullRequest {
                pull_request_id: request.pull_request_id,
                pull_request_name: request.pull_request_name,
                author_id: request.author_id,
                status: PullRequestStatus::Open,
                assigned_reviewers: reviewers,
                created_at: Utc::now(),
                merged_at: None,
                version: 1,
            };
            self.store.create_pr(&pr).await?;

            tracing::info!(
                pull_request = %pr.pull_request_id,
                author = %pr.author_id,
                reviewers = ?pr.assigned_reviewers,
                "Pull request created"
            );
            Ok(pr)
        })
        .await
    }

    /// Merge a pull request. Merging an already merged request returns it
    /// unchanged.
    pub async fn merge_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        self.within_deadline(async {
            let pr = self.get_existing_pr(pull_request_id).await?;
            if pr.is_merged() {
                return Ok(pr);
            }

            let applied = self
                .store
                .update_pr_status(pull_request_id, PullRequestStatus::Merged, Some(Utc::now()))
                .await?;
            if applied {
                tracing::info!(pull_request = %pull_request_id, "Pull request merged");
            }

            // Re-read either way; a lost race means another caller merged it.
            self.get_existing_pr(pull_request_id).await
        })
        .await
    }

    /// Replace one reviewer with an active member of that reviewer's team.
    /// There is no fallback to other teams.
    pub async fn reassign_reviewer(
        &self,
        pull_request_id: &str,
        old_user_id: &str,
    ) -> Result<ReassignResult, AppError> {
        self.within_deadline(async {
            let mut pr = self.get_existing_pr(pull_request_id).await?;
            if pr.is_merged() {
                return Err(AppError::PrMerged(format!(
                    "Cannot reassign on merged pull request {}",
                    pull_request_id
                )));
            }
            let Some(slot) = pr.assigned_reviewers.iter().position(|id| id == old_user_id) else {
                return Err(AppError::NotAssigned(format!(
                    "User {} is not assigned to pull request {}",
                    old_user_id, pull_request_id
                )));
            };

            let old_user = self
                .store
                .get_user(old_user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", old_user_id)))?;

            let candidates: Vec<_> = self
                .store
                .get_active_users_by_team(&old_user.team_name, Some(old_user_id))
                .await?
                .into_iter()
                .filter(|user| user.user_id != pr.author_id && !pr.has_reviewer(&user.user_id))
                .collect();

            let replacement = self
                .selector
                .select_random(&candidates, 1)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    AppError::NoCandidate("no active replacement candidate in team".to_string())
                })?;

            let mut reviewers = pr.assigned_reviewers.clone();
            reviewers[slot] = replacement.clone();

            let version = self
                .store
                .update_pr_reviewers(pull_request_id, &reviewers, Some(pr.version))
                .await?;

            tracing::info!(
                pull_request = %pull_request_id,
                outgoing = %old_user_id,
                replacement = %replacement,
                "Reviewer reassigned"
            );

            pr.assigned_reviewers = reviewers;
            pr.version = version;
            Ok(ReassignResult {
                pr,
                replaced_by: replacement,
            })
        })
        .await
    }

    pub async fn get_reviewer_stats(&self) -> Result<ReviewerStats, AppError> {
        self.within_deadline(async {
            let (stats, total_reviews) = self.store.get_reviewer_stats().await?;
            Ok(ReviewerStats {
                stats,
                total_reviews,
            })
        })
        .await
    }

    async fn get_existing_pr(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        self.store.get_pr(pull_request_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Pull request {} not found", pull_request_id))
        })
    }
}
