//! In-memory implementation of `ReviewStore`.
//!
//! All data is held behind one `RwLock` and lost on restart. Every trait call
//! takes the lock once, so each call is atomic with respect to the others.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ReviewStore;
use crate::errors::AppError;
use crate::models::{
    PullRequest, PullRequestShort, PullRequestStatus, ReviewerStat, Team, TeamMember, User,
};

#[derive(Default)]
struct State {
    teams: BTreeSet<String>,
    /// Keyed by user id, so iteration is already ordered by id.
    users: BTreeMap<String, User>,
    pull_requests: BTreeMap<String, PullRequest>,
}

/// In-memory review store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    // ==================== TEAMS ====================

    async fn team_exists(&self, team_name: &str) -> Result<bool, AppError> {
        Ok(self.state.read().await.teams.contains(team_name))
    }

    async fn create_team(&self, team: &Team) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.teams.insert(team.team_name.clone()) {
            return Err(AppError::TeamExists(format!(
                "Team {} already exists",
                team.team_name
            )));
        }
        for user in team.member_users() {
            state.users.insert(user.user_id.clone(), user);
        }
        Ok(())
    }

    async fn get_team(&self, team_name: &str) -> Result<Option<Team>, AppError> {
        let state = self.state.read().await;
        if !state.teams.contains(team_name) {
            return Ok(None);
        }

        let members = state
            .users
            .values()
            .filter(|user| user.team_name == team_name)
            .map(|user| TeamMember {
                user_id: user.user_id.clone(),
                username: user.username.clone(),
                is_active: user.is_active,
            })
            .collect();

        Ok(Some(Team {
            team_name: team_name.to_string(),
            members,
        }))
    }

    async fn bulk_deactivate_by_team(
        &self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for id in user_ids {
            if let Some(user) = state.users.get_mut(id) {
                if user.team_name == team_name && user.is_active {
                    user.is_active = false;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    // ==================== USERS ====================

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn create_or_update_user(&self, user: &User) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_active_users_by_team(
        &self,
        team_name: &str,
        exclude_user_id: Option<&str>,
    ) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|user| user.is_active && user.team_name == team_name)
            .filter(|user| Some(user.user_id.as_str()) != exclude_user_id)
            .cloned()
            .collect())
    }

    async fn get_all_active_users(&self, exclude_ids: &[String]) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|user| user.is_active && !exclude_ids.contains(&user.user_id))
            .cloned()
            .collect())
    }

    async fn update_user_active(&self, user_id: &str, is_active: bool) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(user_id) {
            Some(user) => {
                user.is_active = is_active;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("User {} not found", user_id))),
        }
    }

    async fn get_users_by_team(&self, team_name: &str) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|user| user.team_name == team_name)
            .cloned()
            .collect())
    }

    // ==================== PULL REQUESTS ====================

    async fn pr_exists(&self, pull_request_id: &str) -> Result<bool, AppError> {
        Ok(self
            .state
            .read()
            .await
            .pull_requests
            .contains_key(pull_request_id))
    }

    async fn create_pr(&self, pr: &PullRequest) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.pull_requests.contains_key(&pr.pull_request_id) {
            return Err(AppError::PrExists(format!(
                "Pull request {} already exists",
                pr.pull_request_id
            )));
        }
        state
            .pull_requests
            .insert(pr.pull_request_id.clone(), pr.clone());
        Ok(())
    }

    async fn get_pr(&self, pull_request_id: &str) -> Result<Option<PullRequest>, AppError> {
        Ok(self
            .state
            .read()
            .await
            .pull_requests
            .get(pull_request_id)
            .cloned())
    }

    async fn update_pr_status(
        &self,
        pull_request_id: &str,
        status: PullRequestStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let Some(pr) = state.pull_requests.get_mut(pull_request_id) else {
            return Ok(false);
        };
        if pr.status != PullRequestStatus::Open {
            return Ok(false);
        }

        pr.status = status;
        if pr.merged_at.is_none() {
            pr.merged_at = merged_at;
        }
        pr.version += 1;
        Ok(true)
    }

    async fn update_pr_reviewers(
        &self,
        pull_request_id: &str,
        reviewers: &[String],
        expected_version: Option<i64>,
    ) -> Result<i64, AppError> {
        let mut state = self.state.write().await;
        let pr = state.pull_requests.get_mut(pull_request_id).ok_or_else(|| {
            AppError::NotFound(format!("Pull request {} not found", pull_request_id))
        })?;

        if pr.status != PullRequestStatus::Open {
            return Err(AppError::PrMerged(format!(
                "Pull request {} is merged and cannot be changed",
                pull_request_id
            )));
        }
        if let Some(expected) = expected_version {
            if pr.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Concurrent modification detected for pull request {}",
                        pull_request_id
                    ),
                    current_version: pr.version,
                });
            }
        }

        // Same guarantee as the reviewers primary key in SQLite
        let mut seen = HashSet::new();
        if let Some(dup) = reviewers.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(AppError::Database(format!(
                "Duplicate reviewer {} for pull request {}",
                dup, pull_request_id
            )));
        }

        pr.assigned_reviewers = reviewers.to_vec();
        pr.version += 1;
        Ok(pr.version)
    }

    async fn get_prs_by_reviewer(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AppError> {
        let state = self.state.read().await;
        let mut prs: Vec<&PullRequest> = state
            .pull_requests
            .values()
            .filter(|pr| pr.has_reviewer(user_id))
            .collect();
        prs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.pull_request_id.cmp(&b.pull_request_id))
        });
        Ok(prs.into_iter().map(PullRequest::to_short).collect())
    }

    async fn get_open_prs_by_reviewers(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<String>, AppError> {
        let state = self.state.read().await;
        let mut prs: Vec<&PullRequest> = state
            .pull_requests
            .values()
            .filter(|pr| pr.status == PullRequestStatus::Open)
            .filter(|pr| pr.assigned_reviewers.iter().any(|id| user_ids.contains(id)))
            .collect();
        prs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.pull_request_id.cmp(&b.pull_request_id))
        });
        Ok(prs.into_iter().map(|pr| pr.pull_request_id.clone()).collect())
    }

    async fn get_reviewer_stats(&self) -> Result<(Vec<ReviewerStat>, i64), AppError> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for pr in state.pull_requests.values() {
            for reviewer in &pr.assigned_reviewers {
                *counts.entry(reviewer.as_str()).or_default() += 1;
            }
        }

        let mut stats: Vec<ReviewerStat> = counts
            .into_iter()
            .map(|(user_id, reviews_count)| ReviewerStat {
                user_id: user_id.to_string(),
                reviews_count,
            })
            .collect();
        // Stable sort keeps the id order among equal counts
        stats.sort_by(|a, b| b.reviews_count.cmp(&a.reviews_count));
        let total = stats.iter().map(|stat| stat.reviews_count).sum();

        Ok((stats, total))
    }
}
