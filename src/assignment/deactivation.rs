//! Bulk team deactivation.
//!
//! Snapshots the team's active members and the open pull requests they
//! review, refills every vacated reviewer slot through the tiered search,
//! commits each pull request on its own, then flips the members inactive.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::db::ReviewStore;
use crate::errors::AppError;
use crate::models::{
    PullRequest, PullRequestStatus, ReplacementStrategy, TeamDeactivateResult, User,
};

use super::search::{find_candidates, AuthorCache, SearchContext};
use super::Selector;

/// Knobs for the per-request write.
#[derive(Debug, Clone, Copy)]
pub struct DeactivationSettings {
    /// Write with the version read just before planning, retrying on conflict.
    pub revalidate_before_write: bool,
    pub max_attempts: u32,
}

impl Default for DeactivationSettings {
    fn default() -> Self {
        Self {
            revalidate_before_write: true,
            max_attempts: 3,
        }
    }
}

/// What happened to one affected pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Updated { reassigned: u64, vacant: usize },
    /// Merged, gone, or no longer reviewed by the team by the time it was read.
    Untouched,
    /// Still conflicting after the last attempt.
    Conflicted,
}

/// Counters accumulated over the batch.
#[derive(Debug, Default)]
struct DeactivationTally {
    reassigned_slots: u64,
    skipped: BTreeSet<String>,
}

impl DeactivationTally {
    fn record(mut self, pull_request_id: &str, outcome: &RequestOutcome) -> Self {
        match outcome {
            RequestOutcome::Updated { reassigned, vacant } => {
                self.reassigned_slots += reassigned;
                if *vacant > 0 {
                    self.skipped.insert(pull_request_id.to_string());
                }
            }
            RequestOutcome::Conflicted => {
                self.skipped.insert(pull_request_id.to_string());
            }
            RequestOutcome::Untouched => {}
        }
        self
    }

    fn finish(self, team_name: &str, deactivated_users: u64) -> TeamDeactivateResult {
        TeamDeactivateResult {
            team_name: team_name.to_string(),
            deactivated_users,
            reassigned_prs: self.reassigned_slots,
            skipped_prs: self.skipped.len() as u64,
        }
    }
}

/// Members captured when the deactivation starts.
struct Snapshot {
    deactivation_set: HashSet<String>,
    member_ids: Vec<String>,
    user_by_id: HashMap<String, User>,
}

/// New reviewer list for one pull request.
struct SlotPlan {
    reviewers: Vec<String>,
    reassigned: u64,
    vacant: usize,
}

/// One team deactivation run.
pub struct TeamDeactivation<'a> {
    store: &'a dyn ReviewStore,
    selector: &'a Selector,
    settings: DeactivationSettings,
}

impl<'a> TeamDeactivation<'a> {
    pub fn new(
        store: &'a dyn ReviewStore,
        selector: &'a Selector,
        settings: DeactivationSettings,
    ) -> Self {
        Self {
            store,
            selector,
            settings,
        }
    }

    /// Deactivate every active member of `team_name`.
    ///
    /// Returns `IncompleteDeactivation` with the committed counters when any
    /// pull request was left with a vacant slot. Nothing is rolled back.
    pub async fn run(
        &self,
        team_name: &str,
        strategy: ReplacementStrategy,
    ) -> Result<TeamDeactivateResult, AppError> {
        let snapshot = self.snapshot(team_name).await?;

        let pr_ids = self
            .store
            .get_open_prs_by_reviewers(&snapshot.member_ids)
            .await?;

        tracing::info!(
            team = %team_name,
            strategy = strategy.as_str(),
            members = snapshot.member_ids.len(),
            pull_requests = pr_ids.len(),
            "Deactivating team"
        );

        let mut authors = AuthorCache::new();
        let mut tally = DeactivationTally::default();
        for pr_id in &pr_ids {
            let outcome = self
                .process_request(pr_id, strategy, &snapshot, &mut authors)
                .await?;
            tally = tally.record(pr_id, &outcome);
        }

        let deactivated = self
            .store
            .bulk_deactivate_by_team(team_name, &snapshot.member_ids)
            .await?;

        let result = tally.finish(team_name, deactivated);

        tracing::info!(
            team = %team_name,
            deactivated_users = result.deactivated_users,
            reassigned_prs = result.reassigned_prs,
            skipped_prs = result.skipped_prs,
            "Team deactivated"
        );

        if result.skipped_prs > 0 {
            return Err(AppError::IncompleteDeactivation(result));
        }
        Ok(result)
    }

    async fn snapshot(&self, team_name: &str) -> Result<Snapshot, AppError> {
        if !self.store.team_exists(team_name).await? {
            return Err(AppError::NotFound(format!("Team {} not found", team_name)));
        }

        let active: Vec<User> = self
            .store
            .get_users_by_team(team_name)
            .await?
            .into_iter()
            .filter(|user| user.is_active)
            .collect();

        if active.is_empty() {
            return Err(AppError::NotFound(format!(
                "Team {} has no active members",
                team_name
            )));
        }

        let member_ids: Vec<String> = active.iter().map(|user| user.user_id.clone()).collect();
        Ok(Snapshot {
            deactivation_set: member_ids.iter().cloned().collect(),
            member_ids,
            user_by_id: active
                .into_iter()
                .map(|user| (user.user_id.clone(), user))
                .collect(),
        })
    }

    async fn process_request(
        &self,
        pull_request_id: &str,
        strategy: ReplacementStrategy,
        snapshot: &Snapshot,
        authors: &mut AuthorCache,
    ) -> Result<RequestOutcome, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let Some(pr) = self.store.get_pr(pull_request_id).await? else {
                return Ok(RequestOutcome::Untouched);
            };
            if pr.status != PullRequestStatus::Open
                || !pr
                    .assigned_reviewers
                    .iter()
                    .any(|id| snapshot.deactivation_set.contains(id))
            {
                return Ok(RequestOutcome::Untouched);
            }

            let plan = self.plan_slots(&pr, strategy, snapshot, authors).await?;

            let expected_version = self.settings.revalidate_before_write.then_some(pr.version);
            match self
                .store
                .update_pr_reviewers(pull_request_id, &plan.reviewers, expected_version)
                .await
            {
                Ok(_) => {
                    return Ok(RequestOutcome::Updated {
                        reassigned: plan.reassigned,
                        vacant: plan.vacant,
                    })
                }
                Err(AppError::Conflict { current_version, .. }) => {
                    if attempt >= self.settings.max_attempts {
                        tracing::warn!(
                            pull_request = %pull_request_id,
                            attempts = attempt,
                            "Giving up on pull request after repeated concurrent changes"
                        );
                        return Ok(RequestOutcome::Conflicted);
                    }
                    tracing::warn!(
                        pull_request = %pull_request_id,
                        attempt,
                        current_version,
                        "Pull request changed during deactivation, recomputing slots"
                    );
                }
                // Merged between the read and the write
                Err(AppError::PrMerged(_)) | Err(AppError::NotFound(_)) => {
                    return Ok(RequestOutcome::Untouched)
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Refill the request's deactivated slots in stored order, keeping each
    /// replacement in the slot it fills.
    async fn plan_slots(
        &self,
        pr: &PullRequest,
        strategy: ReplacementStrategy,
        snapshot: &Snapshot,
        authors: &mut AuthorCache,
    ) -> Result<SlotPlan, AppError> {
        let author = authors.resolve(self.store, &pr.author_id).await?;

        let mut slots: Vec<Option<String>> =
            pr.assigned_reviewers.iter().cloned().map(Some).collect();
        let mut reassigned = 0;
        let mut vacant = 0;

        for index in 0..slots.len() {
            let Some(outgoing) = slots[index]
                .as_ref()
                .and_then(|id| snapshot.user_by_id.get(id))
            else {
                continue;
            };

            slots[index] = None;
            let working_set: Vec<String> = slots.iter().flatten().cloned().collect();

            let ctx = SearchContext {
                outgoing,
                author_id: &pr.author_id,
                author: author.as_ref(),
                working_set: &working_set,
                deactivation_set: &snapshot.deactivation_set,
            };

            let winner = match find_candidates(self.store, strategy, &ctx).await? {
                Some((tier, candidates)) => self
                    .selector
                    .select_random(&candidates, 1)
                    .into_iter()
                    .next()
                    .map(|id| (tier, id)),
                None => None,
            };

            match winner {
                Some((tier, replacement)) => {
                    tracing::debug!(
                        pull_request = %pr.pull_request_id,
                        outgoing = %outgoing.user_id,
                        replacement = %replacement,
                        tier = tier.as_str(),
                        "Reviewer slot reassigned"
                    );
                    slots[index] = Some(replacement);
                    reassigned += 1;
                }
                None => {
                    tracing::warn!(
                        pull_request = %pr.pull_request_id,
                        outgoing = %outgoing.user_id,
                        "No replacement reviewer available, leaving slot vacant"
                    );
                    vacant += 1;
                }
            }
        }

        Ok(SlotPlan {
            reviewers: slots.into_iter().flatten().collect(),
            reassigned,
            vacant,
        })
    }
}
