//! Team operations.

use std::collections::HashSet;

use super::{require, ReviewService};
use crate::assignment::TeamDeactivation;
use crate::errors::AppError;
use crate::models::{ReplacementStrategy, Team, TeamDeactivateResult};

impl ReviewService {
    /// Create a team and upsert its members. Members already on another team
    /// move to this one.
    pub async fn create_team(&self, team: Team) -> Result<Team, AppError> {
        require(&team.team_name, "team_name")?;
        let mut seen = HashSet::new();
        for member in &team.members {
            require(&member.user_id, "user_id")?;
            if !seen.insert(member.user_id.as_str()) {
                return Err(AppError::Validation(format!(
                    "Duplicate member {} in team {}",
                    member.user_id, team.team_name
                )));
            }
        }

        self.within_deadline(async {
            self.store.create_team(&team).await?;
            tracing::info!(team = %team.team_name, members = team.members.len(), "Team created");

            self.store.get_team(&team.team_name).await?.ok_or_else(|| {
                AppError::Internal(format!("Team {} missing after creation", team.team_name))
            })
        })
        .await
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        self.within_deadline(async {
            self.store
                .get_team(team_name)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Team {} not found", team_name)))
        })
        .await
    }

    /// Deactivate every active member of a team and move their open reviews.
    ///
    /// `strategy` is the raw wire value; absent or empty means same-team.
    pub async fn deactivate_team(
        &self,
        team_name: &str,
        strategy: Option<&str>,
    ) -> Result<TeamDeactivateResult, AppError> {
        let strategy = ReplacementStrategy::normalize(strategy)
            .ok_or_else(|| AppError::NoCandidate("invalid replacement strategy".to_string()))?;

        let deactivation = TeamDeactivation::new(self.store(), &self.selector, self.deactivation);
        self.within_deadline(deactivation.run(team_name, strategy))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{add_team, service};
    use super::*;
    use crate::models::TeamMember;

    #[tokio::test]
    async fn test_create_and_get_team() {
        let service = service();
        add_team(&service, "backend", &[("u2", true), ("u1", false)]).await;

        let team = service.get_team("backend").await.unwrap();
        let ids: Vec<&str> = team.members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);

        let err = service
            .create_team(Team {
                team_name: "backend".to_string(),
                members: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TeamExists(_)));

        let err = service.get_team("nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_members_are_rejected() {
        let member = TeamMember {
            user_id: "u1".to_string(),
            username: "Alice".to_string(),
            is_active: true,
        };
        let err = service()
            .create_team(Team {
                team_name: "backend".to_string(),
                members: vec![member.clone(), member],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_strategy_is_no_candidate() {
        let service = service();
        add_team(&service, "backend", &[("u1", true)]).await;

        let err = service
            .deactivate_team("backend", Some("random"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoCandidate(ref msg) if msg == "invalid replacement strategy"));
        // Nothing happened
        assert!(service.store().get_user("u1").await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_blank_or_padded_strategy_is_rejected() {
        let service = service();
        add_team(&service, "backend", &[("u1", true), ("u2", true)]).await;

        for raw in ["  ", " author_team", "same_team\n"] {
            let err = service
                .deactivate_team("backend", Some(raw))
                .await
                .unwrap_err();
            assert!(
                matches!(err, AppError::NoCandidate(ref msg) if msg == "invalid replacement strategy")
            );
        }

        let team = service.get_team("backend").await.unwrap();
        assert!(team.members.iter().all(|m| m.is_active));
    }

    #[tokio::test]
    async fn test_deactivation_conservation() {
        let service = service();
        add_team(&service, "backend", &[("u1", true), ("u2", true), ("u3", false)]).await;
        add_team(&service, "platform", &[("p1", true)]).await;

        let result = service.deactivate_team("backend", None).await.unwrap();

        assert_eq!(result.team_name, "backend");
        assert_eq!(result.deactivated_users, 2);
        let team = service.get_team("backend").await.unwrap();
        assert!(team.members.iter().all(|m| !m.is_active));
        assert!(service.store().get_user("p1").await.unwrap().unwrap().is_active);
    }
}
