//! Team model and the team deactivation contract.

use serde::{Deserialize, Serialize};

use super::User;

/// A member entry as submitted with, or listed under, a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A team with its members ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

impl Team {
    /// Member entries as user records affiliated with this team.
    pub fn member_users(&self) -> Vec<User> {
        self.members
            .iter()
            .map(|member| User {
                user_id: member.user_id.clone(),
                username: member.username.clone(),
                team_name: self.team_name.clone(),
                is_active: member.is_active,
            })
            .collect()
    }
}

/// Query parameters for looking a team up by name.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamQuery {
    pub team_name: String,
}

/// Where bulk deactivation looks first for a replacement reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementStrategy {
    /// Outgoing reviewer's own team first, then the author's team.
    SameTeam,
    /// Author's team first.
    AuthorTeam,
}

impl ReplacementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplacementStrategy::SameTeam => "same_team",
            ReplacementStrategy::AuthorTeam => "author_team",
        }
    }

    /// Normalize a raw strategy value. Absent or empty means `SameTeam`;
    /// anything else, padded or blank values included, yields `None`.
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        match raw {
            None | Some("") => Some(ReplacementStrategy::SameTeam),
            Some("same_team") => Some(ReplacementStrategy::SameTeam),
            Some("author_team") => Some(ReplacementStrategy::AuthorTeam),
            Some(_) => None,
        }
    }
}

/// Request body for deactivating a whole team.
#[derive(Debug, Clone, Deserialize)]
pub struct DeactivateTeamRequest {
    pub team_name: String,
    /// Kept as a raw string so unknown values surface as a domain error
    /// instead of a body rejection.
    #[serde(default)]
    pub replacement_strategy: Option<String>,
}

/// Aggregate counters of one team deactivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDeactivateResult {
    pub team_name: String,
    pub deactivated_users: u64,
    /// Reviewer slots that received a replacement.
    pub reassigned_prs: u64,
    /// Open pull requests left with at least one vacant slot.
    pub skipped_prs: u64,
}
