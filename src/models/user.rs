//! User model.

use serde::{Deserialize, Serialize};

use super::PullRequestShort;

/// A user who can author pull requests and review them.
///
/// Team membership is stored on the user record itself; a team is the set of
/// users whose `team_name` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

/// Request body for flipping a user's active flag.
#[derive(Debug, Clone, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

/// Query parameters for listing a user's review queue.
#[derive(Debug, Clone, Deserialize)]
pub struct UserReviewsQuery {
    pub user_id: String,
}

/// Pull requests where a user is currently assigned as a reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviews {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}
