//! Reviewer statistics model.

use serde::{Deserialize, Serialize};

/// Number of review assignments held by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerStat {
    pub user_id: String,
    pub reviews_count: i64,
}

/// Per-reviewer counts ordered by count descending, plus the grand total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerStats {
    pub stats: Vec<ReviewerStat>,
    pub total_reviews: i64,
}
