//! Statistics API endpoints.

use axum::extract::State;

use super::{ApiResponse, ApiResult};
use crate::models::ReviewerStats;
use crate::AppState;

/// GET /stats/reviewers
pub async fn reviewer_stats(State(state): State<AppState>) -> ApiResult<ReviewerStats> {
    let stats = state.service.get_reviewer_stats().await?;
    Ok(ApiResponse::ok(stats))
}
