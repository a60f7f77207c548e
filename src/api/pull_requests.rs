//! Pull request API endpoints.

use axum::extract::State;

use super::{ApiJson, ApiResponse, ApiResult};
use crate::models::{
    CreatePullRequestRequest, MergePullRequestRequest, PullRequest, ReassignResult,
    ReassignReviewerRequest,
};
use crate::AppState;

/// POST /pullRequest/create - Open a pull request and assign reviewers.
pub async fn create_pull_request(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreatePullRequestRequest>,
) -> ApiResult<PullRequest> {
    let pr = state.service.create_pull_request(request).await?;
    Ok(ApiResponse::created(pr))
}

/// POST /pullRequest/merge - Idempotent merge.
pub async fn merge_pull_request(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MergePullRequestRequest>,
) -> ApiResult<PullRequest> {
    let pr = state
        .service
        .merge_pull_request(&request.pull_request_id)
        .await?;
    Ok(ApiResponse::ok(pr))
}

/// POST /pullRequest/reassign - Replace one reviewer from the same team.
pub async fn reassign_reviewer(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReassignReviewerRequest>,
) -> ApiResult<ReassignResult> {
    let result = state
        .service
        .reassign_reviewer(&request.pull_request_id, &request.old_user_id)
        .await?;
    Ok(ApiResponse::ok(result))
}
