//! User API endpoints.

use axum::extract::State;

use super::{ApiJson, ApiQuery, ApiResponse, ApiResult};
use crate::models::{SetIsActiveRequest, User, UserReviews, UserReviewsQuery};
use crate::AppState;

/// POST /users/setIsActive
pub async fn set_is_active(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SetIsActiveRequest>,
) -> ApiResult<User> {
    let user = state
        .service
        .set_user_is_active(&request.user_id, request.is_active)
        .await?;
    Ok(ApiResponse::ok(user))
}

/// GET /users/getReview?user_id=
pub async fn get_review(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserReviewsQuery>,
) -> ApiResult<UserReviews> {
    let reviews = state.service.get_user_reviews(&query.user_id).await?;
    Ok(ApiResponse::ok(reviews))
}
