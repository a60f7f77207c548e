//! Team API endpoints.

use axum::extract::State;

use super::{ApiJson, ApiQuery, ApiResponse, ApiResult};
use crate::models::{DeactivateTeamRequest, Team, TeamDeactivateResult, TeamQuery};
use crate::AppState;

/// POST /team/add - Create a team and upsert its members.
pub async fn add_team(
    State(state): State<AppState>,
    ApiJson(team): ApiJson<Team>,
) -> ApiResult<Team> {
    let team = state.service.create_team(team).await?;
    Ok(ApiResponse::created(team))
}

/// GET /team/get?team_name= - Team with its members.
pub async fn get_team(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TeamQuery>,
) -> ApiResult<Team> {
    let team = state.service.get_team(&query.team_name).await?;
    Ok(ApiResponse::ok(team))
}

/// POST /team/deactivate - Deactivate a team and move its open reviews.
pub async fn deactivate_team(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeactivateTeamRequest>,
) -> ApiResult<TeamDeactivateResult> {
    let result = state
        .service
        .deactivate_team(&request.team_name, request.replacement_strategy.as_deref())
        .await?;
    Ok(ApiResponse::ok(result))
}
