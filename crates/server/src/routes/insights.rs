use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::Utc;
use db::models::team_insight::TeamInsight;
use serde::Deserialize;
use utils::{
    date_range::{TimeFilter, TimeFilterQuery},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    middleware::CurrentUser,
    routes::{resolve_range, teams::load_team},
};

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// POST /api/insights/teams/{id}/generate
/// Covers the last 30 days unless a time filter is given.
pub async fn generate_insight(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(team_id): Path<Uuid>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<TeamInsight>>, ApiError> {
    let team = load_team(&state.db().pool, team_id).await?;
    let period = match resolve_range(&time)? {
        Some(range) => range,
        None => TimeFilter::Last30Days
            .range(Utc::now())
            .ok_or_else(|| ApiError::BadRequest("could not resolve period".to_string()))?,
    };
    let insight = state.insights().generate(&team, &period, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(insight)))
}

/// GET /api/insights/teams/{id}
/// Newest first.
pub async fn list_insights(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(team_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TeamInsight>>>, ApiError> {
    let team = load_team(&state.db().pool, team_id).await?;
    let insights = state.insights().list(&team, query.limit, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(insights)))
}

/// GET /api/insights/teams/{id}/latest
pub async fn latest_insight(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(team_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Option<TeamInsight>>>, ApiError> {
    let team = load_team(&state.db().pool, team_id).await?;
    let insight = state.insights().latest(&team, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(insight)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/insights/teams/{id}",
        Router::new()
            .route("/", get(list_insights))
            .route("/generate", post(generate_insight))
            .route("/latest", get(latest_insight)),
    )
}
