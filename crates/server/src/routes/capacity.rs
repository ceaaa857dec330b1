use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::{DateTime, Duration, Utc};
use db::models::user::User;
use serde::Deserialize;
use services::services::capacity::{CapacityService, TeamCapacityInfo, UserCapacityInfo};
use utils::{
    date_range::{DateRange, TimeFilterQuery},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    middleware::CurrentUser,
    routes::{resolve_range, teams::load_team},
};

/// Weeks shown when a forecast is requested without a range.
const DEFAULT_FORECAST_WEEKS: i64 = 4;

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    /// Any instant in the week; defaults to now
    pub week_start: Option<DateTime<Utc>>,
}

impl WeekQuery {
    fn instant(&self) -> DateTime<Utc> {
        self.week_start.unwrap_or_else(Utc::now)
    }
}

/// GET /api/capacity/me
pub async fn my_capacity(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(week): Query<WeekQuery>,
) -> Result<ResponseJson<ApiResponse<UserCapacityInfo>>, ApiError> {
    let info = CapacityService::user_capacity_info(&state.db().pool, &actor.user, week.instant()).await?;
    Ok(ResponseJson(ApiResponse::success(info)))
}

/// GET /api/capacity/users/{id}
pub async fn user_capacity(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Query(week): Query<WeekQuery>,
) -> Result<ResponseJson<ApiResponse<UserCapacityInfo>>, ApiError> {
    let pool = &state.db().pool;
    actor.ensure_can_view(id)?;
    let user = User::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("user"))?;
    let info = CapacityService::user_capacity_info(pool, &user, week.instant()).await?;
    Ok(ResponseJson(ApiResponse::success(info)))
}

/// GET /api/capacity/users/{id}/forecast
/// Without a time filter, the current week and the three after it.
pub async fn user_forecast(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<UserCapacityInfo>>>, ApiError> {
    let pool = &state.db().pool;
    actor.ensure_can_view(id)?;
    let user = User::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("user"))?;

    let range = match resolve_range(&time)? {
        Some(range) => range,
        None => {
            let this_week = DateRange::week_of(Utc::now());
            DateRange::new(
                this_week.start,
                this_week.start + Duration::weeks(DEFAULT_FORECAST_WEEKS),
            )?
        }
    };
    let forecast = CapacityService::user_capacity_forecast(pool, &user, &range).await?;
    Ok(ResponseJson(ApiResponse::success(forecast)))
}

/// GET /api/capacity/teams/{id}
pub async fn team_capacity(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Query(week): Query<WeekQuery>,
) -> Result<ResponseJson<ApiResponse<TeamCapacityInfo>>, ApiError> {
    let pool = &state.db().pool;
    let team = load_team(pool, id).await?;
    actor.ensure_manager()?;
    actor.ensure_can_manage_team(&team)?;
    let info = CapacityService::team_capacity_info(pool, &team, week.instant()).await?;
    Ok(ResponseJson(ApiResponse::success(info)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/capacity",
        Router::new()
            .route("/me", get(my_capacity))
            .route("/users/{id}", get(user_capacity))
            .route("/users/{id}/forecast", get(user_forecast))
            .route("/teams/{id}", get(team_capacity)),
    )
}
