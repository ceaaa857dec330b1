use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use services::services::{
    authorization::Scope,
    dashboard::{DashboardService, DashboardSummary},
};
use utils::{date_range::TimeFilterQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::CurrentUser, routes::resolve_range};

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// Narrow the summary to one user inside the caller's scope
    pub user_id: Option<Uuid>,
}

/// GET /api/dashboard/summary
pub async fn summary(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<SummaryQuery>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<DashboardSummary>>, ApiError> {
    let range = resolve_range(&time)?;
    let scope = match query.user_id {
        Some(user_id) => {
            actor.ensure_can_view(user_id)?;
            Scope::single(user_id)
        }
        None => actor.scope.clone(),
    };
    let summary =
        DashboardService::summary(&state.db().pool, &scope, range.as_ref(), Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/dashboard/summary", get(summary))
}
