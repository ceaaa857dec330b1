use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::activity::{Activity, ActivityFilters, CreateActivity};
use services::services::validation;
use tracing::info;
use utils::{date_range::TimeFilterQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    middleware::CurrentUser,
    routes::{links::Links, resolve_range},
};

/// GET /api/activities
/// The time filter applies to when the activity happened.
pub async fn list_activities(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filters): Query<ActivityFilters>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Activity>>>, ApiError> {
    let range = resolve_range(&time)?;
    let activities = Activity::list(&state.db().pool, &actor.scope, &filters, range.as_ref()).await?;
    Ok(ResponseJson(ApiResponse::success(activities)))
}

/// POST /api/activities
/// Activities are always logged by the caller.
pub async fn create_activity(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateActivity>,
) -> Result<ResponseJson<ApiResponse<Activity>>, ApiError> {
    validation::non_empty("description", &payload.description)?;
    if let Some(minutes) = payload.duration_minutes {
        validation::duration_minutes(minutes)?;
    }
    let pool = &state.db().pool;
    Links {
        customer_id: payload.customer_id,
        company_id: payload.company_id,
        deal_id: payload.deal_id,
    }
    .ensure_linkable(pool, &actor)
    .await?;

    let activity = Activity::create(pool, &payload, Uuid::new_v4(), actor.id(), None).await?;
    info!(activity_id = %activity.id, activity_type = %activity.activity_type, "activity logged");
    Ok(ResponseJson(ApiResponse::success(activity)))
}

/// GET /api/activities/{id}
pub async fn get_activity(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Activity>>, ApiError> {
    let activity = Activity::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    actor.ensure_can_view(activity.user_id)?;
    Ok(ResponseJson(ApiResponse::success(activity)))
}

/// DELETE /api/activities/{id}
/// Activities recorded for a call note go away with the note, not on their own.
pub async fn delete_activity(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &state.db().pool;
    let activity = Activity::find_by_id(pool, id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    actor.ensure_can_modify(activity.user_id)?;
    if activity.call_note_id.is_some() {
        return Err(ApiError::Conflict(
            "activity belongs to a call note; delete the call note instead".to_string(),
        ));
    }
    Activity::delete(pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/activities",
        Router::new()
            .route("/", get(list_activities).post(create_activity))
            .route("/{id}", get(get_activity).delete(delete_activity)),
    )
}
