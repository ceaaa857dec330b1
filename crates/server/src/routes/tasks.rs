use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use chrono::Utc;
use db::models::task::{CreateTask, Task, TaskFilters, TaskStatus, UpdateTask};
use serde::Deserialize;
use services::services::{authorization::Actor, validation};
use sqlx::SqlitePool;
use tracing::info;
use ts_rs::TS;
use utils::{date_range::TimeFilterQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    middleware::CurrentUser,
    routes::{links::Links, resolve_range},
};

#[derive(Debug, Deserialize, TS)]
pub struct StatusChange {
    pub status: TaskStatus,
}

async fn load(pool: &SqlitePool, id: Uuid) -> Result<Task, ApiError> {
    Task::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("task"))
}

async fn load_modifiable(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Task, ApiError> {
    let task = load(pool, id).await?;
    actor.ensure_can_modify(task.assignee_id)?;
    Ok(task)
}

/// GET /api/tasks
/// The time filter applies to due dates.
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filters): Query<TaskFilters>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let range = resolve_range(&time)?;
    let tasks = Task::list(&state.db().pool, &actor.scope, &filters, range.as_ref()).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

/// GET /api/tasks/overdue
pub async fn list_overdue(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::find_overdue(&state.db().pool, &actor.scope, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    validation::non_empty("title", &payload.title)?;
    if let Some(hours) = payload.estimated_hours {
        validation::non_negative("estimated_hours", hours)?;
    }
    let assignee_id = payload.assignee_id.unwrap_or(actor.id());
    actor.ensure_can_assign(assignee_id)?;
    let pool = &state.db().pool;
    Links {
        customer_id: payload.customer_id,
        company_id: None,
        deal_id: payload.deal_id,
    }
    .ensure_linkable(pool, &actor)
    .await?;

    let task = Task::create(pool, &payload, Uuid::new_v4(), assignee_id, actor.id()).await?;
    info!(task_id = %task.id, assignee_id = %assignee_id, "task created");
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = load(&state.db().pool, id).await?;
    actor.ensure_can_view(task.assignee_id)?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let pool = &state.db().pool;
    let existing = load_modifiable(pool, &actor, id).await?;
    if let Some(assignee_id) = payload.assignee_id {
        actor.ensure_can_assign(assignee_id)?;
    }
    if let Some(title) = &payload.title {
        validation::non_empty("title", title)?;
    }
    if let Some(hours) = payload.estimated_hours {
        validation::non_negative("estimated_hours", hours)?;
    }
    Links {
        customer_id: payload.customer_id.flatten(),
        company_id: None,
        deal_id: payload.deal_id.flatten(),
    }
    .ensure_linkable(pool, &actor)
    .await?;

    let task = Task::update(pool, &payload.apply(existing, Utc::now())).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// PUT /api/tasks/{id}/status
pub async fn change_status(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChange>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let pool = &state.db().pool;
    let existing = load_modifiable(pool, &actor, id).await?;
    let task = Task::update(pool, &existing.with_status(payload.status, Utc::now())).await?;
    info!(task_id = %id, status = %task.status, "task status changed");
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &state.db().pool;
    load_modifiable(pool, &actor, id).await?;
    Task::delete(pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/tasks",
        Router::new()
            .route("/", get(list_tasks).post(create_task))
            .route("/overdue", get(list_overdue))
            .route("/{id}", get(get_task).put(update_task).delete(delete_task))
            .route("/{id}/status", put(change_status)),
    )
}
