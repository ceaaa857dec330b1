use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    activity::{Activity, CreateActivity},
    call_note::{CallNote, CallNoteFilters, CreateCallNote, UpdateCallNote},
};
use services::services::{authorization::Actor, validation};
use sqlx::SqlitePool;
use tracing::info;
use utils::{date_range::TimeFilterQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    middleware::CurrentUser,
    routes::{links::Links, resolve_range},
};

async fn load(pool: &SqlitePool, id: Uuid) -> Result<CallNote, ApiError> {
    CallNote::find_by_id(pool, id)
        .await?
        .ok_or(ApiError::NotFound("call note"))
}

async fn load_modifiable(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<CallNote, ApiError> {
    let note = load(pool, id).await?;
    actor.ensure_can_modify(note.user_id)?;
    Ok(note)
}

/// GET /api/call-notes
/// The time filter applies to the call date.
pub async fn list_call_notes(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filters): Query<CallNoteFilters>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<CallNote>>>, ApiError> {
    let range = resolve_range(&time)?;
    let notes = CallNote::list(&state.db().pool, &actor.scope, &filters, range.as_ref()).await?;
    Ok(ResponseJson(ApiResponse::success(notes)))
}

/// POST /api/call-notes
/// Records the note and its `call` activity together.
pub async fn create_call_note(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateCallNote>,
) -> Result<ResponseJson<ApiResponse<CallNote>>, ApiError> {
    validation::non_empty("subject", &payload.subject)?;
    if let Some(minutes) = payload.duration_minutes {
        validation::duration_minutes(minutes)?;
    }
    let pool = &state.db().pool;
    Links {
        customer_id: Some(payload.customer_id),
        company_id: None,
        deal_id: payload.deal_id,
    }
    .ensure_linkable(pool, &actor)
    .await?;

    let mut tx = pool.begin().await?;
    let note = CallNote::create(&mut *tx, &payload, Uuid::new_v4(), actor.id()).await?;
    let activity = Activity::create(
        &mut *tx,
        &CreateActivity::from_call_note(&note),
        Uuid::new_v4(),
        actor.id(),
        Some(note.id),
    )
    .await?;
    tx.commit().await?;

    info!(call_note_id = %note.id, activity_id = %activity.id, customer_id = %note.customer_id, "call note recorded");
    Ok(ResponseJson(ApiResponse::success(note)))
}

/// GET /api/call-notes/{id}
pub async fn get_call_note(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<CallNote>>, ApiError> {
    let note = load(&state.db().pool, id).await?;
    actor.ensure_can_view(note.user_id)?;
    Ok(ResponseJson(ApiResponse::success(note)))
}

/// PUT /api/call-notes/{id}
/// Keeps the linked activity in step.
pub async fn update_call_note(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCallNote>,
) -> Result<ResponseJson<ApiResponse<CallNote>>, ApiError> {
    let pool = &state.db().pool;
    let existing = load_modifiable(pool, &actor, id).await?;
    if let Some(subject) = &payload.subject {
        validation::non_empty("subject", subject)?;
    }
    if let Some(minutes) = payload.duration_minutes {
        validation::duration_minutes(minutes)?;
    }
    Links {
        deal_id: payload.deal_id.flatten(),
        ..Links::default()
    }
    .ensure_linkable(pool, &actor)
    .await?;

    let mut tx = pool.begin().await?;
    let note = CallNote::update(&mut *tx, &payload.apply(existing)).await?;
    Activity::sync_with_call_note(&mut *tx, &note).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(note)))
}

/// DELETE /api/call-notes/{id}
/// The linked activity is removed with it.
pub async fn delete_call_note(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &state.db().pool;
    load_modifiable(pool, &actor, id).await?;
    CallNote::delete(pool, id).await?;
    info!(call_note_id = %id, deleted_by = %actor.id(), "call note deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/call-notes",
        Router::new()
            .route("/", get(list_call_notes).post(create_call_note))
            .route(
                "/{id}",
                get(get_call_note).put(update_call_note).delete(delete_call_note),
            ),
    )
}
