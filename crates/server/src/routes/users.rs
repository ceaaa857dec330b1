use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    team::Team,
    user::{CreateUser, UpdateUser, User},
};
use services::services::{auth::hash_password, authorization::Actor, validation};
use sqlx::SqlitePool;
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::CurrentUser};

async fn load_visible(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<User, ApiError> {
    let user = User::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("user"))?;
    actor.ensure_can_view(user.id)?;
    Ok(user)
}

async fn ensure_team_exists(pool: &SqlitePool, team_id: Option<Uuid>) -> Result<(), ApiError> {
    let Some(team_id) = team_id else {
        return Ok(());
    };
    if Team::find_by_id(pool, team_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!("team {team_id} does not exist")));
    }
    Ok(())
}

/// GET /api/users
/// Everyone in the caller's scope.
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = User::find_all(&state.db().pool)
        .await?
        .into_iter()
        .filter(|u| actor.can_view(u.id))
        .collect();
    Ok(ResponseJson(ApiResponse::success(users)))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    actor.ensure_admin()?;
    validation::non_empty("name", &payload.name)?;
    validation::email("email", &payload.email)?;
    validation::password(&payload.password)?;
    if let Some(hours) = payload.weekly_capacity_hours {
        validation::weekly_hours(hours)?;
    }
    let pool = &state.db().pool;
    ensure_team_exists(pool, payload.team_id).await?;
    if User::find_by_email(pool, &payload.email).await?.is_some() {
        return Err(ApiError::Conflict("a user with this email already exists".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = User::create(
        pool,
        &payload,
        Uuid::new_v4(),
        &password_hash,
        state.config().default_weekly_capacity_hours,
    )
    .await?;
    info!(user_id = %user.id, role = %user.role, created_by = %actor.id(), "user created");
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = load_visible(&state.db().pool, &actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// PUT /api/users/{id}
/// Admins may change anything. Other users may change their own name and
/// email only; their password goes through `POST /api/auth/password`.
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let pool = &state.db().pool;
    let privileged = payload.role.is_some()
        || payload.team_id.is_some()
        || payload.weekly_capacity_hours.is_some()
        || payload.is_active.is_some()
        || payload.password.is_some();
    if id != actor.id() || privileged {
        actor.ensure_admin()?;
    }

    let existing = User::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("user"))?;
    if let Some(name) = &payload.name {
        validation::non_empty("name", name)?;
    }
    if let Some(email) = &payload.email {
        validation::email("email", email)?;
        let taken = User::find_by_email(pool, email).await?.is_some_and(|other| other.id != id);
        if taken {
            return Err(ApiError::Conflict("a user with this email already exists".to_string()));
        }
    }
    if let Some(hours) = payload.weekly_capacity_hours {
        validation::weekly_hours(hours)?;
    }
    if let Some(password) = &payload.password {
        validation::password(password)?;
    }
    if let Some(team_id) = payload.team_id {
        ensure_team_exists(pool, team_id).await?;
    }
    if id == actor.id() && payload.is_active == Some(false) {
        return Err(ApiError::BadRequest("you cannot deactivate yourself".to_string()));
    }

    let password_hash = payload.password.as_deref().map(hash_password).transpose()?;
    let mut tx = pool.begin().await?;
    let user = User::update(&mut *tx, &payload.apply(existing)).await?;
    if let Some(password_hash) = &password_hash {
        User::update_password(&mut *tx, id, password_hash).await?;
    }
    tx.commit().await?;
    info!(user_id = %id, updated_by = %actor.id(), "user updated");
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// DELETE /api/users/{id}
/// Users own CRM records, so they are deactivated instead of removed.
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    actor.ensure_admin()?;
    if id == actor.id() {
        return Err(ApiError::BadRequest("you cannot deactivate yourself".to_string()));
    }
    if User::deactivate(&state.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("user"));
    }
    info!(user_id = %id, deactivated_by = %actor.id(), "user deactivated");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/users",
        Router::new()
            .route("/", get(list_users).post(create_user))
            .route("/{id}", get(get_user).put(update_user).delete(delete_user)),
    )
}
