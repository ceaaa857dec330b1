use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    team::{CreateTeam, Team, UpdateTeam},
    user::User,
};
use services::services::{authorization::Actor, validation};
use sqlx::SqlitePool;
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::CurrentUser};

pub(crate) async fn load_team(pool: &SqlitePool, id: Uuid) -> Result<Team, ApiError> {
    Team::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("team"))
}

/// Teams the caller may not see are reported as missing.
async fn load_visible(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Team, ApiError> {
    let team = load_team(pool, id).await?;
    if !actor.can_view_team(&team) {
        return Err(ApiError::NotFound("team"));
    }
    Ok(team)
}

async fn ensure_lead_exists(pool: &SqlitePool, lead_id: Option<Uuid>) -> Result<(), ApiError> {
    let Some(lead_id) = lead_id else {
        return Ok(());
    };
    match User::find_by_id(pool, lead_id).await? {
        Some(user) if user.role.is_manager() && user.is_active => Ok(()),
        Some(_) => Err(ApiError::BadRequest(
            "team lead must be an active admin or sales lead".to_string(),
        )),
        None => Err(ApiError::BadRequest(format!("user {lead_id} does not exist"))),
    }
}

/// GET /api/teams
pub async fn list_teams(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<Team>>>, ApiError> {
    let teams = Team::find_all(&state.db().pool)
        .await?
        .into_iter()
        .filter(|t| actor.can_view_team(t))
        .collect();
    Ok(ResponseJson(ApiResponse::success(teams)))
}

/// POST /api/teams
pub async fn create_team(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    actor.ensure_admin()?;
    validation::non_empty("name", &payload.name)?;
    let pool = &state.db().pool;
    ensure_lead_exists(pool, payload.lead_id).await?;

    let team = Team::create(pool, &payload, Uuid::new_v4()).await?;
    info!(team_id = %team.id, created_by = %actor.id(), "team created");
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// GET /api/teams/{id}
pub async fn get_team(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = load_visible(&state.db().pool, &actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// PUT /api/teams/{id}
/// Leads may rename their own teams; only admins reassign the lead.
pub async fn update_team(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let pool = &state.db().pool;
    let team = load_team(pool, id).await?;
    actor.ensure_can_manage_team(&team)?;
    if let Some(lead_id) = payload.lead_id {
        actor.ensure_admin()?;
        ensure_lead_exists(pool, lead_id).await?;
    }
    if let Some(name) = &payload.name {
        validation::non_empty("name", name)?;
    }

    let team = Team::update(pool, &payload.apply(team)).await?;
    info!(team_id = %team.id, updated_by = %actor.id(), "team updated");
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// DELETE /api/teams/{id}
/// Members stay, without a team.
pub async fn delete_team(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    actor.ensure_admin()?;
    if Team::delete(&state.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("team"));
    }
    info!(team_id = %id, deleted_by = %actor.id(), "team deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/teams/{id}/members
pub async fn list_members(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let pool = &state.db().pool;
    let team = load_visible(pool, &actor, id).await?;
    let members = User::find_by_team(pool, team.id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/teams",
        Router::new()
            .route("/", get(list_teams).post(create_team))
            .route("/{id}", get(get_team).put(update_team).delete(delete_team))
            .route("/{id}/members", get(list_members)),
    )
}
