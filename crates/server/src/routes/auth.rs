use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::User;
use serde::Deserialize;
use services::services::{
    auth::{AuthError, LoginRequest, LoginResponse, hash_password, verify_password},
    validation,
};
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, middleware::CurrentUser};

#[derive(Debug, Deserialize, TS)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    let response = state
        .auth()
        .login(&state.db().pool, payload.email.trim(), &payload.password)
        .await?;
    Ok(ResponseJson(ApiResponse::success(response)))
}

/// GET /api/auth/me
pub async fn me(CurrentUser(actor): CurrentUser) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(actor.user)))
}

/// POST /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if !verify_password(&payload.current_password, &actor.user.password_hash) {
        return Err(AuthError::InvalidCredentials.into());
    }
    validation::password(&payload.new_password)?;

    let password_hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db().pool, actor.id(), &password_hash).await?;
    info!(user_id = %actor.id(), "password changed");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/login", post(login))
            .route("/me", get(me))
            .route("/password", post(change_password)),
    )
}
