//! Request extractors for the authenticated caller.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use services::services::{auth::AuthError, authorization::Actor};
use tracing::Span;

use crate::{AppState, error::ApiError};

/// The caller behind the `Authorization: Bearer <token>` header, with their
/// visibility scope resolved.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Actor);

impl std::ops::Deref for CurrentUser {
    type Target = Actor;

    fn deref(&self) -> &Actor {
        &self.0
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::InvalidToken)?;
        let pool = &state.db().pool;
        let user = state.auth().authenticate(pool, token).await?;
        Span::current().record("user_id", tracing::field::display(user.id));
        let actor = Actor::resolve(pool, user).await?;
        Ok(CurrentUser(actor))
    }
}
