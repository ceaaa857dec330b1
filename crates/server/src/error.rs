use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    auth::AuthError, authorization::AuthorizationError, capacity::CapacityError,
    dashboard::DashboardError, insights::InsightError, validation::ValidationError,
};
use thiserror::Error;
use tracing::error;
use utils::{date_range::DateRangeError, response::ApiResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    DateRange(#[from] DateRangeError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error(transparent)]
    Insight(#[from] InsightError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(e) => database_status(e),
            ApiError::Auth(e) => match e {
                AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::Inactive => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Database(e) => database_status(e),
                AuthError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Authorization(e) => authorization_status(e),
            ApiError::Validation(_) | ApiError::DateRange(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Capacity(e) => match e {
                CapacityError::RangeTooLong(_) => StatusCode::BAD_REQUEST,
                CapacityError::Database(e) => database_status(e),
            },
            ApiError::Dashboard(DashboardError::Database(e)) => database_status(e),
            ApiError::Insight(e) => match e {
                InsightError::Authorization(e) => authorization_status(e),
                InsightError::Ai(_) => StatusCode::BAD_GATEWAY,
                InsightError::Capacity(CapacityError::RangeTooLong(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

fn authorization_status(e: &AuthorizationError) -> StatusCode {
    match e {
        AuthorizationError::Forbidden(_) => StatusCode::FORBIDDEN,
        AuthorizationError::NotFound => StatusCode::NOT_FOUND,
        AuthorizationError::Database(e) => database_status(e),
    }
}

fn database_status(e: &sqlx::Error) -> StatusCode {
    match e {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) if db.is_unique_violation() => StatusCode::CONFLICT,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StatusCode::CONFLICT,
        sqlx::Error::Database(db) if db.is_check_violation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %self, "request failed");
                "internal server error".to_string()
            }
            StatusCode::CONFLICT if matches!(self, ApiError::Database(_)) => {
                "conflicts with an existing or referenced record".to_string()
            }
            StatusCode::NOT_FOUND if matches!(self, ApiError::Database(_)) => "not found".to_string(),
            StatusCode::BAD_GATEWAY => {
                error!(error = %self, "upstream provider failed");
                self.to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
