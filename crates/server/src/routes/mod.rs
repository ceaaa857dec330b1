use axum::{Router, http::Request};
use chrono::Utc;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::field::Empty;
use utils::date_range::{DateRange, TimeFilterQuery};

use crate::{AppState, error::ApiError};

pub mod activities;
pub mod auth;
pub mod call_notes;
pub mod capacity;
pub mod companies;
pub mod customers;
pub mod dashboard;
pub mod deals;
pub mod health;
pub mod insights;
mod links;
pub mod tasks;
pub mod teams;
pub mod users;

/// The complete application: every route under `/api` plus tracing and CORS.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router(&state))
        .merge(auth::router(&state))
        .merge(users::router(&state))
        .merge(teams::router(&state))
        .merge(customers::router(&state))
        .merge(companies::router(&state))
        .merge(deals::router(&state))
        .merge(tasks::router(&state))
        .merge(call_notes::router(&state))
        .merge(activities::router(&state))
        .merge(capacity::router(&state))
        .merge(dashboard::router(&state))
        .merge(insights::router(&state));

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        tracing::info_span!(
            "http",
            method = %request.method(),
            path = %request.uri().path(),
            request_id,
            user_id = Empty,
        )
    });

    Router::new()
        .nest("/api", api)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolve list/report time filters against the current time.
pub(crate) fn resolve_range(query: &TimeFilterQuery) -> Result<Option<DateRange>, ApiError> {
    Ok(query.resolve(Utc::now())?)
}
