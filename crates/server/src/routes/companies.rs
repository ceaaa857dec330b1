use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::company::{Company, CreateCompany, UpdateCompany};
use serde::Deserialize;
use services::services::validation;
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::CurrentUser};

#[derive(Debug, Default, Deserialize)]
pub struct CompanySearch {
    pub search: Option<String>,
}

/// GET /api/companies
pub async fn list_companies(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<CompanySearch>,
) -> Result<ResponseJson<ApiResponse<Vec<Company>>>, ApiError> {
    let companies = Company::list(&state.db().pool, &actor.scope, query.search.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(companies)))
}

/// POST /api/companies
pub async fn create_company(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateCompany>,
) -> Result<ResponseJson<ApiResponse<Company>>, ApiError> {
    validation::non_empty("name", &payload.name)?;
    let owner_id = payload.owner_id.unwrap_or(actor.id());
    actor.ensure_can_assign(owner_id)?;

    let company = Company::create(&state.db().pool, &payload, Uuid::new_v4(), owner_id).await?;
    info!(company_id = %company.id, owner_id = %owner_id, "company created");
    Ok(ResponseJson(ApiResponse::success(company)))
}

/// GET /api/companies/{id}
pub async fn get_company(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Company>>, ApiError> {
    let company = Company::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("company"))?;
    actor.ensure_can_view(company.owner_id)?;
    Ok(ResponseJson(ApiResponse::success(company)))
}

/// PUT /api/companies/{id}
pub async fn update_company(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCompany>,
) -> Result<ResponseJson<ApiResponse<Company>>, ApiError> {
    let pool = &state.db().pool;
    let existing = Company::find_by_id(pool, id)
        .await?
        .ok_or(ApiError::NotFound("company"))?;
    actor.ensure_can_modify(existing.owner_id)?;
    if let Some(owner_id) = payload.owner_id {
        actor.ensure_can_assign(owner_id)?;
    }
    if let Some(name) = &payload.name {
        validation::non_empty("name", name)?;
    }

    let company = Company::update(pool, &payload.apply(existing)).await?;
    Ok(ResponseJson(ApiResponse::success(company)))
}

/// DELETE /api/companies/{id}
pub async fn delete_company(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &state.db().pool;
    let existing = Company::find_by_id(pool, id)
        .await?
        .ok_or(ApiError::NotFound("company"))?;
    actor.ensure_can_modify(existing.owner_id)?;
    Company::delete(pool, id).await?;
    info!(company_id = %id, deleted_by = %actor.id(), "company deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/companies",
        Router::new()
            .route("/", get(list_companies).post(create_company))
            .route(
                "/{id}",
                get(get_company).put(update_company).delete(delete_company),
            ),
    )
}
