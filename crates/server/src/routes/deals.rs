use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use chrono::Utc;
use db::models::deal::{CreateDeal, Deal, DealFilters, DealStage, UpdateDeal};
use serde::Deserialize;
use services::services::{
    authorization::Actor,
    dashboard::{DashboardService, PipelineOverview},
    validation,
};
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
pub struct StageChange {
    pub stage: DealStage,
    /// Defaults to the stage's standard probability
    pub probability: Option<i32>,
}

async fn load_visible(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Deal, ApiError> {
    let deal = Deal::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("deal"))?;
    actor.ensure_can_view(deal.owner_id)?;
    Ok(deal)
}

async fn load_modifiable(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Deal, ApiError> {
    let deal = Deal::find_by_id(pool, id).await?.ok_or(ApiError::NotFound("deal"))?;
    actor.ensure_can_modify(deal.owner_id)?;
    Ok(deal)
}

/// GET /api/deals
pub async fn list_deals(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filters): Query<DealFilters>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Deal>>>, ApiError> {
    let range = resolve_range(&time)?;
    let deals = Deal::list(&state.db().pool, &actor.scope, &filters, range.as_ref()).await?;
    Ok(ResponseJson(ApiResponse::success(deals)))
}

/// GET /api/deals/pipeline
pub async fn pipeline(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<ResponseJson<ApiResponse<PipelineOverview>>, ApiError> {
    let overview = DashboardService::pipeline(&state.db().pool, &actor.scope).await?;
    Ok(ResponseJson(ApiResponse::success(overview)))
}

/// POST /api/deals
pub async fn create_deal(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateDeal>,
) -> Result<ResponseJson<ApiResponse<Deal>>, ApiError> {
    validation::non_empty("title", &payload.title)?;
    validation::non_negative("value", payload.value)?;
    if let Some(probability) = payload.probability {
        validation::probability(probability)?;
    }
    let owner_id = payload.owner_id.unwrap_or(actor.id());
    actor.ensure_can_assign(owner_id)?;
    let pool = &state.db().pool;
    Links {
        customer_id: payload.customer_id,
        company_id: payload.company_id,
        deal_id: None,
    }
    .ensure_linkable(pool, &actor)
    .await?;

    let deal = Deal::create(pool, &payload, Uuid::new_v4(), owner_id).await?;
    info!(deal_id = %deal.id, stage = %deal.stage, value = deal.value, "deal created");
    Ok(ResponseJson(ApiResponse::success(deal)))
}

/// GET /api/deals/{id}
pub async fn get_deal(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Deal>>, ApiError> {
    let deal = load_visible(&state.db().pool, &actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(deal)))
}

/// PUT /api/deals/{id}
pub async fn update_deal(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeal>,
) -> Result<ResponseJson<ApiResponse<Deal>>, ApiError> {
    let pool = &state.db().pool;
    let existing = load_modifiable(pool, &actor, id).await?;
    if let Some(owner_id) = payload.owner_id {
        actor.ensure_can_assign(owner_id)?;
    }
    if let Some(title) = &payload.title {
        validation::non_empty("title", title)?;
    }
    if let Some(value) = payload.value {
        validation::non_negative("value", value)?;
    }
    if let Some(probability) = payload.probability {
        validation::probability(probability)?;
    }
    Links {
        customer_id: payload.customer_id.flatten(),
        company_id: payload.company_id.flatten(),
        deal_id: None,
    }
    .ensure_linkable(pool, &actor)
    .await?;

    let deal = Deal::update(pool, &payload.apply(existing, Utc::now())).await?;
    Ok(ResponseJson(ApiResponse::success(deal)))
}

/// PUT /api/deals/{id}/stage
pub async fn change_stage(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StageChange>,
) -> Result<ResponseJson<ApiResponse<Deal>>, ApiError> {
    if let Some(probability) = payload.probability {
        validation::probability(probability)?;
    }
    let pool = &state.db().pool;
    let existing = load_modifiable(pool, &actor, id).await?;
    let from = existing.stage;

    let patch = UpdateDeal {
        stage: Some(payload.stage),
        probability: payload.probability,
        ..Default::default()
    };
    let deal = Deal::update(pool, &patch.apply(existing, Utc::now())).await?;
    info!(deal_id = %id, %from, to = %deal.stage, "deal stage changed");
    Ok(ResponseJson(ApiResponse::success(deal)))
}

/// DELETE /api/deals/{id}
pub async fn delete_deal(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &state.db().pool;
    load_modifiable(pool, &actor, id).await?;
    Deal::delete(pool, id).await?;
    info!(deal_id = %id, deleted_by = %actor.id(), "deal deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/deals",
        Router::new()
            .route("/", get(list_deals).post(create_deal))
            .route("/pipeline", get(pipeline))
            .route("/{id}", get(get_deal).put(update_deal).delete(delete_deal))
            .route("/{id}/stage", put(change_stage)),
    )
}
