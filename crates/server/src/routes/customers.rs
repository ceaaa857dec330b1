use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::customer::{CreateCustomer, Customer, CustomerFilters, UpdateCustomer};
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

pub(crate) async fn load_visible(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Customer, ApiError> {
    let customer = Customer::find_by_id(pool, id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    actor.ensure_can_view(customer.owner_id)?;
    Ok(customer)
}

fn validate_email(email: Option<&str>) -> Result<(), ApiError> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => Ok(validation::email("email", email)?),
        None => Ok(()),
    }
}

/// GET /api/customers
pub async fn list_customers(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filters): Query<CustomerFilters>,
    Query(time): Query<TimeFilterQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Customer>>>, ApiError> {
    let range = resolve_range(&time)?;
    let customers = Customer::list(&state.db().pool, &actor.scope, &filters, range.as_ref()).await?;
    Ok(ResponseJson(ApiResponse::success(customers)))
}

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    validation::non_empty("first_name", &payload.first_name)?;
    validation::non_empty("last_name", &payload.last_name)?;
    validate_email(payload.email.as_deref())?;
    let owner_id = payload.owner_id.unwrap_or(actor.id());
    actor.ensure_can_assign(owner_id)?;
    let pool = &state.db().pool;
    Links::company(payload.company_id).ensure_linkable(pool, &actor).await?;

    let customer = Customer::create(pool, &payload, Uuid::new_v4(), owner_id).await?;
    info!(customer_id = %customer.id, owner_id = %owner_id, "customer created");
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// GET /api/customers/{id}
pub async fn get_customer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = load_visible(&state.db().pool, &actor, id).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// PUT /api/customers/{id}
pub async fn update_customer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let pool = &state.db().pool;
    let existing = Customer::find_by_id(pool, id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    actor.ensure_can_modify(existing.owner_id)?;
    if let Some(owner_id) = payload.owner_id {
        actor.ensure_can_assign(owner_id)?;
    }
    if let Some(first_name) = &payload.first_name {
        validation::non_empty("first_name", first_name)?;
    }
    if let Some(last_name) = &payload.last_name {
        validation::non_empty("last_name", last_name)?;
    }
    if let Some(email) = &payload.email {
        validate_email(email.as_deref())?;
    }
    Links::company(payload.company_id.flatten())
        .ensure_linkable(pool, &actor)
        .await?;

    let customer = Customer::update(pool, &payload.apply(existing)).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// DELETE /api/customers/{id}
/// Call notes go with the customer; deals, tasks and activities are unlinked.
pub async fn delete_customer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &state.db().pool;
    let existing = Customer::find_by_id(pool, id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    actor.ensure_can_modify(existing.owner_id)?;
    Customer::delete(pool, id).await?;
    info!(customer_id = %id, deleted_by = %actor.id(), "customer deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/customers",
        Router::new()
            .route("/", get(list_customers).post(create_customer))
            .route(
                "/{id}",
                get(get_customer).put(update_customer).delete(delete_customer),
            ),
    )
}
