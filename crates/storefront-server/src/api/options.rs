use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use storefront_core::{NewOption, NewOptionValue, OptionValuePatch};
use storefront_db::{OptionValueRow, OptionWithValues};
use storefront_variants::catalog;

use crate::middleware::{Principal, RequestId};

use super::{
    extract::{Body, Ids},
    ApiError, ApiResponse, AppState, Deleted,
};

#[derive(Debug, Deserialize)]
pub(super) struct AddValuesRequest {
    values: Vec<NewOptionValue>,
}

/// GET /api/v1/products/{product_id}/options, with per-value variant counts.
pub(super) async fn list_options(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
) -> Result<Json<ApiResponse<Vec<OptionWithValues>>>, ApiError> {
    let options =
        catalog::get_available_options(&state.pool, product_id, principal.seller_id()).await?;
    Ok(ApiResponse::json(options, req_id))
}

pub(super) async fn add_option(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
    Body(body): Body<NewOption>,
) -> Result<(StatusCode, Json<ApiResponse<OptionWithValues>>), ApiError> {
    let option = catalog::add_option(&state.pool, product_id, principal.seller_id(), &body).await?;
    Ok((StatusCode::CREATED, ApiResponse::json(option, req_id)))
}

pub(super) async fn delete_option(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, option_id)): Ids<(i64, i64)>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    catalog::delete_option(&state.pool, product_id, option_id, principal.seller_id()).await?;
    Ok(ApiResponse::json(Deleted::new(option_id), req_id))
}

pub(super) async fn add_values(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, option_id)): Ids<(i64, i64)>,
    Body(body): Body<AddValuesRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<OptionValueRow>>>), ApiError> {
    let values = catalog::add_values(
        &state.pool,
        product_id,
        option_id,
        principal.seller_id(),
        &body.values,
    )
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::json(values, req_id)))
}

pub(super) async fn update_value(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, option_id, value_id)): Ids<(i64, i64, i64)>,
    Body(patch): Body<OptionValuePatch>,
) -> Result<Json<ApiResponse<OptionValueRow>>, ApiError> {
    let value = catalog::update_value(
        &state.pool,
        product_id,
        option_id,
        value_id,
        principal.seller_id(),
        &patch,
    )
    .await?;
    Ok(ApiResponse::json(value, req_id))
}

pub(super) async fn delete_value(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, option_id, value_id)): Ids<(i64, i64, i64)>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    catalog::delete_value(
        &state.pool,
        product_id,
        option_id,
        value_id,
        principal.seller_id(),
    )
    .await?;
    Ok(ApiResponse::json(Deleted::new(value_id), req_id))
}
