use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use storefront_core::{
    BulkVariantPatch, ListVariantsQuery, NewVariant, StockAdjustment, VariantPatch,
};
use storefront_db::{VariantAggregation, VariantRow, VariantWithOptions};
use storefront_variants::{
    bulk, command, query, BulkCreateSummary, BulkUpdateSummary, DeletedVariant, VariantPage,
};

use crate::middleware::{Principal, RequestId};

use super::{
    extract::{Body, Ids, Params},
    ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct BulkCreateRequest {
    variants: Vec<NewVariant>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkUpdateRequest {
    variants: Vec<BulkVariantPatch>,
}

/// GET /api/v1/products/{product_id}/variants
pub(super) async fn list_product_variants(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
) -> Result<Json<ApiResponse<Vec<VariantWithOptions>>>, ApiError> {
    let variants =
        query::get_product_variants_with_options(&state.pool, product_id, principal.seller_id())
            .await?;
    Ok(ApiResponse::json(variants, req_id))
}

pub(super) async fn create_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
    Body(body): Body<NewVariant>,
) -> Result<(StatusCode, Json<ApiResponse<VariantWithOptions>>), ApiError> {
    let variant =
        command::create_variant(&state.pool, product_id, principal.seller_id(), &body).await?;
    Ok((StatusCode::CREATED, ApiResponse::json(variant, req_id)))
}

/// GET /api/v1/products/{product_id}/variants/find?color=red&size=m
///
/// Every query parameter is an option selection.
pub(super) async fn find_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
    Query(selection): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<VariantWithOptions>>, ApiError> {
    let variant =
        query::find_variant_by_options(&state.pool, product_id, &selection, principal.seller_id())
            .await?;
    Ok(ApiResponse::json(variant, req_id))
}

pub(super) async fn get_aggregation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
) -> Result<Json<ApiResponse<VariantAggregation>>, ApiError> {
    let aggregation =
        query::get_product_variant_aggregation(&state.pool, product_id, principal.seller_id())
            .await?;
    Ok(ApiResponse::json(aggregation, req_id))
}

pub(super) async fn bulk_create(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
    Body(body): Body<BulkCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BulkCreateSummary>>), ApiError> {
    let summary =
        bulk::bulk_create_variants(&state.pool, product_id, principal.seller_id(), &body.variants)
            .await?;
    Ok((StatusCode::CREATED, ApiResponse::json(summary, req_id)))
}

/// PATCH /api/v1/products/{product_id}/variants/bulk
///
/// When several entries set `isDefault`, the last one wins.
pub(super) async fn bulk_update(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
    Body(body): Body<BulkUpdateRequest>,
) -> Result<Json<ApiResponse<BulkUpdateSummary>>, ApiError> {
    let summary =
        bulk::bulk_update_variants(&state.pool, product_id, principal.seller_id(), body.variants)
            .await?;
    Ok(ApiResponse::json(summary, req_id))
}

pub(super) async fn get_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, variant_id)): Ids<(i64, i64)>,
) -> Result<Json<ApiResponse<VariantWithOptions>>, ApiError> {
    let variant =
        query::get_variant_by_id(&state.pool, product_id, variant_id, principal.seller_id())
            .await?;
    Ok(ApiResponse::json(variant, req_id))
}

pub(super) async fn update_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, variant_id)): Ids<(i64, i64)>,
    Body(patch): Body<VariantPatch>,
) -> Result<Json<ApiResponse<VariantWithOptions>>, ApiError> {
    let variant = command::update_variant(
        &state.pool,
        product_id,
        variant_id,
        principal.seller_id(),
        &patch,
    )
    .await?;
    Ok(ApiResponse::json(variant, req_id))
}

pub(super) async fn delete_variant(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, variant_id)): Ids<(i64, i64)>,
) -> Result<Json<ApiResponse<DeletedVariant>>, ApiError> {
    let deleted =
        command::delete_variant(&state.pool, product_id, variant_id, principal.seller_id())
            .await?;
    Ok(ApiResponse::json(deleted, req_id))
}

pub(super) async fn adjust_stock(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids((product_id, variant_id)): Ids<(i64, i64)>,
    Body(adjustment): Body<StockAdjustment>,
) -> Result<Json<ApiResponse<VariantRow>>, ApiError> {
    let variant = command::adjust_variant_stock(
        &state.pool,
        product_id,
        variant_id,
        principal.seller_id(),
        adjustment,
    )
    .await?;
    Ok(ApiResponse::json(variant, req_id))
}

/// GET /api/v1/variants
///
/// Reserved keys control paging, sorting, and column filters; any other key
/// is an option filter (`?color=red`).
pub(super) async fn list_variants(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<VariantPage>>, ApiError> {
    let mut params = Params::from(raw);
    let list_query = ListVariantsQuery {
        page: params.take::<i64>("page")?,
        page_size: params.take::<i64>("pageSize")?,
        sort_by: params.take::<String>("sortBy")?,
        sort_order: params.take::<String>("sortOrder")?,
        ids: params.take_ids("ids")?,
        product_ids: params.take_ids("productIds")?,
        min_price: params.take::<Decimal>("minPrice")?,
        max_price: params.take::<Decimal>("maxPrice")?,
        allow_purchase: params.take::<bool>("allowPurchase")?,
        is_popular: params.take::<bool>("isPopular")?,
        is_default: params.take::<bool>("isDefault")?,
        sku: params.take::<String>("sku")?,
    };
    let option_filters = params.into_rest();

    let page = query::list_variants(
        &state.pool,
        list_query,
        &option_filters,
        principal.seller_id(),
    )
    .await?;
    Ok(ApiResponse::json(page, req_id))
}

/// GET /api/v1/variants/aggregations?productIds=1,2,3
pub(super) async fn list_aggregations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<HashMap<i64, VariantAggregation>>>, ApiError> {
    let mut params = Params::from(raw);
    let product_ids = params.take_ids("productIds")?;
    if product_ids.is_empty() {
        return Err(ApiError::validation("productIds must list at least one id"));
    }
    let aggregations =
        query::get_products_variant_aggregations(&state.pool, &product_ids, principal.seller_id())
            .await?;
    Ok(ApiResponse::json(aggregations, req_id))
}
