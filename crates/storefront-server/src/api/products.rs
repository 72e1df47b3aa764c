use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use storefront_core::{NewProduct, ProductPatch};
use storefront_db::ProductRow;
use storefront_variants::{products, ProductDetail, ProductPage};

use crate::middleware::{Principal, RequestId};

use super::{
    extract::{Body, Ids, Params},
    ApiError, ApiResponse, AppState, Deleted,
};

/// POST /api/v1/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Body(body): Body<NewProduct>,
) -> Result<(StatusCode, Json<ApiResponse<ProductDetail>>), ApiError> {
    let detail = products::create_product(&state.pool, principal.seller_id(), &body).await?;
    Ok((StatusCode::CREATED, ApiResponse::json(detail, req_id)))
}

/// GET /api/v1/products?page=&pageSize=
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<ProductPage>>, ApiError> {
    let mut params = Params::from(query);
    let page = params.take::<i64>("page")?;
    let page_size = params.take::<i64>("pageSize")?;
    let data = products::list_products(&state.pool, principal.seller_id(), page, page_size).await?;
    Ok(ApiResponse::json(data, req_id))
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    let detail = products::get_product_detail(&state.pool, product_id, principal.seller_id()).await?;
    Ok(ApiResponse::json(detail, req_id))
}

pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
    Body(patch): Body<ProductPatch>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let row =
        products::update_product(&state.pool, product_id, principal.seller_id(), &patch).await?;
    Ok(ApiResponse::json(row, req_id))
}

/// DELETE /api/v1/products/{product_id} removes the product with all of its
/// options, values, and variants.
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Ids(product_id): Ids<i64>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    products::delete_product(&state.pool, product_id, principal.seller_id()).await?;
    Ok(ApiResponse::json(Deleted::new(product_id), req_id))
}
