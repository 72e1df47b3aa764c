//! Read-side variant projections.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sqlx::PgPool;
use storefront_core::{
    normalize_selection, validate::validate_variant_options_structure, CatalogError,
    CatalogResult, CombinationKey, ErrorCode, ListVariantsQuery, VariantListRequest,
};
use storefront_db::{products, read_models, variants, VariantAggregation, VariantWithOptions};

use crate::ownership::{ownership_guard, Access};

/// One page of a filtered variant listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPage {
    pub items: Vec<VariantWithOptions>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` or `VARIANT_NOT_FOUND` for unknown or foreign ids.
pub async fn get_variant_by_id(
    pool: &PgPool,
    product_id: i64,
    variant_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<VariantWithOptions> {
    ownership_guard(pool, product_id, seller_id, Access::Read).await?;
    variants::find_variant_by_id(pool, product_id, variant_id).await?;
    read_models::get_variants_with_options_by_ids(pool, &[variant_id])
        .await?
        .pop()
        .ok_or_else(|| CatalogError::variant_not_found(variant_id))
}

/// Look up the variant holding exactly `selection`.
///
/// Names and values are normalised the same way they are stored, so
/// `Color=Red` finds the `color:red` variant.
///
/// # Errors
///
/// - `VALIDATION_ERROR` for an empty selection or blank entries.
/// - `VARIANT_NOT_FOUND` with `details.availableOptions` when nothing matches.
pub async fn find_variant_by_options(
    pool: &PgPool,
    product_id: i64,
    selection: &BTreeMap<String, String>,
    seller_id: Option<i64>,
) -> CatalogResult<VariantWithOptions> {
    ownership_guard(pool, product_id, seller_id, Access::Read).await?;
    validate_variant_options_structure(selection)?;
    let normalized = normalize_selection(selection)?;

    let Some(variant_id) =
        variants::find_variant_by_options(pool, product_id, &normalized).await?
    else {
        let available: BTreeMap<String, Vec<String>> =
            read_models::get_options_with_variant_counts(pool, product_id)
                .await?
                .into_iter()
                .map(|o| (o.option.name, o.values.into_iter().map(|v| v.value).collect()))
                .collect();
        let key = CombinationKey::from_selection(&normalized);
        return Err(CatalogError::new(
            ErrorCode::VariantNotFound,
            format!("no variant matches options [{key}]"),
        )
        .with_details(serde_json::json!({ "availableOptions": available })));
    };

    read_models::get_variants_with_options_by_ids(pool, &[variant_id])
        .await?
        .pop()
        .ok_or_else(|| CatalogError::variant_not_found(variant_id))
}

/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` for unknown or foreign products.
pub async fn get_product_variants_with_options(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<Vec<VariantWithOptions>> {
    ownership_guard(pool, product_id, seller_id, Access::Read).await?;
    Ok(read_models::get_product_variants_with_options(pool, product_id).await?)
}

/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` for unknown or foreign products.
pub async fn get_product_variant_aggregation(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<VariantAggregation> {
    ownership_guard(pool, product_id, seller_id, Access::Read).await?;
    Ok(read_models::get_variant_aggregation(pool, product_id).await?)
}

/// Aggregations for a set of products in one query. Sellers only get
/// entries for their own products; foreign and unknown ids are left out.
///
/// # Errors
///
/// Returns `INTERNAL_ERROR` if the query fails.
pub async fn get_products_variant_aggregations(
    pool: &PgPool,
    product_ids: &[i64],
    seller_id: Option<i64>,
) -> CatalogResult<HashMap<i64, VariantAggregation>> {
    let scoped = match seller_id {
        None => product_ids.to_vec(),
        Some(seller) => products::filter_owned_product_ids(pool, product_ids, seller).await?,
    };
    Ok(read_models::get_variants_aggregations(pool, &scoped).await?)
}

/// Filtered, sorted, paginated variant listing. Sellers only see variants of
/// their own products.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` for `page < 1`, an unknown sort key or order,
/// or `minPrice > maxPrice`.
pub async fn list_variants(
    pool: &PgPool,
    query: ListVariantsQuery,
    option_filters: &BTreeMap<String, String>,
    seller_id: Option<i64>,
) -> CatalogResult<VariantPage> {
    let request = VariantListRequest::from_query(query, option_filters)?;
    let (items, total) = read_models::list_variants_with_filters(pool, &request, seller_id).await?;
    Ok(VariantPage {
        items,
        total,
        page: request.page,
        page_size: request.page_size,
    })
}
