//! Product composition: a product together with its options, values, and
//! initial variants, plus the product-level read and delete paths.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use storefront_core::{
    normalize::slugify, normalize_page, page_offset, validate::validate_sku, CatalogError,
    CatalogResult, NewProduct, NewVariant, ProductPatch,
};
use storefront_db::{
    options, products, read_models, OptionWithValues, ProductInsert, ProductRow,
    VariantAggregation, VariantWithOptions,
};

use crate::{
    bulk::{
        delete_variants_by_product_id, generate_variants, persist_variants, plan_inserts,
        resolve_batch,
    },
    catalog::{prepare_option, prepare_values},
    ownership::{ownership_guard, Access},
    resolve::OptionIndex,
};

/// Full product view: metadata, option catalog, variants, and aggregation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductRow,
    pub options: Vec<OptionWithValues>,
    pub variants: Vec<VariantWithOptions>,
    pub aggregation: VariantAggregation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: ProductRow,
    pub aggregation: VariantAggregation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub items: Vec<ProductSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

fn required_name(name: &str) -> CatalogResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation("name must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Decide which variant requests a new product starts with.
fn initial_variant_requests(req: &NewProduct, index: &OptionIndex) -> CatalogResult<Vec<NewVariant>> {
    let base_sku = req.base_sku.trim();
    if req.auto_generate_variants {
        let settings = req.default_variant_settings.as_ref().ok_or_else(|| {
            CatalogError::validation("defaultVariantSettings is required with autoGenerateVariants")
        })?;
        return generate_variants(base_sku, &index.axes(), settings);
    }
    if !req.variants.is_empty() {
        return Ok(req.variants.clone());
    }
    if !index.is_empty() {
        return Err(CatalogError::validation(
            "a product with options needs explicit variants or autoGenerateVariants",
        ));
    }
    let settings = req.default_variant_settings.as_ref().ok_or_else(|| {
        CatalogError::validation("defaultVariantSettings is required for a product without variants")
    })?;
    generate_variants(base_sku, &[], settings)
}

async fn load_detail(conn: &mut PgConnection, product: ProductRow) -> CatalogResult<ProductDetail> {
    let options = read_models::get_options_with_variant_counts(&mut *conn, product.id).await?;
    let variants = read_models::get_product_variants_with_options(&mut *conn, product.id).await?;
    let aggregation = read_models::get_variant_aggregation(&mut *conn, product.id).await?;
    Ok(ProductDetail {
        product,
        options,
        variants,
        aggregation,
    })
}

/// Create a product with its options, values, and initial variants in one
/// transaction.
///
/// With `autoGenerateVariants` every combination of option values becomes a
/// variant; otherwise the explicit `variants` are created; a product without
/// options and variants gets one variant carrying the base SKU. Exactly one
/// variant ends up default.
///
/// `seller_id = None` is an administrator, who must name the owner in
/// `req.seller_id`.
///
/// # Errors
///
/// - `VALIDATION_ERROR` for bad fields, an option without values, or a
///   missing `defaultVariantSettings`.
/// - `PRODUCT_SKU_CONFLICT`, `SKU_CONFLICT`, `PRODUCT_OPTION_NAME_EXISTS`,
///   `PRODUCT_OPTION_VALUE_EXISTS`, or `VARIANT_COMBINATION_EXISTS`.
pub async fn create_product(
    pool: &PgPool,
    seller_id: Option<i64>,
    req: &NewProduct,
) -> CatalogResult<ProductDetail> {
    let owner = match seller_id {
        Some(seller) => seller,
        None => req.seller_id.ok_or_else(|| {
            CatalogError::validation("sellerId is required when an administrator creates a product")
        })?,
    };
    let name = required_name(&req.name)?;
    validate_sku(&req.base_sku)?;

    let mut prepared = Vec::with_capacity(req.options.len());
    let mut names = HashSet::new();
    for (position, option) in (0..).zip(&req.options) {
        let (option_name, display_name) = prepare_option(option)?;
        if !names.insert(option_name.clone()) {
            return Err(CatalogError::new(
                storefront_core::ErrorCode::ProductOptionNameExists,
                format!("option '{option_name}' appears more than once"),
            ));
        }
        if option.values.is_empty() {
            return Err(CatalogError::validation(format!(
                "option '{option_name}' needs at least one value"
            )));
        }
        let values = prepare_values(&option.values, 0)?;
        prepared.push((option_name, display_name, option.position.unwrap_or(position), values));
    }

    let mut tx = storefront_db::begin(pool).await?;
    let product = products::create_product(
        &mut *tx,
        &ProductInsert {
            seller_id: owner,
            slug: slugify(&name),
            name,
            brand: req.brand.clone(),
            base_sku: req.base_sku.trim().to_string(),
            category_id: req.category_id,
            description: req.description.clone(),
        },
    )
    .await?;

    let mut option_rows = Vec::with_capacity(prepared.len());
    let mut value_rows = Vec::new();
    for (option_name, display_name, position, values) in &prepared {
        let option =
            options::create_option(&mut *tx, product.id, option_name, display_name, *position)
                .await?;
        value_rows.extend(options::bulk_create_values(&mut *tx, option.id, values).await?);
        option_rows.push(option);
    }
    let index = OptionIndex::new(option_rows, value_rows);

    let requests = initial_variant_requests(req, &index)?;
    if requests.is_empty() {
        return Err(CatalogError::validation("a product needs at least one variant"));
    }
    let resolved = resolve_batch(&index, &requests, &HashSet::new())?;
    let (batch, _) = plan_inserts(&requests, resolved, false);
    let created = persist_variants(&mut *tx, product.id, batch).await?;

    let detail = load_detail(&mut *tx, product).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id = detail.product.id,
        seller_id = owner,
        base_sku = %detail.product.base_sku,
        options = detail.options.len(),
        variants = created.len(),
        "product created"
    );
    Ok(detail)
}

/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` for unknown or foreign products.
pub async fn get_product_detail(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<ProductDetail> {
    let mut conn = pool.acquire().await.map_err(storefront_db::DbError::from)?;
    let product = ownership_guard(&mut *conn, product_id, seller_id, Access::Read).await?;
    load_detail(&mut *conn, product).await
}

/// Products newest first with their aggregations, fetched in one batch query.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` for `page < 1`.
pub async fn list_products(
    pool: &PgPool,
    seller_id: Option<i64>,
    page: Option<i64>,
    page_size: Option<i64>,
) -> CatalogResult<ProductPage> {
    let (page, page_size) = normalize_page(page, page_size)?;
    let rows = products::list_products(
        pool,
        seller_id,
        i64::from(page_size),
        page_offset(page, page_size),
    )
    .await?;
    let total = products::count_products(pool, seller_id).await?;

    let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
    let mut aggregations = read_models::get_variants_aggregations(pool, &ids).await?;
    let items = rows
        .into_iter()
        .map(|product| {
            let aggregation = aggregations
                .remove(&product.id)
                .unwrap_or_else(|| VariantAggregation::empty(product.id));
            ProductSummary {
                product,
                aggregation,
            }
        })
        .collect();

    Ok(ProductPage {
        items,
        total,
        page,
        page_size,
    })
}

/// Update product metadata. A new name also regenerates the slug.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` for an empty patch or blank name, and
/// `PRODUCT_NOT_FOUND` for unknown or foreign products.
pub async fn update_product(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
    patch: &ProductPatch,
) -> CatalogResult<ProductRow> {
    if patch.is_empty() {
        return Err(CatalogError::validation("no fields to update"));
    }
    let mut patch = patch.clone();
    if let Some(name) = &patch.name {
        patch.name = Some(required_name(name)?);
    }
    let slug = patch.name.as_deref().map(slugify);

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    let updated = products::update_product(&mut *tx, product_id, &patch, slug.as_deref()).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(product_id, "product updated");
    Ok(updated)
}

/// Delete a product bottom-up: join rows, variants, values, options, then the
/// product itself, all in one transaction.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` for unknown or foreign products.
pub async fn delete_product(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<()> {
    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;

    let deleted_variants = delete_variants_by_product_id(&mut *tx, product_id).await?;
    options::delete_values_by_product(&mut *tx, product_id).await?;
    let deleted_options = options::delete_options_by_product(&mut *tx, product_id).await?;
    products::delete_product(&mut *tx, product_id).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id,
        variants = deleted_variants,
        options = deleted_options,
        "product deleted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use storefront_core::{DefaultVariantSettings, ErrorCode};

    fn product(auto: bool, settings: Option<DefaultVariantSettings>) -> NewProduct {
        NewProduct {
            seller_id: None,
            name: "Plain Mug".to_string(),
            brand: None,
            base_sku: "MUG-001".to_string(),
            category_id: None,
            description: None,
            options: Vec::new(),
            auto_generate_variants: auto,
            default_variant_settings: settings,
            variants: Vec::new(),
        }
    }

    fn settings() -> DefaultVariantSettings {
        DefaultVariantSettings {
            price: Decimal::new(1299, 2),
            stock: None,
            allow_purchase: true,
            is_popular: false,
            images: Vec::new(),
        }
    }

    #[test]
    fn optionless_product_gets_single_base_sku_variant() {
        let requests =
            initial_variant_requests(&product(false, Some(settings())), &OptionIndex::default())
                .expect("requests");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].sku, "MUG-001");
        assert!(requests[0].options.is_empty());
    }

    #[test]
    fn auto_generation_requires_settings() {
        let err = initial_variant_requests(&product(true, None), &OptionIndex::default())
            .expect_err("settings missing");
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(required_name("   ").is_err());
        assert_eq!(required_name(" Mug ").expect("valid"), "Mug");
    }
}
