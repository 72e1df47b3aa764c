//! Single-variant mutations.

use serde::Serialize;
use sqlx::PgPool;
use storefront_core::{
    validate::{
        validate_can_delete, validate_combination_unique, validate_price, validate_sku,
        validate_stock,
    },
    CatalogError, CatalogResult, NewVariant, StockAdjustment, VariantPatch,
};
use storefront_db::{
    options, read_models, variant_options, variants, VariantInsert, VariantOptionValueInsert,
    VariantRow, VariantWithOptions,
};

use crate::{
    ownership::{ownership_guard, Access},
    resolve::OptionIndex,
};

/// Result of a variant deletion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedVariant {
    pub id: i64,
    pub sku: String,
    /// Set when the deleted variant was the default and another one took over.
    pub new_default_variant_id: Option<i64>,
}

/// Field checks shared by single and bulk creation.
pub(crate) fn validate_new_variant(req: &NewVariant) -> CatalogResult<()> {
    validate_sku(&req.sku)?;
    validate_price(req.price)?;
    validate_stock(req.stock)?;
    Ok(())
}

pub(crate) fn validate_patch_fields(patch: &VariantPatch) -> CatalogResult<()> {
    if patch.options.is_some() {
        return Err(CatalogError::validation(
            "a variant's options cannot be changed; delete it and create a new variant",
        ));
    }
    if patch.is_empty() {
        return Err(CatalogError::validation("no fields to update"));
    }
    if let Some(sku) = &patch.sku {
        validate_sku(sku)?;
    }
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    validate_stock(patch.stock)?;
    Ok(())
}

pub(crate) fn variant_insert(req: &NewVariant, is_default: bool) -> VariantInsert {
    VariantInsert {
        sku: req.sku.trim().to_string(),
        price: req.price,
        images: req.images.clone(),
        is_default,
        is_popular: req.is_popular,
        allow_purchase: req.allow_purchase,
        stock: req.stock,
    }
}

fn cannot_unset_default(variant_id: i64) -> CatalogError {
    CatalogError::validation(format!(
        "variant {variant_id} is the default; mark another variant as default instead"
    ))
}

/// Create one variant for `product_id` with the given option selection.
///
/// # Errors
///
/// - `PRODUCT_NOT_FOUND` when the product is absent or not the caller's.
/// - `PRODUCT_OPTION_NOT_FOUND`, `PRODUCT_OPTION_VALUE_NOT_FOUND`, or
///   `VALIDATION_ERROR` when the selection does not fit the product's options.
/// - `VARIANT_COMBINATION_EXISTS` when another variant has the same selection.
/// - `SKU_CONFLICT` when the SKU is taken.
pub async fn create_variant(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
    req: &NewVariant,
) -> CatalogResult<VariantWithOptions> {
    validate_new_variant(req)?;
    let selection = req.normalized_options()?;

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;

    let index = OptionIndex::new(
        options::find_options_by_product(&mut *tx, product_id).await?,
        options::find_values_by_product(&mut *tx, product_id).await?,
    );
    let resolved = index.resolve(&selection)?;

    let existing = variants::find_variant_by_options(&mut *tx, product_id, &selection).await?;
    validate_combination_unique(existing, &resolved.key)?;

    if req.is_default {
        variants::unset_all_defaults_for_product(&mut *tx, product_id, None).await?;
    }
    let row = variants::create_variant(&mut *tx, product_id, &variant_insert(req, req.is_default))
        .await?;

    let links: Vec<VariantOptionValueInsert> = resolved
        .links
        .iter()
        .map(|l| VariantOptionValueInsert {
            variant_id: row.id,
            option_id: l.option_id,
            option_value_id: l.value_id,
        })
        .collect();
    variant_options::create_variant_option_values(&mut *tx, &links).await?;

    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id,
        variant_id = row.id,
        sku = %row.sku,
        combination = %resolved.key,
        "variant created"
    );
    Ok(VariantWithOptions {
        variant: row,
        options: resolved.links,
    })
}

/// Apply a sparse update to one variant. The option selection is immutable.
///
/// Setting `isDefault = true` moves the default to this variant. Clearing it
/// on the current default is rejected because the product would be left
/// without one.
///
/// # Errors
///
/// - `VALIDATION_ERROR` for an empty patch, an options change, or bad field values.
/// - `PRODUCT_NOT_FOUND` / `VARIANT_NOT_FOUND` for unknown or foreign ids.
/// - `SKU_CONFLICT` when the new SKU is taken.
pub async fn update_variant(
    pool: &PgPool,
    product_id: i64,
    variant_id: i64,
    seller_id: Option<i64>,
    patch: &VariantPatch,
) -> CatalogResult<VariantWithOptions> {
    validate_patch_fields(patch)?;

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    let current = variants::find_variant_by_id(&mut *tx, product_id, variant_id).await?;

    if patch.is_default == Some(false) && current.is_default {
        return Err(cannot_unset_default(variant_id));
    }
    if patch.sets_default() && !current.is_default {
        variants::unset_all_defaults_for_product(&mut *tx, product_id, Some(variant_id)).await?;
    }

    let mut patch = patch.clone();
    if let Some(sku) = patch.sku.as_mut() {
        *sku = sku.trim().to_string();
    }
    variants::update_variant(&mut *tx, product_id, variant_id, &patch).await?;

    let updated = read_models::get_variants_with_options_by_ids(&mut *tx, &[variant_id])
        .await?
        .pop()
        .ok_or_else(|| CatalogError::variant_not_found(variant_id))?;

    storefront_db::commit(tx).await?;

    tracing::info!(product_id, variant_id, "variant updated");
    Ok(updated)
}

/// Delete one variant. The last variant of a product cannot be deleted; when
/// the default is deleted the earliest remaining variant becomes default.
///
/// # Errors
///
/// - `PRODUCT_NOT_FOUND` / `VARIANT_NOT_FOUND` for unknown or foreign ids.
/// - `LAST_VARIANT_DELETE_NOT_ALLOWED` when it is the only variant.
pub async fn delete_variant(
    pool: &PgPool,
    product_id: i64,
    variant_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<DeletedVariant> {
    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    let variant = variants::find_variant_by_id(&mut *tx, product_id, variant_id).await?;

    let count = variants::count_variants_by_product(&mut *tx, product_id).await?;
    validate_can_delete(count)?;

    variant_options::delete_variant_option_values_by_variant_ids(&mut *tx, &[variant_id]).await?;
    variants::delete_variant(&mut *tx, product_id, variant_id).await?;

    let new_default_variant_id = if variant.is_default {
        variants::promote_first_variant_to_default(&mut *tx, product_id).await?
    } else {
        None
    };

    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id,
        variant_id,
        new_default = ?new_default_variant_id,
        "variant deleted"
    );
    Ok(DeletedVariant {
        id: variant.id,
        sku: variant.sku,
        new_default_variant_id,
    })
}

/// Set, add to, or subtract from a variant's stock level.
///
/// # Errors
///
/// - `INSUFFICIENT_STOCK` when a subtraction would go below zero.
/// - `VARIANT_OUT_OF_STOCK` when subtracting from zero stock.
/// - `VALIDATION_ERROR` for add/subtract on a variant that does not track stock.
pub async fn adjust_variant_stock(
    pool: &PgPool,
    product_id: i64,
    variant_id: i64,
    seller_id: Option<i64>,
    adjustment: StockAdjustment,
) -> CatalogResult<VariantRow> {
    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    let variant = variants::find_variant_by_id(&mut *tx, product_id, variant_id).await?;

    let level = storefront_core::apply_stock_operation(
        variant.stock,
        adjustment.operation,
        adjustment.quantity,
    )?;
    let row = variants::set_variant_stock(&mut *tx, product_id, variant_id, level).await?;

    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id,
        variant_id,
        operation = ?adjustment.operation,
        quantity = adjustment.quantity,
        stock = level,
        "variant stock adjusted"
    );
    Ok(row)
}
