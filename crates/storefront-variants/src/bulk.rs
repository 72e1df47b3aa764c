//! Batch variant mutations and Cartesian auto-generation.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use storefront_core::{
    apply_last_default_wins, cartesian_product, combination_count, generated_sku,
    last_default_index,
    validate::{validate_batch_combinations_unique, validate_bulk_variants_exist},
    BulkVariantPatch, CatalogError, CatalogResult, CombinationKey, DefaultVariantSettings,
    ErrorCode, NewVariant, OptionAxis, MAX_GENERATED_VARIANTS,
};
use storefront_db::{
    options, variant_options, variants, VariantInsert, VariantOptionValueInsert, VariantRow,
    VariantWithOptions,
};

use crate::{
    command::{validate_new_variant, validate_patch_fields, variant_insert},
    ownership::{ownership_guard, Access},
    resolve::{OptionIndex, ResolvedCombination},
};

/// Minimal per-variant projection returned by bulk updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSummary {
    pub id: i64,
    pub sku: String,
    pub price: Decimal,
    pub is_default: bool,
    pub is_popular: bool,
    pub allow_purchase: bool,
    pub stock: Option<i32>,
    pub in_stock: bool,
}

impl From<&VariantRow> for VariantSummary {
    fn from(row: &VariantRow) -> Self {
        Self {
            id: row.id,
            sku: row.sku.clone(),
            price: row.price,
            is_default: row.is_default,
            is_popular: row.is_popular,
            allow_purchase: row.allow_purchase,
            stock: row.stock,
            in_stock: row.in_stock,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateSummary {
    pub updated: usize,
    pub default_variant_id: Option<i64>,
    pub variants: Vec<VariantSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateSummary {
    pub created: usize,
    pub variants: Vec<VariantWithOptions>,
}

/// Build one variant request per combination of option values.
///
/// SKUs are `base_sku` followed by `-<value>` per option in position order.
/// Price, stock, flags, and images come from `settings`. No request is marked
/// default; the persisting path picks the first one.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` when the options would yield more than
/// [`MAX_GENERATED_VARIANTS`] combinations. Nothing is allocated in that case.
pub fn generate_variants(
    base_sku: &str,
    axes: &[OptionAxis],
    settings: &DefaultVariantSettings,
) -> CatalogResult<Vec<NewVariant>> {
    match combination_count(axes) {
        Some(count) if count <= MAX_GENERATED_VARIANTS => {}
        count => {
            return Err(CatalogError::validation(format!(
                "options would generate more than {MAX_GENERATED_VARIANTS} variants"
            ))
            .with_details(serde_json::json!({
                "combinations": count,
                "max": MAX_GENERATED_VARIANTS,
            })));
        }
    }
    Ok(cartesian_product(axes)
        .into_iter()
        .map(|combination| NewVariant {
            sku: generated_sku(base_sku, &combination),
            price: settings.price,
            images: settings.images.clone(),
            is_default: false,
            is_popular: settings.is_popular,
            allow_purchase: settings.allow_purchase,
            stock: settings.stock,
            options: combination.into_iter().collect::<BTreeMap<_, _>>(),
        })
        .collect())
}

/// Insert resolved variants with one bulk insert for the rows and one for the
/// join rows. Output order matches `batch`.
pub(crate) async fn persist_variants(
    conn: &mut PgConnection,
    product_id: i64,
    batch: Vec<(VariantInsert, ResolvedCombination)>,
) -> CatalogResult<Vec<VariantWithOptions>> {
    let inserts: Vec<VariantInsert> = batch.iter().map(|(insert, _)| insert.clone()).collect();
    let rows = variants::bulk_create_variants(&mut *conn, product_id, &inserts).await?;
    if rows.len() != batch.len() {
        return Err(CatalogError::internal(format!(
            "bulk insert returned {} rows for {} variants",
            rows.len(),
            batch.len()
        )));
    }

    let links: Vec<VariantOptionValueInsert> = rows
        .iter()
        .zip(&batch)
        .flat_map(|(row, (_, combination))| {
            combination
                .links
                .iter()
                .map(move |l| VariantOptionValueInsert {
                    variant_id: row.id,
                    option_id: l.option_id,
                    option_value_id: l.value_id,
                })
        })
        .collect();
    variant_options::create_variant_option_values(&mut *conn, &links).await?;

    Ok(rows
        .into_iter()
        .zip(batch)
        .map(|(variant, (_, combination))| VariantWithOptions {
            variant,
            options: combination.links,
        })
        .collect())
}

/// Resolve every request and reject duplicate SKUs or combinations within
/// the batch or against `existing` keys.
pub(crate) fn resolve_batch(
    index: &OptionIndex,
    requests: &[NewVariant],
    existing: &HashSet<CombinationKey>,
) -> CatalogResult<Vec<ResolvedCombination>> {
    let mut skus = HashSet::new();
    for (position, req) in requests.iter().enumerate() {
        validate_new_variant(req)?;
        if !skus.insert(req.sku.trim()) {
            return Err(CatalogError::new(
                ErrorCode::SkuConflict,
                format!("sku '{}' appears more than once in the batch", req.sku.trim()),
            )
            .with_details(serde_json::json!({ "index": position })));
        }
    }

    let resolved = requests
        .iter()
        .map(|req| index.resolve(&req.normalized_options()?))
        .collect::<CatalogResult<Vec<_>>>()?;
    validate_batch_combinations_unique(existing, resolved.iter().map(|r| &r.key))?;
    Ok(resolved)
}

/// Pair each request with its resolution and decide which one is default.
///
/// The last request asking to be default wins. Without one, the first request
/// becomes default only when `product_has_default` is false.
pub(crate) fn plan_inserts(
    requests: &[NewVariant],
    resolved: Vec<ResolvedCombination>,
    product_has_default: bool,
) -> (Vec<(VariantInsert, ResolvedCombination)>, Option<usize>) {
    let default_index = last_default_index(requests.iter().map(|r| r.is_default))
        .or(if product_has_default { None } else { Some(0) });
    let batch = requests
        .iter()
        .zip(resolved)
        .enumerate()
        .map(|(idx, (req, combination))| (variant_insert(req, Some(idx) == default_index), combination))
        .collect();
    (batch, default_index)
}

/// Create many variants at once.
///
/// # Errors
///
/// - `VALIDATION_ERROR` for an empty batch or a request missing an option.
/// - `VARIANT_COMBINATION_EXISTS` for a combination repeated in the batch or
///   already present on the product.
/// - `SKU_CONFLICT` for a repeated or already taken SKU.
pub async fn bulk_create_variants(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
    requests: &[NewVariant],
) -> CatalogResult<BulkCreateSummary> {
    if requests.is_empty() {
        return Err(CatalogError::validation("variants must not be empty"));
    }

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;

    let index = OptionIndex::new(
        options::find_options_by_product(&mut *tx, product_id).await?,
        options::find_values_by_product(&mut *tx, product_id).await?,
    );
    let existing: HashSet<CombinationKey> =
        variants::find_variant_selections_by_product(&mut *tx, product_id)
            .await?
            .iter()
            .map(|(_, selection)| CombinationKey::from_selection(selection))
            .collect();
    let resolved = resolve_batch(&index, requests, &existing)?;

    let has_default = variants::find_default_variant_id(&mut *tx, product_id)
        .await?
        .is_some();
    let (batch, default_index) = plan_inserts(requests, resolved, has_default);
    if default_index.is_some() {
        variants::unset_all_defaults_for_product(&mut *tx, product_id, None).await?;
    }

    let created = persist_variants(&mut *tx, product_id, batch).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id,
        created = created.len(),
        default_index = ?default_index,
        "variants bulk created"
    );
    Ok(BulkCreateSummary {
        created: created.len(),
        variants: created,
    })
}

/// Patch many variants of one product at once.
///
/// Only fields present in each item change. When several items set
/// `isDefault = true`, the last one wins and the others are rewritten to
/// `false`. Running the same batch twice leaves the same state as once.
/// SKU uniqueness is checked once the whole batch is written, so items may
/// swap SKUs with each other.
///
/// # Errors
///
/// - `VALIDATION_ERROR` for an empty batch, repeated ids, empty patches,
///   option changes, or clearing the default without naming a new one.
/// - `VARIANT_NOT_FOUND` when any id is missing or belongs to another product.
/// - `SKU_CONFLICT` when a new SKU is taken.
pub async fn bulk_update_variants(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
    mut items: Vec<BulkVariantPatch>,
) -> CatalogResult<BulkUpdateSummary> {
    if items.is_empty() {
        return Err(CatalogError::validation("variants must not be empty"));
    }
    let mut seen = HashSet::new();
    for item in &mut items {
        if !seen.insert(item.variant_id) {
            return Err(CatalogError::validation(format!(
                "variant {} appears more than once in the batch",
                item.variant_id
            )));
        }
        validate_patch_fields(&item.patch)?;
        if let Some(sku) = item.patch.sku.as_mut() {
            *sku = sku.trim().to_string();
        }
    }
    let winner = apply_last_default_wins(&mut items);
    let ids: Vec<i64> = items.iter().map(|i| i.variant_id).collect();

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;

    let fetched = variants::find_variants_by_ids(&mut *tx, &ids).await?;
    let owners: Vec<(i64, i64)> = fetched.iter().map(|v| (v.id, v.product_id)).collect();
    validate_bulk_variants_exist(product_id, &ids, &owners)?;

    if winner.is_none() {
        if let Some(current) = fetched.iter().find(|v| v.is_default) {
            let clears_current = items
                .iter()
                .any(|i| i.variant_id == current.id && i.patch.is_default == Some(false));
            if clears_current {
                return Err(CatalogError::validation(format!(
                    "variant {} is the default; mark another variant as default instead",
                    current.id
                )));
            }
        }
    }

    if let Some(winner) = winner {
        variants::unset_all_defaults_for_product(&mut *tx, product_id, Some(winner)).await?;
    }
    let rows = variants::bulk_update_variants(&mut *tx, product_id, &items).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id,
        updated = rows.len(),
        default_variant = ?winner,
        "variants bulk updated"
    );
    Ok(BulkUpdateSummary {
        updated: rows.len(),
        default_variant_id: winner,
        variants: rows.iter().map(VariantSummary::from).collect(),
    })
}

/// Remove every variant of a product and its join rows, inside the caller's
/// transaction. Only product deletion uses this, since it leaves the product
/// without variants.
///
/// # Errors
///
/// Returns `INTERNAL_ERROR` if a delete fails.
pub async fn delete_variants_by_product_id(
    conn: &mut PgConnection,
    product_id: i64,
) -> CatalogResult<u64> {
    let ids = variants::list_variant_ids_by_product(&mut *conn, product_id).await?;
    variant_options::delete_variant_option_values_by_variant_ids(&mut *conn, &ids).await?;
    let deleted = variants::delete_variants_by_ids(&mut *conn, &ids).await?;
    Ok(deleted)
}
