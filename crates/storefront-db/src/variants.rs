//! Database operations for `product_variants`.
//!
//! Every statement aliases the table as `pv` so the shared column list can
//! be used in `RETURNING` clauses of `UPDATE … FROM` joins too.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgExecutor};
use storefront_core::{BulkVariantPatch, VariantPatch};

use crate::{DbError, Entity};

pub(crate) const VARIANT_COLUMNS: &str = "pv.id, pv.product_id, pv.sku, pv.price, pv.images, \
     pv.is_default, pv.is_popular, pv.allow_purchase, pv.stock, \
     (pv.stock IS NULL OR pv.stock > 0) AS in_stock, pv.created_at, pv.updated_at";

/// A row from the `product_variants` table, plus the derived `in_stock` flag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VariantRow {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub is_default: bool,
    pub is_popular: bool,
    pub allow_purchase: bool,
    /// `None` when the variant does not track stock.
    pub stock: Option<i32>,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values for a new variant.
#[derive(Debug, Clone)]
pub struct VariantInsert {
    pub sku: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub is_default: bool,
    pub is_popular: bool,
    pub allow_purchase: bool,
    pub stock: Option<i32>,
}

/// # Errors
///
/// Returns [`DbError::Conflict`] if the SKU is taken or the product already
/// has a default and `is_default` is set.
pub async fn create_variant<'e, E>(
    executor: E,
    product_id: i64,
    variant: &VariantInsert,
) -> Result<VariantRow, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, VariantRow>(&format!(
        "INSERT INTO product_variants AS pv \
             (product_id, sku, price, images, is_default, is_popular, allow_purchase, stock) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {VARIANT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(&variant.sku)
    .bind(variant.price)
    .bind(&variant.images)
    .bind(variant.is_default)
    .bind(variant.is_popular)
    .bind(variant.allow_purchase)
    .bind(variant.stock)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

/// Inserts every variant with a single `INSERT … SELECT FROM UNNEST`.
///
/// Image lists are ragged, so they travel as a `jsonb[]` and are expanded
/// back to `text[]` per row. The returned rows are in input order.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if any SKU is taken.
pub async fn bulk_create_variants<'e, E>(
    executor: E,
    product_id: i64,
    variants: &[VariantInsert],
) -> Result<Vec<VariantRow>, DbError>
where
    E: PgExecutor<'e>,
{
    if variants.is_empty() {
        return Ok(Vec::new());
    }

    let n = variants.len();
    let mut skus: Vec<String> = Vec::with_capacity(n);
    let mut prices: Vec<Decimal> = Vec::with_capacity(n);
    let mut images: Vec<serde_json::Value> = Vec::with_capacity(n);
    let mut defaults: Vec<bool> = Vec::with_capacity(n);
    let mut popular: Vec<bool> = Vec::with_capacity(n);
    let mut purchasable: Vec<bool> = Vec::with_capacity(n);
    let mut stocks: Vec<Option<i32>> = Vec::with_capacity(n);
    for v in variants {
        skus.push(v.sku.clone());
        prices.push(v.price);
        images.push(serde_json::Value::from(v.images.clone()));
        defaults.push(v.is_default);
        popular.push(v.is_popular);
        purchasable.push(v.allow_purchase);
        stocks.push(v.stock);
    }

    let rows = sqlx::query_as::<_, VariantRow>(&format!(
        "INSERT INTO product_variants AS pv \
             (product_id, sku, price, images, is_default, is_popular, allow_purchase, stock) \
         SELECT $1, t.sku, t.price, ARRAY(SELECT jsonb_array_elements_text(t.images)), \
                t.is_default, t.is_popular, t.allow_purchase, t.stock \
         FROM UNNEST($2::text[], $3::numeric[], $4::jsonb[], $5::bool[], $6::bool[], \
                     $7::bool[], $8::int4[]) \
              WITH ORDINALITY \
              AS t(sku, price, images, is_default, is_popular, allow_purchase, stock, ord) \
         ORDER BY t.ord \
         RETURNING {VARIANT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(&skus)
    .bind(&prices)
    .bind(&images)
    .bind(&defaults)
    .bind(&popular)
    .bind(&purchasable)
    .bind(&stocks)
    .fetch_all(executor)
    .await?;

    Ok(reorder_by_sku(rows, &skus))
}

fn reorder_by_sku(rows: Vec<VariantRow>, skus: &[String]) -> Vec<VariantRow> {
    let mut by_sku: HashMap<String, VariantRow> =
        rows.into_iter().map(|row| (row.sku.clone(), row)).collect();
    skus.iter().filter_map(|sku| by_sku.remove(sku)).collect()
}

/// Applies a sparse update to one variant of `product_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the variant does not belong to the product,
/// or [`DbError::Conflict`] on a SKU or default collision.
pub async fn update_variant<'e, E>(
    executor: E,
    product_id: i64,
    variant_id: i64,
    patch: &VariantPatch,
) -> Result<VariantRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VariantRow>(&format!(
        "UPDATE product_variants AS pv SET \
             sku            = COALESCE($3, pv.sku), \
             price          = COALESCE($4, pv.price), \
             images         = COALESCE($5, pv.images), \
             is_default     = COALESCE($6, pv.is_default), \
             is_popular     = COALESCE($7, pv.is_popular), \
             allow_purchase = COALESCE($8, pv.allow_purchase), \
             stock          = COALESCE($9, pv.stock), \
             updated_at     = NOW() \
         WHERE pv.id = $1 AND pv.product_id = $2 \
         RETURNING {VARIANT_COLUMNS}"
    ))
    .bind(variant_id)
    .bind(product_id)
    .bind(&patch.sku)
    .bind(patch.price)
    .bind(&patch.images)
    .bind(patch.is_default)
    .bind(patch.is_popular)
    .bind(patch.allow_purchase)
    .bind(patch.stock)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Variant, variant_id))
}

/// Applies every patch with one `UPDATE … FROM UNNEST`. Ids not on the product
/// are skipped; callers verify existence beforehand.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on a SKU or default collision.
pub async fn bulk_update_variants<'e, E>(
    executor: E,
    product_id: i64,
    items: &[BulkVariantPatch],
) -> Result<Vec<VariantRow>, DbError>
where
    E: PgExecutor<'e>,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let n = items.len();
    let mut ids: Vec<i64> = Vec::with_capacity(n);
    let mut skus: Vec<Option<String>> = Vec::with_capacity(n);
    let mut prices: Vec<Option<Decimal>> = Vec::with_capacity(n);
    let mut images: Vec<Option<serde_json::Value>> = Vec::with_capacity(n);
    let mut defaults: Vec<Option<bool>> = Vec::with_capacity(n);
    let mut popular: Vec<Option<bool>> = Vec::with_capacity(n);
    let mut purchasable: Vec<Option<bool>> = Vec::with_capacity(n);
    let mut stocks: Vec<Option<i32>> = Vec::with_capacity(n);
    for item in items {
        let p = &item.patch;
        ids.push(item.variant_id);
        skus.push(p.sku.clone());
        prices.push(p.price);
        images.push(p.images.clone().map(serde_json::Value::from));
        defaults.push(p.is_default);
        popular.push(p.is_popular);
        purchasable.push(p.allow_purchase);
        stocks.push(p.stock);
    }

    let rows = sqlx::query_as::<_, VariantRow>(&format!(
        "UPDATE product_variants AS pv SET \
             sku            = COALESCE(u.sku, pv.sku), \
             price          = COALESCE(u.price, pv.price), \
             images         = CASE WHEN u.images IS NULL THEN pv.images \
                                   ELSE ARRAY(SELECT jsonb_array_elements_text(u.images)) END, \
             is_default     = COALESCE(u.is_default, pv.is_default), \
             is_popular     = COALESCE(u.is_popular, pv.is_popular), \
             allow_purchase = COALESCE(u.allow_purchase, pv.allow_purchase), \
             stock          = COALESCE(u.stock, pv.stock), \
             updated_at     = NOW() \
         FROM UNNEST($2::bigint[], $3::text[], $4::numeric[], $5::jsonb[], $6::bool[], \
                     $7::bool[], $8::bool[], $9::int4[]) \
              AS u(id, sku, price, images, is_default, is_popular, allow_purchase, stock) \
         WHERE pv.id = u.id AND pv.product_id = $1 \
         RETURNING {VARIANT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(&ids)
    .bind(&skus)
    .bind(&prices)
    .bind(&images)
    .bind(&defaults)
    .bind(&popular)
    .bind(&purchasable)
    .bind(&stocks)
    .fetch_all(executor)
    .await?;

    let mut by_id: HashMap<i64, VariantRow> = rows.into_iter().map(|r| (r.id, r)).collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_variant<'e, E>(
    executor: E,
    product_id: i64,
    variant_id: i64,
) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query("DELETE FROM product_variants WHERE id = $1 AND product_id = $2")
        .bind(variant_id)
        .bind(product_id)
        .execute(executor)
        .await?
        .rows_affected();
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_variants_by_ids<'e, E>(executor: E, ids: &[i64]) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(0);
    }
    let rows = sqlx::query("DELETE FROM product_variants WHERE id = ANY($1)")
        .bind(ids)
        .execute(executor)
        .await?
        .rows_affected();
    Ok(rows)
}

/// Fetches a variant, scoped to its product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the variant is absent or belongs to another product.
pub async fn find_variant_by_id<'e, E>(
    executor: E,
    product_id: i64,
    variant_id: i64,
) -> Result<VariantRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VariantRow>(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants pv WHERE pv.id = $1 AND pv.product_id = $2"
    ))
    .bind(variant_id)
    .bind(product_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Variant, variant_id))
}

/// Variants with the given ids, regardless of product. Order is by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_variants_by_ids<'e, E>(executor: E, ids: &[i64]) -> Result<Vec<VariantRow>, DbError>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, VariantRow>(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants pv WHERE pv.id = ANY($1) ORDER BY pv.id"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_variants_by_product<'e, E>(executor: E, product_id: i64) -> Result<i64, DbError>
where
    E: PgExecutor<'e>,
{
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM product_variants WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(executor)
    .await?;
    Ok(count)
}

/// Variant ids of a product ordered by `(created_at, id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_variant_ids_by_product<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Vec<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM product_variants WHERE product_id = $1 ORDER BY created_at, id",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(ids)
}

/// Finds the variant whose option selection is exactly `selection`: every
/// pair matches and the variant has no extra option rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_variant_by_options<'e, E>(
    executor: E,
    product_id: i64,
    selection: &BTreeMap<String, String>,
) -> Result<Option<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let names: Vec<&str> = selection.keys().map(String::as_str).collect();
    let values: Vec<&str> = selection.values().map(String::as_str).collect();
    let expected = i64::try_from(selection.len()).unwrap_or(i64::MAX);

    let id = sqlx::query_scalar::<_, i64>(
        "SELECT pv.id FROM product_variants pv \
         WHERE pv.product_id = $1 \
           AND (SELECT COUNT(*) FROM variant_option_values vov \
                WHERE vov.variant_id = pv.id) = $4 \
           AND (SELECT COUNT(*) \
                FROM variant_option_values vov \
                JOIN product_options po ON po.id = vov.option_id \
                JOIN product_option_values pov ON pov.id = vov.option_value_id \
                JOIN UNNEST($2::text[], $3::text[]) AS s(name, value) \
                  ON s.name = po.name AND s.value = pov.value \
                WHERE vov.variant_id = pv.id) = $4 \
         ORDER BY pv.id \
         LIMIT 1",
    )
    .bind(product_id)
    .bind(&names)
    .bind(&values)
    .bind(expected)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

/// The `name → value` selection of every variant on a product, keyed by variant id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_variant_selections_by_product<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Vec<(i64, BTreeMap<String, String>)>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, (i64, Json<BTreeMap<String, String>>)>(
        "SELECT pv.id, \
                COALESCE(jsonb_object_agg(po.name, pov.value) \
                         FILTER (WHERE po.id IS NOT NULL), '{}'::jsonb) \
         FROM product_variants pv \
         LEFT JOIN variant_option_values vov ON vov.variant_id = pv.id \
         LEFT JOIN product_options po ON po.id = vov.option_id \
         LEFT JOIN product_option_values pov ON pov.id = vov.option_value_id \
         WHERE pv.product_id = $1 \
         GROUP BY pv.id \
         ORDER BY pv.id",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(|(id, Json(sel))| (id, sel)).collect())
}

/// Clears `is_default` on every variant of a product, optionally sparing one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn unset_all_defaults_for_product<'e, E>(
    executor: E,
    product_id: i64,
    except_variant_id: Option<i64>,
) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "UPDATE product_variants SET is_default = FALSE, updated_at = NOW() \
         WHERE product_id = $1 AND is_default \
           AND ($2::bigint IS NULL OR id <> $2)",
    )
    .bind(product_id)
    .bind(except_variant_id)
    .execute(executor)
    .await?
    .rows_affected();
    Ok(rows)
}

/// Marks one variant as the product default. Callers clear the previous
/// default first in the same transaction.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the variant does not belong to the product.
pub async fn set_default_variant<'e, E>(
    executor: E,
    product_id: i64,
    variant_id: i64,
) -> Result<(), DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "UPDATE product_variants SET is_default = TRUE, updated_at = NOW() \
         WHERE id = $1 AND product_id = $2",
    )
    .bind(variant_id)
    .bind(product_id)
    .execute(executor)
    .await?
    .rows_affected();
    if rows == 0 {
        return Err(DbError::not_found(Entity::Variant, variant_id));
    }
    Ok(())
}

/// Marks the earliest-created remaining variant as default. Returns its id,
/// or `None` when the product has no variants left.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn promote_first_variant_to_default<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Option<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "UPDATE product_variants SET is_default = TRUE, updated_at = NOW() \
         WHERE id = ( \
             SELECT id FROM product_variants WHERE product_id = $1 \
             ORDER BY created_at, id LIMIT 1 \
         ) \
         RETURNING id",
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_default_variant_id<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Option<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM product_variants WHERE product_id = $1 AND is_default",
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

/// Writes an absolute stock level.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the variant does not belong to the product,
/// or [`DbError::CheckViolation`] for a negative level.
pub async fn set_variant_stock<'e, E>(
    executor: E,
    product_id: i64,
    variant_id: i64,
    stock: i32,
) -> Result<VariantRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VariantRow>(&format!(
        "UPDATE product_variants AS pv SET stock = $3, updated_at = NOW() \
         WHERE pv.id = $1 AND pv.product_id = $2 \
         RETURNING {VARIANT_COLUMNS}"
    ))
    .bind(variant_id)
    .bind(product_id)
    .bind(stock)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Variant, variant_id))
}
