//! Database operations for `products`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use storefront_core::ProductPatch;

use crate::{DbError, Entity};

const PRODUCT_COLUMNS: &str = "id, seller_id, name, slug, brand, base_sku, category_id, \
                               description, created_at, updated_at";

/// A row from the `products` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub id: i64,
    pub seller_id: i64,
    pub name: String,
    pub slug: String,
    pub brand: Option<String>,
    pub base_sku: String,
    /// Categories live outside this service; only the id is stored.
    pub category_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values for a new product.
#[derive(Debug, Clone)]
pub struct ProductInsert {
    pub seller_id: i64,
    pub name: String,
    pub slug: String,
    pub brand: Option<String>,
    pub base_sku: String,
    pub category_id: Option<i64>,
    pub description: Option<String>,
}

/// Inserts a product and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if `base_sku` is taken, or [`DbError::Sqlx`].
pub async fn create_product<'e, E>(executor: E, product: &ProductInsert) -> Result<ProductRow, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products \
             (seller_id, name, slug, brand, base_sku, category_id, description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product.seller_id)
    .bind(&product.name)
    .bind(&product.slug)
    .bind(&product.brand)
    .bind(&product.base_sku)
    .bind(product.category_id)
    .bind(&product.description)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

/// Applies a sparse update. `slug` is recomputed by the caller when the name changes.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist.
pub async fn update_product<'e, E>(
    executor: E,
    product_id: i64,
    patch: &ProductPatch,
    slug: Option<&str>,
) -> Result<ProductRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ProductRow>(&format!(
        "UPDATE products SET \
             name        = COALESCE($2, name), \
             slug        = COALESCE($3, slug), \
             brand       = COALESCE($4, brand), \
             category_id = COALESCE($5, category_id), \
             description = COALESCE($6, description), \
             updated_at  = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(&patch.name)
    .bind(slug)
    .bind(&patch.brand)
    .bind(patch.category_id)
    .bind(&patch.description)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Product, product_id))
}

/// Deletes the product row. Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_product<'e, E>(executor: E, product_id: i64) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(executor)
        .await?
        .rows_affected();
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `product_id`.
pub async fn find_product_by_id<'e, E>(executor: E, product_id: i64) -> Result<ProductRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(product_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Product, product_id))
}

/// Reads the product with `FOR UPDATE`, serialising every variant and option
/// mutation on the same product until the surrounding transaction ends.
///
/// Must be called on a transaction; on a bare pool connection the lock is
/// released immediately.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `product_id`.
pub async fn lock_product<'e, E>(executor: E, product_id: i64) -> Result<ProductRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
    ))
    .bind(product_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Product, product_id))
}

/// Lists products newest first, optionally restricted to one seller.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products<'e, E>(
    executor: E,
    seller_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProductRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE ($1::BIGINT IS NULL OR seller_id = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(seller_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products<'e, E>(executor: E, seller_id: Option<i64>) -> Result<i64, DbError>
where
    E: PgExecutor<'e>,
{
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM products WHERE ($1::BIGINT IS NULL OR seller_id = $1)",
    )
    .bind(seller_id)
    .fetch_one(executor)
    .await?;
    Ok(total)
}

/// Keeps the ids in `product_ids` that belong to `seller_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn filter_owned_product_ids<'e, E>(
    executor: E,
    product_ids: &[i64],
    seller_id: i64,
) -> Result<Vec<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM products WHERE id = ANY($1) AND seller_id = $2 ORDER BY id",
    )
    .bind(product_ids)
    .bind(seller_id)
    .fetch_all(executor)
    .await?;
    Ok(ids)
}
