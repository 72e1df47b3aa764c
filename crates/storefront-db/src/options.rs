//! Database operations for `product_options` and `product_option_values`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;

use crate::{DbError, Entity};

const OPTION_COLUMNS: &str = "id, product_id, name, display_name, position, created_at, updated_at";
const VALUE_COLUMNS: &str =
    "id, option_id, value, display_name, color_code, position, created_at, updated_at";

/// A row from the `product_options` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OptionRow {
    pub id: i64,
    pub product_id: i64,
    /// Lowercase `snake_case`, unique per product.
    pub name: String,
    pub display_name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `product_option_values` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OptionValueRow {
    pub id: i64,
    pub option_id: i64,
    /// Lowercased and trimmed, unique per option. Immutable after creation.
    pub value: String,
    pub display_name: String,
    pub color_code: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OptionValueInsert {
    pub value: String,
    pub display_name: String,
    pub color_code: Option<String>,
    pub position: i32,
}

/// Mutable fields of an option value; `None` keeps the stored value.
#[derive(Debug, Clone)]
pub struct OptionValueUpdate {
    pub id: i64,
    pub display_name: Option<String>,
    pub color_code: Option<String>,
    pub position: Option<i32>,
}

/// # Errors
///
/// Returns [`DbError::Conflict`] if the product already has an option named `name`.
pub async fn create_option<'e, E>(
    executor: E,
    product_id: i64,
    name: &str,
    display_name: &str,
    position: i32,
) -> Result<OptionRow, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, OptionRow>(&format!(
        "INSERT INTO product_options (product_id, name, display_name, position) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {OPTION_COLUMNS}"
    ))
    .bind(product_id)
    .bind(name)
    .bind(display_name)
    .bind(position)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

/// Options of a product ordered by `(position, id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_options_by_product<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Vec<OptionRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, OptionRow>(&format!(
        "SELECT {OPTION_COLUMNS} FROM product_options \
         WHERE product_id = $1 \
         ORDER BY position, id"
    ))
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Fetches an option, scoped to its product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the option is absent or belongs to another product.
pub async fn find_option_by_id<'e, E>(
    executor: E,
    product_id: i64,
    option_id: i64,
) -> Result<OptionRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, OptionRow>(&format!(
        "SELECT {OPTION_COLUMNS} FROM product_options WHERE id = $1 AND product_id = $2"
    ))
    .bind(option_id)
    .bind(product_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::Option, option_id))
}

/// Values of one option ordered by `(position, id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_values_by_option<'e, E>(
    executor: E,
    option_id: i64,
) -> Result<Vec<OptionValueRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, OptionValueRow>(&format!(
        "SELECT {VALUE_COLUMNS} FROM product_option_values \
         WHERE option_id = $1 \
         ORDER BY position, id"
    ))
    .bind(option_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Values of every option of a product in one round-trip.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_values_by_product<'e, E>(
    executor: E,
    product_id: i64,
) -> Result<Vec<OptionValueRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, OptionValueRow>(
        "SELECT pov.id, pov.option_id, pov.value, pov.display_name, pov.color_code, \
                pov.position, pov.created_at, pov.updated_at \
         FROM product_option_values pov \
         JOIN product_options po ON po.id = pov.option_id \
         WHERE po.product_id = $1 \
         ORDER BY po.position, po.id, pov.position, pov.id",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Fetches a value, scoped to its option.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the value is absent or belongs to another option.
pub async fn find_value_by_id<'e, E>(
    executor: E,
    option_id: i64,
    value_id: i64,
) -> Result<OptionValueRow, DbError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, OptionValueRow>(&format!(
        "SELECT {VALUE_COLUMNS} FROM product_option_values WHERE id = $1 AND option_id = $2"
    ))
    .bind(value_id)
    .bind(option_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found(Entity::OptionValue, value_id))
}

/// Inserts all values with one `INSERT … SELECT FROM UNNEST`. Rows come back
/// in input order.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if any value already exists on the option.
pub async fn bulk_create_values<'e, E>(
    executor: E,
    option_id: i64,
    values: &[OptionValueInsert],
) -> Result<Vec<OptionValueRow>, DbError>
where
    E: PgExecutor<'e>,
{
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let mut raw_values: Vec<String> = Vec::with_capacity(values.len());
    let mut display_names: Vec<String> = Vec::with_capacity(values.len());
    let mut color_codes: Vec<Option<String>> = Vec::with_capacity(values.len());
    let mut positions: Vec<i32> = Vec::with_capacity(values.len());
    for v in values {
        raw_values.push(v.value.clone());
        display_names.push(v.display_name.clone());
        color_codes.push(v.color_code.clone());
        positions.push(v.position);
    }

    let mut rows = sqlx::query_as::<_, OptionValueRow>(&format!(
        "INSERT INTO product_option_values (option_id, value, display_name, color_code, position) \
         SELECT $1, t.value, t.display_name, t.color_code, t.position \
         FROM UNNEST($2::text[], $3::text[], $4::text[], $5::int4[]) \
              AS t(value, display_name, color_code, position) \
         RETURNING {VALUE_COLUMNS}"
    ))
    .bind(option_id)
    .bind(&raw_values)
    .bind(&display_names)
    .bind(&color_codes)
    .bind(&positions)
    .fetch_all(executor)
    .await?;

    // RETURNING order is not contractual; restore input order by value.
    rows.sort_by_key(|row| {
        raw_values
            .iter()
            .position(|v| *v == row.value)
            .unwrap_or(usize::MAX)
    });
    Ok(rows)
}

/// Applies sparse updates to several values of one option with a single
/// `UPDATE … FROM UNNEST`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn bulk_update_values<'e, E>(
    executor: E,
    option_id: i64,
    updates: &[OptionValueUpdate],
) -> Result<Vec<OptionValueRow>, DbError>
where
    E: PgExecutor<'e>,
{
    if updates.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = updates.iter().map(|u| u.id).collect();
    let display_names: Vec<Option<String>> =
        updates.iter().map(|u| u.display_name.clone()).collect();
    let color_codes: Vec<Option<String>> = updates.iter().map(|u| u.color_code.clone()).collect();
    let positions: Vec<Option<i32>> = updates.iter().map(|u| u.position).collect();

    let rows = sqlx::query_as::<_, OptionValueRow>(
        "UPDATE product_option_values pov SET \
             display_name = COALESCE(u.display_name, pov.display_name), \
             color_code   = COALESCE(u.color_code, pov.color_code), \
             position     = COALESCE(u.position, pov.position), \
             updated_at   = NOW() \
         FROM UNNEST($2::bigint[], $3::text[], $4::text[], $5::int4[]) \
              AS u(id, display_name, color_code, position) \
         WHERE pov.id = u.id AND pov.option_id = $1 \
         RETURNING pov.id, pov.option_id, pov.value, pov.display_name, pov.color_code, \
                   pov.position, pov.created_at, pov.updated_at",
    )
    .bind(option_id)
    .bind(&ids)
    .bind(&display_names)
    .bind(&color_codes)
    .bind(&positions)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_option<'e, E>(executor: E, option_id: i64) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query("DELETE FROM product_options WHERE id = $1")
        .bind(option_id)
        .execute(executor)
        .await?
        .rows_affected();
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_value<'e, E>(executor: E, value_id: i64) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query("DELETE FROM product_option_values WHERE id = $1")
        .bind(value_id)
        .execute(executor)
        .await?
        .rows_affected();
    Ok(rows)
}

/// Deletes every value of every option on a product.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_values_by_product<'e, E>(executor: E, product_id: i64) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "DELETE FROM product_option_values \
         WHERE option_id IN (SELECT id FROM product_options WHERE product_id = $1)",
    )
    .bind(product_id)
    .execute(executor)
    .await?
    .rows_affected();
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_options_by_product<'e, E>(executor: E, product_id: i64) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query("DELETE FROM product_options WHERE product_id = $1")
        .bind(product_id)
        .execute(executor)
        .await?
        .rows_affected();
    Ok(rows)
}

/// Ids of variants that reference any value of `option_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_variants_using_option<'e, E>(
    executor: E,
    option_id: i64,
) -> Result<Vec<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT variant_id FROM variant_option_values \
         WHERE option_id = $1 \
         ORDER BY variant_id",
    )
    .bind(option_id)
    .fetch_all(executor)
    .await?;
    Ok(ids)
}

/// Ids of variants that reference `value_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_variants_using_value<'e, E>(
    executor: E,
    value_id: i64,
) -> Result<Vec<i64>, DbError>
where
    E: PgExecutor<'e>,
{
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT variant_id FROM variant_option_values \
         WHERE option_value_id = $1 \
         ORDER BY variant_id",
    )
    .bind(value_id)
    .fetch_all(executor)
    .await?;
    Ok(ids)
}
