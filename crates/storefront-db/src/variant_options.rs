//! The `variant_option_values` join table linking variants to their selection.

use sqlx::PgExecutor;

use crate::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantOptionValueInsert {
    pub variant_id: i64,
    pub option_id: i64,
    pub option_value_id: i64,
}

/// Inserts all join rows with one `INSERT … SELECT FROM UNNEST`.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if a variant already has a value for one of
/// the options, or [`DbError::ForeignKey`] for unknown ids.
pub async fn create_variant_option_values<'e, E>(
    executor: E,
    rows: &[VariantOptionValueInsert],
) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    if rows.is_empty() {
        return Ok(0);
    }

    let variant_ids: Vec<i64> = rows.iter().map(|r| r.variant_id).collect();
    let option_ids: Vec<i64> = rows.iter().map(|r| r.option_id).collect();
    let value_ids: Vec<i64> = rows.iter().map(|r| r.option_value_id).collect();

    let inserted = sqlx::query(
        "INSERT INTO variant_option_values (variant_id, option_id, option_value_id) \
         SELECT * FROM UNNEST($1::bigint[], $2::bigint[], $3::bigint[])",
    )
    .bind(&variant_ids)
    .bind(&option_ids)
    .bind(&value_ids)
    .execute(executor)
    .await?
    .rows_affected();
    Ok(inserted)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_variant_option_values_by_variant_ids<'e, E>(
    executor: E,
    variant_ids: &[i64],
) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    if variant_ids.is_empty() {
        return Ok(0);
    }
    let deleted = sqlx::query("DELETE FROM variant_option_values WHERE variant_id = ANY($1)")
        .bind(variant_ids)
        .execute(executor)
        .await?
        .rows_affected();
    Ok(deleted)
}
