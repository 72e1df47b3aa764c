//! Option and option value management under a product.
//!
//! Option names are stored snake_cased and values lowercased and trimmed. A
//! value is immutable once created; its display name, color, and position
//! can change.

use std::collections::HashSet;

use sqlx::PgPool;
use storefront_core::{
    normalize::{display_name_from_key, option_key, option_value},
    validate::{
        validate_color_code, validate_option_key, validate_option_not_in_use,
        validate_value_not_in_use,
    },
    CatalogError, CatalogResult, ErrorCode, NewOption, NewOptionValue, OptionValuePatch,
};
use storefront_db::{
    options, read_models, variant_options, variants, OptionValueInsert, OptionValueRow,
    OptionValueUpdate, OptionWithValues, VariantOptionValueInsert,
};

use crate::ownership::{ownership_guard, Access};

/// Normalised option name and display name.
pub(crate) fn prepare_option(req: &NewOption) -> CatalogResult<(String, String)> {
    let name = option_key(&req.name);
    validate_option_key(&name)?;
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map_or_else(|| display_name_from_key(&name), str::to_string);
    Ok((name, display_name))
}

/// Normalise a batch of values, rejecting blanks, bad colors, and repeats
/// within the batch. Missing positions continue from `next_position`.
pub(crate) fn prepare_values(
    values: &[NewOptionValue],
    next_position: i32,
) -> CatalogResult<Vec<OptionValueInsert>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(values.len());
    for (offset, raw) in (0..).zip(values) {
        let value = option_value(&raw.value);
        if value.is_empty() {
            return Err(CatalogError::validation("option values must not be empty"));
        }
        validate_color_code(raw.color_code.as_deref())?;
        if !seen.insert(value.clone()) {
            return Err(duplicate_value(&value));
        }
        let display_name = raw
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map_or_else(|| raw.value.trim().to_string(), str::to_string);
        out.push(OptionValueInsert {
            value,
            display_name,
            color_code: raw.color_code.clone(),
            position: raw.position.unwrap_or(next_position.saturating_add(offset)),
        });
    }
    Ok(out)
}

fn duplicate_value(value: &str) -> CatalogError {
    CatalogError::new(
        ErrorCode::ProductOptionValueExists,
        format!("value '{value}' already exists on this option"),
    )
    .with_details(serde_json::json!({ "value": value }))
}

fn next_position<I: IntoIterator<Item = i32>>(positions: I) -> i32 {
    positions
        .into_iter()
        .max()
        .map_or(0, |p| p.saturating_add(1))
}

/// Add an option with its initial values to a product.
///
/// When the product already has variants, every variant is linked to the
/// new option's first value so each variant keeps one value per option.
/// That requires at least one value in the request.
///
/// # Errors
///
/// - `PRODUCT_OPTION_NAME_EXISTS` when the normalised name is taken.
/// - `PRODUCT_OPTION_VALUE_EXISTS` for a value repeated in the request.
/// - `VALIDATION_ERROR` for a bad name, color code, or a value-less option on
///   a product with variants.
pub async fn add_option(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
    req: &NewOption,
) -> CatalogResult<OptionWithValues> {
    let (name, display_name) = prepare_option(req)?;
    let values = prepare_values(&req.values, 0)?;

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;

    let existing = options::find_options_by_product(&mut *tx, product_id).await?;
    if existing.iter().any(|o| o.name == name) {
        return Err(CatalogError::new(
            ErrorCode::ProductOptionNameExists,
            format!("option '{name}' already exists on this product"),
        ));
    }
    let variant_ids = variants::list_variant_ids_by_product(&mut *tx, product_id).await?;
    if !variant_ids.is_empty() && values.is_empty() {
        return Err(CatalogError::validation(
            "an option added to a product with variants needs at least one value",
        ));
    }

    let position = req
        .position
        .unwrap_or_else(|| next_position(existing.iter().map(|o| o.position)));
    let option = options::create_option(&mut *tx, product_id, &name, &display_name, position)
        .await?;
    let created = options::bulk_create_values(&mut *tx, option.id, &values).await?;

    if let Some(first) = created
        .iter()
        .min_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)))
    {
        let links: Vec<VariantOptionValueInsert> = variant_ids
            .iter()
            .map(|&variant_id| VariantOptionValueInsert {
                variant_id,
                option_id: option.id,
                option_value_id: first.id,
            })
            .collect();
        variant_options::create_variant_option_values(&mut *tx, &links).await?;
    }

    let added = read_models::get_options_with_variant_counts(&mut *tx, product_id)
        .await?
        .into_iter()
        .find(|o| o.option.id == option.id)
        .ok_or_else(|| CatalogError::internal("created option not found"))?;

    storefront_db::commit(tx).await?;

    tracing::info!(
        product_id,
        option_id = option.id,
        name = %option.name,
        values = created.len(),
        backfilled = variant_ids.len(),
        "option added"
    );
    Ok(added)
}

/// Add values to an existing option.
///
/// # Errors
///
/// - `PRODUCT_OPTION_NOT_FOUND` for an unknown or foreign option.
/// - `PRODUCT_OPTION_VALUE_EXISTS` when a value repeats within the batch or
///   already exists on the option.
/// - `VALIDATION_ERROR` for an empty batch or bad color code.
pub async fn add_values(
    pool: &PgPool,
    product_id: i64,
    option_id: i64,
    seller_id: Option<i64>,
    values: &[NewOptionValue],
) -> CatalogResult<Vec<OptionValueRow>> {
    if values.is_empty() {
        return Err(CatalogError::validation("values must not be empty"));
    }

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    options::find_option_by_id(&mut *tx, product_id, option_id).await?;

    let existing = options::find_values_by_option(&mut *tx, option_id).await?;
    let inserts = prepare_values(values, next_position(existing.iter().map(|v| v.position)))?;
    if let Some(dup) = inserts
        .iter()
        .find(|i| existing.iter().any(|e| e.value == i.value))
    {
        return Err(duplicate_value(&dup.value));
    }

    let created = options::bulk_create_values(&mut *tx, option_id, &inserts).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(product_id, option_id, added = created.len(), "option values added");
    Ok(created)
}

/// Change a value's display name, color code, or position.
///
/// # Errors
///
/// - `VALIDATION_ERROR` when the patch tries to change the value itself, is
///   empty, or carries a bad color code.
/// - `PRODUCT_OPTION_NOT_FOUND` / `PRODUCT_OPTION_VALUE_NOT_FOUND` for unknown ids.
pub async fn update_value(
    pool: &PgPool,
    product_id: i64,
    option_id: i64,
    value_id: i64,
    seller_id: Option<i64>,
    patch: &OptionValuePatch,
) -> CatalogResult<OptionValueRow> {
    if patch.display_name.is_none() && patch.color_code.is_none() && patch.position.is_none() {
        if patch.value.is_some() {
            return Err(CatalogError::validation("an option value cannot be changed"));
        }
        return Err(CatalogError::validation("no fields to update"));
    }
    validate_color_code(patch.color_code.as_deref())?;

    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    options::find_option_by_id(&mut *tx, product_id, option_id).await?;
    let current = options::find_value_by_id(&mut *tx, option_id, value_id).await?;

    if let Some(requested) = &patch.value {
        if option_value(requested) != current.value {
            return Err(CatalogError::validation(format!(
                "value '{}' cannot be changed; add a new value instead",
                current.value
            )));
        }
    }

    let update = OptionValueUpdate {
        id: value_id,
        display_name: patch
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        color_code: patch.color_code.clone(),
        position: patch.position,
    };
    let updated = options::bulk_update_values(&mut *tx, option_id, &[update])
        .await?
        .pop()
        .ok_or_else(|| CatalogError::internal("updated option value not returned"))?;
    storefront_db::commit(tx).await?;

    tracing::info!(product_id, option_id, value_id, "option value updated");
    Ok(updated)
}

/// Delete an option and its values. Refused while any variant uses it.
///
/// # Errors
///
/// - `PRODUCT_OPTION_NOT_FOUND` for an unknown or foreign option.
/// - `PRODUCT_OPTION_IN_USE` with the affected variant ids.
pub async fn delete_option(
    pool: &PgPool,
    product_id: i64,
    option_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<()> {
    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    options::find_option_by_id(&mut *tx, product_id, option_id).await?;

    let using = options::find_variants_using_option(&mut *tx, option_id).await?;
    validate_option_not_in_use(option_id, &using)?;

    options::delete_option(&mut *tx, option_id).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(product_id, option_id, "option deleted");
    Ok(())
}

/// Delete one option value. Refused while any variant uses it.
///
/// # Errors
///
/// - `PRODUCT_OPTION_NOT_FOUND` / `PRODUCT_OPTION_VALUE_NOT_FOUND` for unknown ids.
/// - `PRODUCT_OPTION_VALUE_IN_USE` with the affected variant ids.
pub async fn delete_value(
    pool: &PgPool,
    product_id: i64,
    option_id: i64,
    value_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<()> {
    let mut tx = storefront_db::begin(pool).await?;
    ownership_guard(&mut *tx, product_id, seller_id, Access::Write).await?;
    options::find_option_by_id(&mut *tx, product_id, option_id).await?;
    options::find_value_by_id(&mut *tx, option_id, value_id).await?;

    let using = options::find_variants_using_value(&mut *tx, value_id).await?;
    validate_value_not_in_use(value_id, &using)?;

    options::delete_value(&mut *tx, value_id).await?;
    storefront_db::commit(tx).await?;

    tracing::info!(product_id, option_id, value_id, "option value deleted");
    Ok(())
}

/// Options of a product with their values and per-value variant counts.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` for unknown or foreign products.
pub async fn get_available_options(
    pool: &PgPool,
    product_id: i64,
    seller_id: Option<i64>,
) -> CatalogResult<Vec<OptionWithValues>> {
    ownership_guard(pool, product_id, seller_id, Access::Read).await?;
    Ok(read_models::get_options_with_variant_counts(pool, product_id).await?)
}
