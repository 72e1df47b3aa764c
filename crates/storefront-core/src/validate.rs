//! Stateless validation rules. Every function returns a typed
//! [`CatalogError`] so callers can propagate with `?`.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::combination::CombinationKey;
use crate::error::{CatalogError, ErrorCode};

static OPTION_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid option key regex"));

pub const MAX_SKU_LEN: usize = 100;
pub const COLOR_CODE_LEN: usize = 7;

/// Seller scoping. `seller_id = None` is an administrator and always passes.
///
/// A mismatch is reported as `PRODUCT_NOT_FOUND` so that callers cannot probe
/// for products owned by other sellers.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` when the product belongs to another seller.
pub fn validate_ownership(
    product_id: i64,
    product_seller_id: i64,
    seller_id: Option<i64>,
) -> Result<(), CatalogError> {
    match seller_id {
        None => Ok(()),
        Some(caller) if caller == product_seller_id => Ok(()),
        Some(_) => Err(CatalogError::product_not_found(product_id)),
    }
}

/// # Errors
///
/// Returns `VALIDATION_ERROR` unless `value` matches `^[a-z0-9_]+$`.
pub fn validate_option_key(value: &str) -> Result<(), CatalogError> {
    if OPTION_KEY_RE.is_match(value) {
        Ok(())
    } else {
        Err(CatalogError::validation(format!(
            "'{value}' must match [a-z0-9_]+"
        )))
    }
}

/// # Errors
///
/// Returns `VALIDATION_ERROR` when a color code is present but not exactly seven characters.
pub fn validate_color_code(color_code: Option<&str>) -> Result<(), CatalogError> {
    match color_code {
        Some(code) if code.chars().count() != COLOR_CODE_LEN => Err(CatalogError::validation(
            format!("colorCode must be exactly {COLOR_CODE_LEN} characters, got '{code}'"),
        )),
        _ => Ok(()),
    }
}

/// # Errors
///
/// Returns `VALIDATION_ERROR` for an empty selection or any empty name/value.
pub fn validate_variant_options_structure(
    options: &BTreeMap<String, String>,
) -> Result<(), CatalogError> {
    if options.is_empty() {
        return Err(CatalogError::validation("options must not be empty"));
    }
    for (name, value) in options {
        if name.trim().is_empty() {
            return Err(CatalogError::validation("option names must not be empty"));
        }
        if value.trim().is_empty() {
            return Err(CatalogError::validation(format!(
                "value for option '{name}' must not be empty"
            )));
        }
    }
    Ok(())
}

/// `existing_match` is the id of a variant already holding `requested`, if any.
///
/// # Errors
///
/// Returns `VARIANT_COMBINATION_EXISTS` when a match exists.
pub fn validate_combination_unique(
    existing_match: Option<i64>,
    requested: &CombinationKey,
) -> Result<(), CatalogError> {
    match existing_match {
        None => Ok(()),
        Some(variant_id) => Err(CatalogError::new(
            ErrorCode::VariantCombinationExists,
            format!("a variant with options [{requested}] already exists"),
        )
        .with_details(serde_json::json!({
            "existingVariantId": variant_id,
            "combination": requested.as_str(),
        }))),
    }
}

/// Reject combination keys that repeat within one batch or collide with
/// keys already stored for the product.
///
/// # Errors
///
/// Returns `VARIANT_COMBINATION_EXISTS` naming the first offending key.
pub fn validate_batch_combinations_unique<'a, I>(
    existing: &HashSet<CombinationKey>,
    requested: I,
) -> Result<(), CatalogError>
where
    I: IntoIterator<Item = &'a CombinationKey>,
{
    let mut seen = HashSet::new();
    for (index, key) in requested.into_iter().enumerate() {
        if existing.contains(key) || !seen.insert(key) {
            return Err(CatalogError::new(
                ErrorCode::VariantCombinationExists,
                format!("a variant with options [{key}] already exists"),
            )
            .with_details(serde_json::json!({ "index": index, "combination": key.as_str() })));
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns `LAST_VARIANT_DELETE_NOT_ALLOWED` when `variant_count <= 1`.
pub fn validate_can_delete(variant_count: i64) -> Result<(), CatalogError> {
    if variant_count <= 1 {
        Err(CatalogError::new(
            ErrorCode::LastVariantDeleteNotAllowed,
            "a product must keep at least one variant",
        ))
    } else {
        Ok(())
    }
}

/// Every requested id must be present in `fetched` as `(variant_id, product_id)`
/// and belong to `product_id`.
///
/// # Errors
///
/// Returns `VARIANT_NOT_FOUND` listing the missing or foreign ids.
pub fn validate_bulk_variants_exist(
    product_id: i64,
    requested: &[i64],
    fetched: &[(i64, i64)],
) -> Result<(), CatalogError> {
    let owned: HashSet<i64> = fetched
        .iter()
        .filter(|(_, owner)| *owner == product_id)
        .map(|(id, _)| *id)
        .collect();
    let missing: Vec<i64> = requested
        .iter()
        .copied()
        .filter(|id| !owned.contains(id))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::new(
            ErrorCode::VariantNotFound,
            format!("variants not found for product {product_id}: {missing:?}"),
        )
        .with_details(serde_json::json!({ "missingVariantIds": missing })))
    }
}

/// # Errors
///
/// Returns `PRODUCT_OPTION_VALUE_IN_USE` with the using variant ids.
pub fn validate_value_not_in_use(value_id: i64, using_variants: &[i64]) -> Result<(), CatalogError> {
    if using_variants.is_empty() {
        return Ok(());
    }
    Err(CatalogError::new(
        ErrorCode::ProductOptionValueInUse,
        format!(
            "option value {value_id} is used by {} variant(s)",
            using_variants.len()
        ),
    )
    .with_details(serde_json::json!({
        "variantCount": using_variants.len(),
        "variantIds": using_variants,
    })))
}

/// # Errors
///
/// Returns `PRODUCT_OPTION_IN_USE` with the using variant ids.
pub fn validate_option_not_in_use(option_id: i64, using_variants: &[i64]) -> Result<(), CatalogError> {
    if using_variants.is_empty() {
        return Ok(());
    }
    Err(CatalogError::new(
        ErrorCode::ProductOptionInUse,
        format!(
            "option {option_id} is used by {} variant(s)",
            using_variants.len()
        ),
    )
    .with_details(serde_json::json!({
        "variantCount": using_variants.len(),
        "variantIds": using_variants,
    })))
}

/// # Errors
///
/// Returns `VALIDATION_ERROR` unless `price > 0`.
pub fn validate_price(price: Decimal) -> Result<(), CatalogError> {
    if price > Decimal::ZERO {
        Ok(())
    } else {
        Err(CatalogError::validation(format!(
            "price must be greater than 0, got {price}"
        )))
    }
}

/// # Errors
///
/// Returns `VALIDATION_ERROR` when `stock < 0`.
pub fn validate_stock(stock: Option<i32>) -> Result<(), CatalogError> {
    match stock {
        Some(s) if s < 0 => Err(CatalogError::validation(format!(
            "stock must be >= 0, got {s}"
        ))),
        _ => Ok(()),
    }
}

/// # Errors
///
/// Returns `VALIDATION_ERROR` for an empty SKU or one longer than 100 characters.
pub fn validate_sku(sku: &str) -> Result<(), CatalogError> {
    let trimmed = sku.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation("sku must not be empty"));
    }
    if trimmed.chars().count() > MAX_SKU_LEN {
        return Err(CatalogError::validation(format!(
            "sku must be at most {MAX_SKU_LEN} characters"
        )));
    }
    Ok(())
}
