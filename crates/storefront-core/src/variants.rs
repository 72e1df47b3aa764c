//! Variant request types and the bulk last-one-wins rule.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::normalize::{option_key, option_value};
use crate::CatalogResult;

fn default_true() -> bool {
    true
}

/// Payload for creating a single variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVariant {
    pub sku: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default = "default_true")]
    pub allow_purchase: bool,
    /// `None` means the variant does not track stock.
    pub stock: Option<i32>,
    /// Option name → value, e.g. `{"color": "red", "size": "s"}`.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl NewVariant {
    /// The option selection with names snake-cased and values lowercased.
    ///
    /// # Errors
    ///
    /// See [`normalize_selection`].
    pub fn normalized_options(&self) -> CatalogResult<BTreeMap<String, String>> {
        normalize_selection(&self.options)
    }
}

/// Normalise a raw `name → value` selection the same way options are stored.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` when two raw names normalise to the same option,
/// e.g. `Color` and `color`.
pub fn normalize_selection(
    raw: &BTreeMap<String, String>,
) -> CatalogResult<BTreeMap<String, String>> {
    let mut normalized = BTreeMap::new();
    for (name, value) in raw {
        let key = option_key(name);
        if normalized.contains_key(&key) {
            return Err(CatalogError::validation(format!(
                "option '{key}' is given more than once"
            ))
            .with_details(serde_json::json!({ "option": key })));
        }
        normalized.insert(key, option_value(value));
    }
    Ok(normalized)
}

/// Sparse update of a variant's mutable fields. Absent fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPatch {
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub is_default: Option<bool>,
    pub is_popular: Option<bool>,
    pub allow_purchase: Option<bool>,
    pub stock: Option<i32>,
    /// Present only so a request that tries to change the combination can be
    /// rejected explicitly instead of being silently ignored.
    #[serde(default, skip_serializing)]
    pub options: Option<serde_json::Value>,
}

impl VariantPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.price.is_none()
            && self.images.is_none()
            && self.is_default.is_none()
            && self.is_popular.is_none()
            && self.allow_purchase.is_none()
            && self.stock.is_none()
    }

    #[must_use]
    pub fn sets_default(&self) -> bool {
        self.is_default == Some(true)
    }
}

/// One entry of a bulk update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVariantPatch {
    pub variant_id: i64,
    #[serde(flatten)]
    pub patch: VariantPatch,
}

/// Enforce last-one-wins on `is_default` across a bulk update.
///
/// Every entry that sets `is_default = true` except the last one is rewritten
/// to `is_default = false`. Returns the variant id that stays default.
pub fn apply_last_default_wins(items: &mut [BulkVariantPatch]) -> Option<i64> {
    let last = crate::combination::last_default_index(items.iter().map(|i| i.patch.sets_default()))?;
    let winner = items[last].variant_id;
    for (idx, item) in items.iter_mut().enumerate() {
        if idx != last && item.patch.sets_default() {
            item.patch.is_default = Some(false);
        }
    }
    Some(winner)
}
