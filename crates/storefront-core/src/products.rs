//! Product and option request types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::variants::NewVariant;

fn default_true() -> bool {
    true
}

/// One value of an option as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOptionValue {
    pub value: String,
    pub display_name: Option<String>,
    /// `#rrggbb`; exactly seven characters when present.
    pub color_code: Option<String>,
    pub position: Option<i32>,
}

/// An option dimension (e.g. color) with its initial values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOption {
    pub name: String,
    pub display_name: Option<String>,
    pub position: Option<i32>,
    #[serde(default)]
    pub values: Vec<NewOptionValue>,
}

/// Sparse update of an option value. `value` itself is immutable; it is
/// accepted only so that an attempted change can be rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionValuePatch {
    pub value: Option<String>,
    pub display_name: Option<String>,
    pub color_code: Option<String>,
    pub position: Option<i32>,
}

/// Price, stock, and flags applied to every auto-generated variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultVariantSettings {
    pub price: Decimal,
    pub stock: Option<i32>,
    #[serde(default = "default_true")]
    pub allow_purchase: bool,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Create a product together with its options and initial variants.
///
/// Exactly one of these applies, in order: `auto_generate_variants` builds
/// the Cartesian product of option values from `default_variant_settings`;
/// otherwise explicit `variants` are created; otherwise a single variant with
/// the base SKU is created from `default_variant_settings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Owner to assign when an administrator creates the product. Ignored
    /// when the caller is a seller.
    #[serde(default)]
    pub seller_id: Option<i64>,
    pub name: String,
    pub brand: Option<String>,
    pub base_sku: String,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<NewOption>,
    #[serde(default)]
    pub auto_generate_variants: bool,
    pub default_variant_settings: Option<DefaultVariantSettings>,
    #[serde(default)]
    pub variants: Vec<NewVariant>,
}

/// Sparse update of product metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category_id: Option<i64>,
    pub description: Option<String>,
}

impl ProductPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.brand.is_none()
            && self.category_id.is_none()
            && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_parses_auto_generation_request() {
        let req: NewProduct = serde_json::from_value(serde_json::json!({
            "name": "Classic Tee",
            "baseSku": "TSHIRT-001",
            "options": [
                { "name": "color", "values": [{ "value": "red" }, { "value": "blue" }] },
                { "name": "size", "values": [{ "value": "s" }, { "value": "m" }] }
            ],
            "autoGenerateVariants": true,
            "defaultVariantSettings": { "price": 25, "stock": 10 }
        }))
        .unwrap();
        assert!(req.auto_generate_variants);
        assert_eq!(req.options.len(), 2);
        let defaults = req.default_variant_settings.unwrap();
        assert_eq!(defaults.price, Decimal::from(25));
        assert_eq!(defaults.stock, Some(10));
        assert!(defaults.allow_purchase);
        assert!(req.variants.is_empty());
    }

    #[test]
    fn empty_product_patch_is_detected() {
        assert!(ProductPatch::default().is_empty());
        let patch = ProductPatch {
            brand: Some("Acme".to_string()),
            ..ProductPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
