//! Resolving `name → value` selections against a product's option catalog.

use std::collections::{BTreeMap, HashMap};

use storefront_core::{CatalogError, CatalogResult, CombinationKey, ErrorCode, OptionAxis};
use storefront_db::{OptionRow, OptionValueRow, VariantOption};

/// A selection mapped onto stored ids, one link per product option.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedCombination {
    pub key: CombinationKey,
    /// Ordered by option position.
    pub links: Vec<VariantOption>,
}

/// In-memory view of a product's options and their values.
#[derive(Debug, Clone, Default)]
pub(crate) struct OptionIndex {
    /// Sorted by `(position, name)`.
    options: Vec<OptionRow>,
    by_name: HashMap<String, usize>,
    /// Values per option id, sorted by `(position, id)`.
    values: HashMap<i64, Vec<OptionValueRow>>,
}

impl OptionIndex {
    pub fn new(mut options: Vec<OptionRow>, values: Vec<OptionValueRow>) -> Self {
        options.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        let by_name = options
            .iter()
            .enumerate()
            .map(|(idx, o)| (o.name.clone(), idx))
            .collect();

        let mut grouped: HashMap<i64, Vec<OptionValueRow>> = HashMap::new();
        for value in values {
            grouped.entry(value.option_id).or_default().push(value);
        }
        for list in grouped.values_mut() {
            list.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        }

        Self {
            options,
            by_name,
            values: grouped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    fn value_of(&self, option_id: i64, value: &str) -> Option<&OptionValueRow> {
        self.values
            .get(&option_id)
            .and_then(|list| list.iter().find(|v| v.value == value))
    }

    /// Map a normalised selection to ids.
    ///
    /// # Errors
    ///
    /// - `PRODUCT_OPTION_NOT_FOUND` for an option name the product lacks.
    /// - `PRODUCT_OPTION_VALUE_NOT_FOUND` for a value the option lacks.
    /// - `VALIDATION_ERROR` when the selection omits any product option.
    pub fn resolve(&self, selection: &BTreeMap<String, String>) -> CatalogResult<ResolvedCombination> {
        for (name, value) in selection {
            let Some(&idx) = self.by_name.get(name) else {
                return Err(CatalogError::new(
                    ErrorCode::ProductOptionNotFound,
                    format!("option '{name}' does not exist on this product"),
                )
                .with_details(serde_json::json!({ "availableOptions": self.available() })));
            };
            if self.value_of(self.options[idx].id, value).is_none() {
                return Err(CatalogError::new(
                    ErrorCode::ProductOptionValueNotFound,
                    format!("value '{value}' does not exist for option '{name}'"),
                )
                .with_details(serde_json::json!({ "availableOptions": self.available() })));
            }
        }

        let missing: Vec<&str> = self
            .options
            .iter()
            .filter(|o| !selection.contains_key(&o.name))
            .map(|o| o.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(CatalogError::validation(format!(
                "a value is required for every option; missing: {}",
                missing.join(", ")
            ))
            .with_details(serde_json::json!({ "missingOptions": missing })));
        }

        let mut links = Vec::with_capacity(self.options.len());
        for option in &self.options {
            let raw = &selection[&option.name];
            let value = self
                .value_of(option.id, raw)
                .ok_or_else(|| CatalogError::internal("option value vanished during resolution"))?;
            links.push(link(option, value));
        }

        Ok(ResolvedCombination {
            key: CombinationKey::from_selection(selection),
            links,
        })
    }

    /// Option name → value strings in display order.
    pub fn available(&self) -> BTreeMap<String, Vec<String>> {
        self.options
            .iter()
            .map(|o| {
                let values = self
                    .values
                    .get(&o.id)
                    .map(|list| list.iter().map(|v| v.value.clone()).collect())
                    .unwrap_or_default();
                (o.name.clone(), values)
            })
            .collect()
    }

    /// Axes for Cartesian generation.
    pub fn axes(&self) -> Vec<OptionAxis> {
        self.options
            .iter()
            .map(|o| OptionAxis {
                name: o.name.clone(),
                position: o.position,
                values: self
                    .values
                    .get(&o.id)
                    .map(|list| list.iter().map(|v| v.value.clone()).collect())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

pub(crate) fn link(option: &OptionRow, value: &OptionValueRow) -> VariantOption {
    VariantOption {
        option_id: option.id,
        option_name: option.name.clone(),
        option_display_name: option.display_name.clone(),
        option_position: option.position,
        value_id: value.id,
        value: value.value.clone(),
        value_display_name: value.display_name.clone(),
        color_code: value.color_code.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn option(id: i64, name: &str, position: i32) -> OptionRow {
        OptionRow {
            id,
            product_id: 1,
            name: name.to_string(),
            display_name: name.to_uppercase(),
            position,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn value(id: i64, option_id: i64, raw: &str, position: i32) -> OptionValueRow {
        OptionValueRow {
            id,
            option_id,
            value: raw.to_string(),
            display_name: raw.to_uppercase(),
            color_code: None,
            position,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn shirt_index() -> OptionIndex {
        OptionIndex::new(
            vec![option(2, "size", 1), option(1, "color", 0)],
            vec![
                value(10, 1, "red", 0),
                value(11, 1, "blue", 1),
                value(21, 2, "m", 1),
                value(20, 2, "s", 0),
            ],
        )
    }

    fn selection(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn resolves_links_in_option_position_order() {
        let resolved = shirt_index()
            .resolve(&selection(&[("size", "m"), ("color", "blue")]))
            .expect("resolve");
        let ids: Vec<(i64, i64)> = resolved.links.iter().map(|l| (l.option_id, l.value_id)).collect();
        assert_eq!(ids, vec![(1, 11), (2, 21)]);
        assert_eq!(resolved.key.as_str(), "color:blue;size:m");
    }

    #[test]
    fn unknown_option_is_option_not_found() {
        let err = shirt_index()
            .resolve(&selection(&[("color", "red"), ("size", "s"), ("fit", "slim")]))
            .expect_err("unknown option");
        assert_eq!(err.code, ErrorCode::ProductOptionNotFound);
    }

    #[test]
    fn unknown_value_is_value_not_found() {
        let err = shirt_index()
            .resolve(&selection(&[("color", "green"), ("size", "s")]))
            .expect_err("unknown value");
        assert_eq!(err.code, ErrorCode::ProductOptionValueNotFound);
        assert!(err.details.is_some());
    }

    #[test]
    fn partial_selection_is_rejected() {
        let err = shirt_index()
            .resolve(&selection(&[("color", "red")]))
            .expect_err("missing size");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("size"));
    }

    #[test]
    fn available_lists_values_in_position_order() {
        let available = shirt_index().available();
        assert_eq!(available["color"], vec!["red", "blue"]);
        assert_eq!(available["size"], vec!["s", "m"]);
    }

    #[test]
    fn empty_catalog_resolves_empty_selection() {
        let resolved = OptionIndex::default()
            .resolve(&BTreeMap::new())
            .expect("resolve");
        assert!(resolved.links.is_empty());
        assert_eq!(resolved.key.as_str(), "");
    }
}
