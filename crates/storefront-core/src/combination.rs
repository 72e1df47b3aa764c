//! Combination keys and Cartesian variant generation.

use std::collections::BTreeMap;

/// Canonical identity of a variant within its product: `name:value` pairs
/// joined by `;`, ordered by option name. Option positions do not take part,
/// so a key built from a stored selection equals one built from a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CombinationKey(String);

impl CombinationKey {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let ordered: BTreeMap<&str, &str> = pairs.into_iter().collect();
        let joined = ordered
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join(";");
        Self(joined)
    }

    #[must_use]
    pub fn from_selection(selection: &BTreeMap<String, String>) -> Self {
        Self::from_pairs(selection.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One option dimension fed into [`cartesian_product`].
#[derive(Debug, Clone)]
pub struct OptionAxis {
    pub name: String,
    pub position: i32,
    /// Values in their display order.
    pub values: Vec<String>,
}

/// Most variants one product may auto-generate.
pub const MAX_GENERATED_VARIANTS: usize = 1000;

/// Number of combinations [`cartesian_product`] would yield, or `None` if the
/// count overflows `usize`.
#[must_use]
pub fn combination_count(axes: &[OptionAxis]) -> Option<usize> {
    axes.iter()
        .try_fold(1usize, |acc, axis| acc.checked_mul(axis.values.len()))
}

/// Every combination of one value per axis.
///
/// Axes are ordered by `(position, name)`; the first axis varies slowest, so
/// `color={red,blue}` × `size={s,m}` yields red-s, red-m, blue-s, blue-m.
/// Each combination lists `(option name, value)` in axis order. No axes yields
/// a single empty combination; an axis without values yields none.
#[must_use]
pub fn cartesian_product(axes: &[OptionAxis]) -> Vec<Vec<(String, String)>> {
    let mut ordered: Vec<&OptionAxis> = axes.iter().collect();
    ordered.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));

    let mut combos: Vec<Vec<(String, String)>> = vec![Vec::new()];
    for axis in ordered {
        let mut next = Vec::with_capacity(combos.len() * axis.values.len());
        for prefix in &combos {
            for value in &axis.values {
                let mut combo = prefix.clone();
                combo.push((axis.name.clone(), value.clone()));
                next.push(combo);
            }
        }
        combos = next;
    }
    combos
}

/// SKU for an auto-generated variant: the base SKU followed by `-<value>` for
/// each dimension, in the order given.
#[must_use]
pub fn generated_sku(base_sku: &str, combination: &[(String, String)]) -> String {
    let mut sku = base_sku.to_string();
    for (_, value) in combination {
        sku.push('-');
        sku.push_str(value);
    }
    sku
}

/// Index of the last `true` flag, if any. Used for last-one-wins default selection.
pub fn last_default_index<I>(flags: I) -> Option<usize>
where
    I: IntoIterator<Item = bool>,
{
    flags
        .into_iter()
        .enumerate()
        .filter(|(_, is_default)| *is_default)
        .map(|(idx, _)| idx)
        .last()
}
