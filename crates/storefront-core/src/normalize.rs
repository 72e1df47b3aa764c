//! Input normalisation applied before any validation or persistence.

/// Generate a URL-safe slug from a product name.
///
/// Non-ASCII characters are dropped; runs of separators collapse to one `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else if c == ' ' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Normalise an option name to lowercase `snake_case`.
///
/// `"Shoe Size"` and `"shoe-size"` both become `"shoe_size"`. Characters
/// outside `[a-z0-9_]` are dropped, so the result may still fail
/// [`crate::validate::validate_option_key`] if nothing usable remains.
#[must_use]
pub fn option_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Normalise an option value: trimmed and lowercased.
#[must_use]
pub fn option_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Human-readable fallback for a missing display name: `"x_large"` → `"X Large"`.
#[must_use]
pub fn display_name_from_key(key: &str) -> String {
    key.split('_')
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
