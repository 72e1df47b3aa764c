//! Pagination and filter normalisation for variant listings.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::variants::normalize_selection;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Price,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortBy {
    /// Column name used in `ORDER BY`; never derived from user input.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            SortBy::Price => "pv.price",
            SortBy::CreatedAt => "pv.created_at",
            SortBy::UpdatedAt => "pv.updated_at",
        }
    }

    fn parse(raw: &str) -> Result<Self, CatalogError> {
        match raw {
            "price" => Ok(SortBy::Price),
            "created_at" | "createdAt" => Ok(SortBy::CreatedAt),
            "updated_at" | "updatedAt" => Ok(SortBy::UpdatedAt),
            other => Err(CatalogError::validation(format!(
                "sortBy must be one of price, created_at, updated_at; got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(raw: &str) -> Result<Self, CatalogError> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(CatalogError::validation(format!(
                "sortOrder must be asc or desc; got '{other}'"
            ))),
        }
    }
}

/// Raw list query as it arrives from a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVariantsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub product_ids: Vec<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub allow_purchase: Option<bool>,
    pub is_popular: Option<bool>,
    pub is_default: Option<bool>,
    pub sku: Option<String>,
}

/// Filter surface after normalisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantFilters {
    pub ids: Vec<i64>,
    pub product_ids: Vec<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub allow_purchase: Option<bool>,
    pub is_popular: Option<bool>,
    pub is_default: Option<bool>,
    /// Partial, case-insensitive SKU match.
    pub sku: Option<String>,
    /// Conjunction of `option name = value` constraints.
    pub options: BTreeMap<String, String>,
}

/// Apply the shared paging defaults: `page` defaults to 1 and must be >= 1;
/// `page_size` defaults to 20 and is clamped into `[1, 100]`.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` for `page < 1`.
pub fn normalize_page(page: Option<i64>, page_size: Option<i64>) -> Result<(u32, u32), CatalogError> {
    let page = match page {
        None => 1,
        Some(p) if p >= 1 => u32::try_from(p)
            .map_err(|_| CatalogError::validation(format!("page {p} is too large")))?,
        Some(p) => {
            return Err(CatalogError::validation(format!(
                "page must be >= 1, got {p}"
            )))
        }
    };

    let page_size = page_size.map_or(i64::from(DEFAULT_PAGE_SIZE), |s| {
        s.clamp(1, i64::from(MAX_PAGE_SIZE))
    });
    let page_size = u32::try_from(page_size).unwrap_or(DEFAULT_PAGE_SIZE);
    Ok((page, page_size))
}

/// Row offset of the first item on `page`.
#[must_use]
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(page_size)
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantListRequest {
    pub page: u32,
    pub page_size: u32,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub filters: VariantFilters,
}

impl VariantListRequest {
    /// Apply defaults and bounds to a raw query.
    ///
    /// `page` defaults to 1 and must be >= 1. `page_size` defaults to 20 and
    /// is clamped into `[1, 100]`.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_ERROR` for `page < 1`, an unknown sort key or
    /// order, or `min_price > max_price`.
    pub fn from_query(
        query: ListVariantsQuery,
        option_filters: &BTreeMap<String, String>,
    ) -> Result<Self, CatalogError> {
        let (page, page_size) = normalize_page(query.page, query.page_size)?;

        let sort_by = query
            .sort_by
            .as_deref()
            .map(SortBy::parse)
            .transpose()?
            .unwrap_or_default();
        let sort_order = query
            .sort_order
            .as_deref()
            .map(SortOrder::parse)
            .transpose()?
            .unwrap_or_default();

        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(CatalogError::validation(format!(
                    "minPrice ({min}) must not exceed maxPrice ({max})"
                )));
            }
        }

        let sku = query
            .sku
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            page,
            page_size,
            sort_by,
            sort_order,
            filters: VariantFilters {
                ids: query.ids,
                product_ids: query.product_ids,
                min_price: query.min_price,
                max_price: query.max_price,
                allow_purchase: query.allow_purchase,
                is_popular: query.is_popular,
                is_default: query.is_default,
                sku,
                options: normalize_selection(option_filters)?,
            },
        })
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        page_offset(self.page, self.page_size)
    }
}
