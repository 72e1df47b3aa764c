use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Set,
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub operation: StockOperation,
    pub quantity: i32,
}

/// Compute the stock level after applying `operation`.
///
/// `current` is `None` for variants that do not track stock; only `set` is
/// allowed on those (it starts tracking).
///
/// # Errors
///
/// - `VALIDATION_ERROR` for a negative quantity, overflow, or add/subtract on
///   an untracked variant.
/// - `VARIANT_OUT_OF_STOCK` when subtracting from zero stock.
/// - `INSUFFICIENT_STOCK` when the subtraction would go below zero.
pub fn apply_stock_operation(
    current: Option<i32>,
    operation: StockOperation,
    quantity: i32,
) -> Result<i32, CatalogError> {
    if quantity < 0 {
        return Err(CatalogError::validation(format!(
            "quantity must be >= 0, got {quantity}"
        )));
    }

    match (operation, current) {
        (StockOperation::Set, _) => Ok(quantity),
        (StockOperation::Add | StockOperation::Subtract, None) => Err(CatalogError::validation(
            "variant does not track stock; use operation 'set' first",
        )),
        (StockOperation::Add, Some(stock)) => stock
            .checked_add(quantity)
            .ok_or_else(|| CatalogError::validation("stock would overflow")),
        (StockOperation::Subtract, Some(0)) if quantity > 0 => Err(CatalogError::new(
            ErrorCode::VariantOutOfStock,
            "variant is out of stock",
        )),
        (StockOperation::Subtract, Some(stock)) if quantity > stock => Err(CatalogError::new(
            ErrorCode::InsufficientStock,
            format!("insufficient stock: requested {quantity}, available {stock}"),
        )
        .with_details(serde_json::json!({ "requested": quantity, "available": stock }))),
        (StockOperation::Subtract, Some(stock)) => Ok(stock - quantity),
    }
}
