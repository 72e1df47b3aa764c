//! Error taxonomy shared by the gateway, the engines, and the HTTP layer.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Coarse failure class. Engines attach context but never change the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Validation,
    Conflict,
    Internal,
}

/// Machine-readable code surfaced as `errorCode` in the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ProductNotFound,
    VariantNotFound,
    ProductOptionNotFound,
    ProductOptionValueNotFound,
    Forbidden,
    ValidationError,
    SkuConflict,
    ProductSkuConflict,
    VariantCombinationExists,
    ProductOptionNameExists,
    ProductOptionValueExists,
    ProductOptionInUse,
    ProductOptionValueInUse,
    LastVariantDeleteNotAllowed,
    InsufficientStock,
    VariantOutOfStock,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ProductNotFound => "PRODUCT_NOT_FOUND",
            ErrorCode::VariantNotFound => "VARIANT_NOT_FOUND",
            ErrorCode::ProductOptionNotFound => "PRODUCT_OPTION_NOT_FOUND",
            ErrorCode::ProductOptionValueNotFound => "PRODUCT_OPTION_VALUE_NOT_FOUND",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::SkuConflict => "SKU_CONFLICT",
            ErrorCode::ProductSkuConflict => "PRODUCT_SKU_CONFLICT",
            ErrorCode::VariantCombinationExists => "VARIANT_COMBINATION_EXISTS",
            ErrorCode::ProductOptionNameExists => "PRODUCT_OPTION_NAME_EXISTS",
            ErrorCode::ProductOptionValueExists => "PRODUCT_OPTION_VALUE_EXISTS",
            ErrorCode::ProductOptionInUse => "PRODUCT_OPTION_IN_USE",
            ErrorCode::ProductOptionValueInUse => "PRODUCT_OPTION_VALUE_IN_USE",
            ErrorCode::LastVariantDeleteNotAllowed => "LAST_VARIANT_DELETE_NOT_ALLOWED",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::VariantOutOfStock => "VARIANT_OUT_OF_STOCK",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::ProductNotFound
            | ErrorCode::VariantNotFound
            | ErrorCode::ProductOptionNotFound
            | ErrorCode::ProductOptionValueNotFound => ErrorKind::NotFound,
            ErrorCode::Forbidden => ErrorKind::Forbidden,
            ErrorCode::ValidationError => ErrorKind::Validation,
            ErrorCode::SkuConflict
            | ErrorCode::ProductSkuConflict
            | ErrorCode::VariantCombinationExists
            | ErrorCode::ProductOptionNameExists
            | ErrorCode::ProductOptionValueExists
            | ErrorCode::ProductOptionInUse
            | ErrorCode::ProductOptionValueInUse
            | ErrorCode::LastVariantDeleteNotAllowed
            | ErrorCode::InsufficientStock
            | ErrorCode::VariantOutOfStock => ErrorKind::Conflict,
            ErrorCode::InternalError => ErrorKind::Internal,
        }
    }

    /// HTTP status the handler layer responds with.
    ///
    /// State conflicts the client can fix by changing its request (in-use
    /// deletes, last variant, stock) are 400; uniqueness conflicts are 409.
    #[must_use]
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::ProductNotFound
            | ErrorCode::VariantNotFound
            | ErrorCode::ProductOptionNotFound
            | ErrorCode::ProductOptionValueNotFound => 404,
            ErrorCode::Forbidden => 403,
            ErrorCode::ValidationError
            | ErrorCode::ProductOptionInUse
            | ErrorCode::ProductOptionValueInUse
            | ErrorCode::LastVariantDeleteNotAllowed
            | ErrorCode::InsufficientStock
            | ErrorCode::VariantOutOfStock => 400,
            ErrorCode::SkuConflict
            | ErrorCode::ProductSkuConflict
            | ErrorCode::VariantCombinationExists
            | ErrorCode::ProductOptionNameExists
            | ErrorCode::ProductOptionValueExists => 409,
            ErrorCode::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure from any catalog operation.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct CatalogError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl CatalogError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn product_not_found(product_id: i64) -> Self {
        Self::new(
            ErrorCode::ProductNotFound,
            format!("product {product_id} not found"),
        )
    }

    pub fn variant_not_found(variant_id: i64) -> Self {
        Self::new(
            ErrorCode::VariantNotFound,
            format!("variant {variant_id} not found"),
        )
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::LastVariantDeleteNotAllowed).unwrap();
        assert_eq!(json, "\"LAST_VARIANT_DELETE_NOT_ALLOWED\"");
        assert_eq!(
            ErrorCode::LastVariantDeleteNotAllowed.as_str(),
            "LAST_VARIANT_DELETE_NOT_ALLOWED"
        );
    }

    #[test]
    fn as_str_agrees_with_serde_for_every_code() {
        let all = [
            ErrorCode::ProductNotFound,
            ErrorCode::VariantNotFound,
            ErrorCode::ProductOptionNotFound,
            ErrorCode::ProductOptionValueNotFound,
            ErrorCode::Forbidden,
            ErrorCode::ValidationError,
            ErrorCode::SkuConflict,
            ErrorCode::ProductSkuConflict,
            ErrorCode::VariantCombinationExists,
            ErrorCode::ProductOptionNameExists,
            ErrorCode::ProductOptionValueExists,
            ErrorCode::ProductOptionInUse,
            ErrorCode::ProductOptionValueInUse,
            ErrorCode::LastVariantDeleteNotAllowed,
            ErrorCode::InsufficientStock,
            ErrorCode::VariantOutOfStock,
            ErrorCode::InternalError,
        ];
        for code in all {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json.as_str(), Some(code.as_str()));
        }
    }

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(ErrorCode::VariantNotFound.status(), 404);
        assert_eq!(ErrorCode::ValidationError.status(), 400);
        assert_eq!(ErrorCode::VariantCombinationExists.status(), 409);
        assert_eq!(ErrorCode::SkuConflict.status(), 409);
        assert_eq!(ErrorCode::ProductOptionInUse.status(), 400);
        assert_eq!(ErrorCode::LastVariantDeleteNotAllowed.status(), 400);
        assert_eq!(ErrorCode::InsufficientStock.status(), 400);
        assert_eq!(ErrorCode::InternalError.status(), 500);
    }

    #[test]
    fn in_use_is_a_conflict_even_though_it_is_a_400() {
        assert_eq!(ErrorCode::ProductOptionValueInUse.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::ProductOptionValueInUse.status(), 400);
    }

    #[test]
    fn with_details_attaches_payload() {
        let err = CatalogError::variant_not_found(7)
            .with_details(serde_json::json!({ "availableOptions": {} }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.details.is_some());
        assert_eq!(err.to_string(), "VARIANT_NOT_FOUND: variant 7 not found");
    }
}
