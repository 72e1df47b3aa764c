use storefront_core::{CatalogError, ErrorCode};
use thiserror::Error;

pub(crate) const PRODUCT_BASE_SKU_KEY: &str = "products_base_sku_key";
pub(crate) const VARIANT_SKU_KEY: &str = "product_variants_sku_key";
pub(crate) const VARIANT_SINGLE_DEFAULT_IDX: &str = "idx_product_variant_single_default";
pub(crate) const OPTION_NAME_KEY: &str = "product_options_product_id_name_key";
pub(crate) const OPTION_VALUE_KEY: &str = "product_option_values_option_id_value_key";
pub(crate) const VARIANT_OPTION_KEY: &str = "variant_option_values_variant_id_option_id_key";

/// The kind of row a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Product,
    Option,
    OptionValue,
    Variant,
}

impl Entity {
    fn not_found_code(self) -> ErrorCode {
        match self {
            Entity::Product => ErrorCode::ProductNotFound,
            Entity::Option => ErrorCode::ProductOptionNotFound,
            Entity::OptionValue => ErrorCode::ProductOptionValueNotFound,
            Entity::Variant => ErrorCode::VariantNotFound,
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Product => write!(f, "product"),
            Entity::Option => write!(f, "option"),
            Entity::OptionValue => write!(f, "option value"),
            Entity::Variant => write!(f, "variant"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },
    #[error("foreign key violated: {constraint}")]
    ForeignKey { constraint: String },
    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String },
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub(crate) fn not_found(entity: Entity, id: i64) -> Self {
        DbError::NotFound { entity, id }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some("23505") => return DbError::Conflict { constraint },
                Some("23503") => return DbError::ForeignKey { constraint },
                Some("23514") => return DbError::CheckViolation { constraint },
                _ => {}
            }
        }
        DbError::Sqlx(err)
    }
}

fn conflict_error(constraint: &str) -> CatalogError {
    match constraint {
        VARIANT_SKU_KEY => CatalogError::new(ErrorCode::SkuConflict, "a variant with that sku already exists"),
        PRODUCT_BASE_SKU_KEY => CatalogError::new(
            ErrorCode::ProductSkuConflict,
            "a product with that base sku already exists",
        ),
        OPTION_NAME_KEY => CatalogError::new(
            ErrorCode::ProductOptionNameExists,
            "an option with that name already exists on this product",
        ),
        OPTION_VALUE_KEY => CatalogError::new(
            ErrorCode::ProductOptionValueExists,
            "that value already exists on this option",
        ),
        VARIANT_OPTION_KEY => CatalogError::new(
            ErrorCode::VariantCombinationExists,
            "variant already has a value for that option",
        ),
        VARIANT_SINGLE_DEFAULT_IDX => {
            tracing::error!(constraint, "single-default index rejected a write");
            CatalogError::internal("default variant could not be assigned")
        }
        other => {
            tracing::error!(constraint = other, "unmapped unique constraint violation");
            CatalogError::internal("database query failed")
        }
    }
}

impl From<DbError> for CatalogError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                CatalogError::new(entity.not_found_code(), format!("{entity} {id} not found"))
            }
            DbError::Conflict { constraint } => conflict_error(&constraint),
            DbError::ForeignKey { constraint } => CatalogError::validation(format!(
                "referenced record does not exist ({constraint})"
            )),
            DbError::CheckViolation { constraint } => {
                CatalogError::validation(format!("value violates constraint {constraint}"))
            }
            other => {
                tracing::error!(error = %other, "database query failed");
                CatalogError::internal("database query failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_entity_code() {
        let err: CatalogError = DbError::not_found(Entity::Variant, 4).into();
        assert_eq!(err.code, ErrorCode::VariantNotFound);
        assert_eq!(err.message, "variant 4 not found");

        let err: CatalogError = DbError::not_found(Entity::Option, 2).into();
        assert_eq!(err.code, ErrorCode::ProductOptionNotFound);
    }

    #[test]
    fn sku_conflict_maps_to_sku_code() {
        let err: CatalogError = DbError::Conflict {
            constraint: VARIANT_SKU_KEY.to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::SkuConflict);
    }

    #[test]
    fn join_conflict_maps_to_combination_code() {
        let err: CatalogError = DbError::Conflict {
            constraint: VARIANT_OPTION_KEY.to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::VariantCombinationExists);
    }

    #[test]
    fn unknown_conflict_is_internal() {
        let err: CatalogError = DbError::Conflict {
            constraint: "something_else".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn check_violation_is_validation() {
        let err: CatalogError = DbError::CheckViolation {
            constraint: "product_variants_price_check".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
