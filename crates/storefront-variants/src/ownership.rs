//! Product ownership checks shared by every engine entry point. Mutations
//! take the product row lock here.

use sqlx::PgExecutor;
use storefront_core::{validate::validate_ownership, CatalogResult};
use storefront_db::{products, ProductRow};

/// How the guarded product row is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Plain read for query paths.
    Read,
    /// `SELECT … FOR UPDATE`; serialises mutations on the product for the
    /// rest of the enclosing transaction.
    Write,
}

/// Load a product and check that `seller_id` may act on it.
///
/// `seller_id = None` is an administrator. Both a missing product and one
/// owned by another seller surface as `PRODUCT_NOT_FOUND`.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND`, or `INTERNAL_ERROR` if the lookup fails.
pub async fn ownership_guard<'e, E>(
    executor: E,
    product_id: i64,
    seller_id: Option<i64>,
    access: Access,
) -> CatalogResult<ProductRow>
where
    E: PgExecutor<'e>,
{
    let product = match access {
        Access::Read => products::find_product_by_id(executor, product_id).await?,
        Access::Write => products::lock_product(executor, product_id).await?,
    };
    validate_ownership(product.id, product.seller_id, seller_id)?;
    Ok(product)
}
