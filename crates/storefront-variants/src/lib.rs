//! Catalog and variant engines.
//!
//! Every mutation opens a transaction with [`storefront_db::begin`], locks the
//! parent product row, runs its invariant checks against that locked state,
//! and commits. Any error before the commit drops the transaction and rolls
//! back every write made so far.

pub mod bulk;
pub mod catalog;
pub mod command;
mod ownership;
pub mod products;
pub mod query;
mod resolve;

pub use bulk::{generate_variants, BulkCreateSummary, BulkUpdateSummary, VariantSummary};
pub use command::DeletedVariant;
pub use ownership::{ownership_guard, Access};
pub use products::{ProductDetail, ProductPage, ProductSummary};
pub use query::VariantPage;
