pub mod app_config;
pub mod combination;
pub mod config;
pub mod error;
pub mod listing;
pub mod normalize;
pub mod products;
pub mod stock;
pub mod validate;
pub mod variants;

pub use app_config::{AppConfig, Environment};
pub use combination::{
    cartesian_product, combination_count, generated_sku, last_default_index, CombinationKey,
    OptionAxis, MAX_GENERATED_VARIANTS,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{CatalogError, ConfigError, ErrorCode, ErrorKind};
pub use listing::{
    normalize_page, page_offset, ListVariantsQuery, SortBy, SortOrder, VariantFilters,
    VariantListRequest,
};
pub use products::{
    DefaultVariantSettings, NewOption, NewOptionValue, NewProduct, OptionValuePatch, ProductPatch,
};
pub use stock::{apply_stock_operation, StockAdjustment, StockOperation};
pub use variants::{
    apply_last_default_wins, normalize_selection, BulkVariantPatch, NewVariant, VariantPatch,
};

/// Result alias used by every layer above the gateway.
pub type CatalogResult<T> = Result<T, CatalogError>;
