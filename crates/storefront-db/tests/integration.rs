//! Offline tests for storefront-db pool configuration and error mapping.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use storefront_core::{AppConfig, CatalogError, Environment, ErrorCode};
use storefront_db::{DbError, Entity, PoolConfig};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        api_key_hash_salt: "salt".to_string(),
        api_keys: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        request_timeout_secs: 30,
        rate_limit_per_minute: 120,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn missing_option_value_maps_to_value_not_found() {
    let err = CatalogError::from(DbError::NotFound {
        entity: Entity::OptionValue,
        id: 12,
    });
    assert_eq!(err.code, ErrorCode::ProductOptionValueNotFound);
    assert!(err.message.contains("12"));
}

#[test]
fn foreign_key_failure_is_validation() {
    let err = CatalogError::from(DbError::ForeignKey {
        constraint: "variant_option_values_option_value_id_fkey".to_string(),
    });
    assert_eq!(err.code, ErrorCode::ValidationError);
}
