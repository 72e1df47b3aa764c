use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Who is calling. Stored as a request extension by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Admin,
    Seller(i64),
}

impl Principal {
    /// Seller scope for engine calls; `None` lifts ownership checks.
    #[must_use]
    pub fn seller_id(self) -> Option<i64> {
        match self {
            Principal::Admin => None,
            Principal::Seller(id) => Some(id),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "admin" => Some(Principal::Admin),
            other => other
                .strip_prefix("seller:")
                .and_then(|id| id.trim().parse::<i64>().ok())
                .filter(|id| *id > 0)
                .map(Principal::Seller),
        }
    }
}

#[derive(Debug, Clone)]
struct ApiKey {
    digest: [u8; 32],
    principal: Principal,
}

/// API key auth settings used by middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    keys: Arc<Vec<ApiKey>>,
    salt: Arc<str>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `STOREFRONT_API_KEYS`, a comma-separated list
    /// of `token=admin` or `token=seller:<id>` entries.
    ///
    /// In development, missing keys disable auth and every caller is admin.
    /// In other environments missing keys fail startup.
    pub fn from_config(config: &storefront_core::AppConfig) -> anyhow::Result<Self> {
        let is_development = config.env == storefront_core::Environment::Development;
        let salt: Arc<str> = Arc::from(config.api_key_hash_salt.as_str());

        let Some(raw) = config.api_keys.as_deref() else {
            if is_development {
                tracing::warn!(
                    "STOREFRONT_API_KEYS not set; auth disabled and every request runs as admin"
                );
                return Ok(Self {
                    keys: Arc::new(Vec::new()),
                    salt,
                    enabled: false,
                });
            }
            anyhow::bail!(
                "STOREFRONT_API_KEYS is required outside development; provide token=admin or token=seller:<id> entries"
            );
        };

        let mut keys = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((token, principal)) = entry.split_once('=') else {
                anyhow::bail!("STOREFRONT_API_KEYS entry is missing '=': expected token=principal");
            };
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("STOREFRONT_API_KEYS entry has an empty token");
            }
            let Some(principal) = Principal::parse(principal) else {
                anyhow::bail!(
                    "STOREFRONT_API_KEYS principal must be 'admin' or 'seller:<id>', got '{}'",
                    principal.trim()
                );
            };
            keys.push(ApiKey {
                digest: digest(&salt, token),
                principal,
            });
        }
        if keys.is_empty() {
            anyhow::bail!("STOREFRONT_API_KEYS contains no entries");
        }

        tracing::info!(keys = keys.len(), "api key auth enabled");
        Ok(Self {
            keys: Arc::new(keys),
            salt,
            enabled: true,
        })
    }

    /// Every stored digest is compared so lookup time does not depend on
    /// which key matched.
    fn principal_for(&self, token: &str) -> Option<Principal> {
        let candidate = digest(&self.salt, token);
        let mut found = None;
        for key in self.keys.iter() {
            if bool::from(key.digest[..].ct_eq(&candidate[..])) {
                found = Some(key.principal);
            }
        }
        found
    }
}

fn digest(salt: &str, token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Sliding fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving the bearer token to a [`Principal`].
///
/// With auth disabled every request is admin.
pub async fn require_auth(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    if !auth.enabled {
        req.extensions_mut().insert(Principal::Admin);
        return next.run(req).await;
    }

    let principal = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .and_then(|token| auth.principal_for(token));

    match principal {
        Some(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        None => ApiError::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "rate limit exceeded",
        )
        .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{AppConfig, Environment};

    fn config(env: Environment, api_keys: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/storefront".to_string(),
            env,
            bind_addr: "127.0.0.1:3000".parse().expect("addr"),
            log_level: "info".to_string(),
            api_key_hash_salt: "pepper".to_string(),
            api_keys: api_keys.map(str::to_string),
            db_max_connections: 5,
            db_min_connections: 1,
            db_acquire_timeout_secs: 5,
            request_timeout_secs: 30,
            rate_limit_per_minute: 120,
        }
    }

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn principal_parses_admin_and_seller() {
        assert_eq!(Principal::parse("admin"), Some(Principal::Admin));
        assert_eq!(Principal::parse(" seller:42 "), Some(Principal::Seller(42)));
        assert_eq!(Principal::parse("seller:0"), None);
        assert_eq!(Principal::parse("seller:abc"), None);
        assert_eq!(Principal::parse("root"), None);
        assert_eq!(Principal::Seller(42).seller_id(), Some(42));
        assert_eq!(Principal::Admin.seller_id(), None);
    }

    #[test]
    fn auth_state_disables_when_no_keys_in_dev() {
        let state = AuthState::from_config(&config(Environment::Development, None))
            .expect("dev should allow missing keys");
        assert!(!state.enabled);
    }

    #[test]
    fn auth_state_requires_keys_in_production() {
        assert!(AuthState::from_config(&config(Environment::Production, None)).is_err());
    }

    #[test]
    fn auth_state_rejects_malformed_entries() {
        for raw in ["no-equals", "=admin", "tok=owner", "tok=seller:x"] {
            assert!(
                AuthState::from_config(&config(Environment::Production, Some(raw))).is_err(),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn tokens_resolve_to_their_principal() {
        let state = AuthState::from_config(&config(
            Environment::Production,
            Some("root-token=admin, shop-token=seller:7"),
        ))
        .expect("auth state");
        assert!(state.enabled);
        assert_eq!(state.principal_for("root-token"), Some(Principal::Admin));
        assert_eq!(state.principal_for("shop-token"), Some(Principal::Seller(7)));
        assert_eq!(state.principal_for("guess"), None);
    }

    #[test]
    fn digest_depends_on_salt() {
        assert_ne!(digest("a", "token"), digest("b", "token"));
        assert_eq!(digest("a", "token"), digest("a", "token"));
    }
}
