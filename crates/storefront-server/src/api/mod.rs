mod extract;
mod options;
mod products;
mod variants;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use storefront_core::{CatalogError, ErrorKind};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

/// Success envelope: `{success: true, data, meta}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Error envelope: `{success: false, message, errorCode, statusCode, details?}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    success: bool,
    message: String,
    error_code: String,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn json(data: T, req_id: RequestId) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            meta: ResponseMeta::new(req_id.0),
        })
    }
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: code.into(),
            status_code: status.as_u16(),
            details: None,
        }
    }

    pub(super) fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        if err.kind() == ErrorKind::Internal {
            tracing::error!(error_code = %err.code, error = %err.message, "request failed");
            return Self {
                success: false,
                message: "internal server error".to_string(),
                error_code: err.code.as_str().to_string(),
                status_code: err.code.status(),
                details: None,
            };
        }
        tracing::debug!(error_code = %err.code, error = %err.message, "request rejected");
        Self {
            success: false,
            message: err.message,
            error_code: err.code.as_str().to_string(),
            status_code: err.code.status(),
            details: err.details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// `data` payload for deletes that have nothing else to report.
#[derive(Debug, Serialize)]
pub(super) struct Deleted {
    pub id: i64,
    pub deleted: bool,
}

impl Deleted {
    pub(super) fn new(id: i64) -> Self {
        Self { id, deleted: true }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/v1/products/{product_id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/api/v1/products/{product_id}/options",
            get(options::list_options).post(options::add_option),
        )
        .route(
            "/api/v1/products/{product_id}/options/{option_id}",
            delete(options::delete_option),
        )
        .route(
            "/api/v1/products/{product_id}/options/{option_id}/values",
            post(options::add_values),
        )
        .route(
            "/api/v1/products/{product_id}/options/{option_id}/values/{value_id}",
            patch(options::update_value).delete(options::delete_value),
        )
        .route(
            "/api/v1/products/{product_id}/variants",
            get(variants::list_product_variants).post(variants::create_variant),
        )
        .route(
            "/api/v1/products/{product_id}/variants/find",
            get(variants::find_variant),
        )
        .route(
            "/api/v1/products/{product_id}/variants/aggregation",
            get(variants::get_aggregation),
        )
        .route(
            "/api/v1/products/{product_id}/variants/bulk",
            post(variants::bulk_create).patch(variants::bulk_update),
        )
        .route(
            "/api/v1/products/{product_id}/variants/{variant_id}",
            get(variants::get_variant)
                .patch(variants::update_variant)
                .delete(variants::delete_variant),
        )
        .route(
            "/api/v1/products/{product_id}/variants/{variant_id}/stock",
            patch(variants::adjust_stock),
        )
        .route("/api/v1/variants", get(variants::list_variants))
        .route(
            "/api/v1/variants/aggregations",
            get(variants::list_aggregations),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(auth, require_auth)),
        )
}

pub fn build_app(
    state: AppState,
    auth: AuthState,
    rate_limit: RateLimitState,
    request_timeout: Duration,
) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match storefront_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            ApiResponse::json(
                HealthData {
                    status: "ok",
                    database: "ok",
                },
                req_id,
            ),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::json(
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    req_id,
                ),
            )
        }
    }
}

#[cfg(test)]
pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use storefront_core::{AppConfig, Environment, ErrorCode};
    use tower::ServiceExt;

    const ADMIN_TOKEN: &str = "admin-token";
    const SELLER_TOKEN: &str = "seller-token";
    const OTHER_SELLER_TOKEN: &str = "other-seller-token";

    fn auth_config(api_keys: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/storefront".to_string(),
            env: Environment::Test,
            bind_addr: "127.0.0.1:3000".parse().expect("addr"),
            log_level: "info".to_string(),
            api_key_hash_salt: "test-salt".to_string(),
            api_keys: api_keys.map(str::to_string),
            db_max_connections: 5,
            db_min_connections: 1,
            db_acquire_timeout_secs: 5,
            request_timeout_secs: 30,
            rate_limit_per_minute: 120,
        }
    }

    fn app(pool: PgPool) -> Router {
        let auth = AuthState::from_config(&auth_config(Some(
            "admin-token=admin,seller-token=seller:1,other-seller-token=seller:2",
        )))
        .expect("auth");
        build_app(
            AppState { pool },
            auth,
            default_rate_limit_state(),
            Duration::from_secs(30),
        )
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json parse")
        };
        (status, json)
    }

    fn tshirt_body() -> serde_json::Value {
        serde_json::json!({
            "name": "Classic Tee",
            "baseSku": "TSHIRT-001",
            "options": [
                { "name": "Color", "values": [{ "value": "Red", "colorCode": "#ff0000" }, { "value": "Blue" }] },
                { "name": "size", "values": [{ "value": "s" }, { "value": "m" }] }
            ],
            "autoGenerateVariants": true,
            "defaultVariantSettings": { "price": "25.00", "stock": 10 }
        })
    }

    async fn create_tshirt(app: &Router) -> i64 {
        let (status, json) = send(
            app,
            Method::POST,
            "/api/v1/products",
            SELLER_TOKEN,
            Some(tshirt_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
        json["data"]["id"].as_i64().expect("product id")
    }

    #[test]
    fn catalog_errors_map_to_envelope() {
        let err = ApiError::from(
            CatalogError::new(ErrorCode::ProductOptionValueInUse, "in use")
                .with_details(serde_json::json!({ "variantCount": 2 })),
        );
        assert_eq!(err.status_code, 400);
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["success"], false);
        assert_eq!(json["errorCode"], "PRODUCT_OPTION_VALUE_IN_USE");
        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["details"]["variantCount"], 2);
    }

    #[test]
    fn internal_errors_hide_their_message() {
        let err = ApiError::from(CatalogError::internal("connection reset by peer"));
        assert_eq!(err.status_code, 500);
        assert_eq!(err.message, "internal server error");
        let json = serde_json::to_value(&err).expect("serialize");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn conflict_codes_keep_their_status() {
        let response =
            ApiError::from(CatalogError::new(ErrorCode::SkuConflict, "taken")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_is_public(pool: PgPool) {
        let app = app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "req-health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
            Some("req-health")
        );
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["database"], "ok");
        assert_eq!(json["meta"]["requestId"], "req-health");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn missing_token_is_unauthorized(pool: PgPool) {
        let app = app(pool);
        let (status, json) = send(&app, Method::GET, "/api/v1/products", "wrong", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["errorCode"], "UNAUTHORIZED");
        assert_eq!(json["statusCode"], 401);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn product_lifecycle_over_http(pool: PgPool) {
        let app = app(pool);
        let product_id = create_tshirt(&app).await;

        let (status, json) = send(
            &app,
            Method::GET,
            &format!("/api/v1/products/{product_id}"),
            SELLER_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["variants"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["data"]["options"][0]["name"], "color");
        assert_eq!(json["data"]["aggregation"]["totalVariants"], 4);

        let (status, json) = send(
            &app,
            Method::GET,
            &format!("/api/v1/products/{product_id}/variants/find?color=red&size=m"),
            SELLER_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["sku"], "TSHIRT-001-red-m");

        let (status, json) = send(
            &app,
            Method::DELETE,
            &format!("/api/v1/products/{product_id}"),
            SELLER_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["deleted"], true);

        let (status, json) = send(
            &app,
            Method::GET,
            &format!("/api/v1/products/{product_id}"),
            ADMIN_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["errorCode"], "PRODUCT_NOT_FOUND");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn foreign_seller_gets_not_found(pool: PgPool) {
        let app = app(pool);
        let product_id = create_tshirt(&app).await;

        let (status, json) = send(
            &app,
            Method::GET,
            &format!("/api/v1/products/{product_id}/variants"),
            OTHER_SELLER_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["errorCode"], "PRODUCT_NOT_FOUND");

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/v1/products/{product_id}/variants"),
            ADMIN_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn duplicate_combination_returns_conflict(pool: PgPool) {
        let app = app(pool);
        let product_id = create_tshirt(&app).await;

        let (status, json) = send(
            &app,
            Method::POST,
            &format!("/api/v1/products/{product_id}/variants"),
            SELLER_TOKEN,
            Some(serde_json::json!({
                "sku": "TSHIRT-001-DUP",
                "price": 30,
                "stock": 1,
                "options": { "color": "red", "size": "s" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["success"], false);
        assert_eq!(json["errorCode"], "VARIANT_COMBINATION_EXISTS");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn bulk_update_and_stock_over_http(pool: PgPool) {
        let app = app(pool);
        let product_id = create_tshirt(&app).await;
        let (_, json) = send(
            &app,
            Method::GET,
            &format!("/api/v1/products/{product_id}/variants"),
            SELLER_TOKEN,
            None,
        )
        .await;
        let ids: Vec<i64> = json["data"]
            .as_array()
            .expect("variants")
            .iter()
            .map(|v| v["id"].as_i64().expect("id"))
            .collect();

        let (status, json) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/products/{product_id}/variants/bulk"),
            SELLER_TOKEN,
            Some(serde_json::json!({
                "variants": [
                    { "variantId": ids[0], "isDefault": true },
                    { "variantId": ids[2], "isDefault": true, "price": "19.99" }
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "bulk update failed: {json}");
        assert_eq!(json["data"]["defaultVariantId"], ids[2]);

        let (status, json) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/products/{product_id}/variants/{}/stock", ids[1]),
            SELLER_TOKEN,
            Some(serde_json::json!({ "operation": "subtract", "quantity": 11 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorCode"], "INSUFFICIENT_STOCK");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn variant_listing_takes_option_filters(pool: PgPool) {
        let app = app(pool);
        create_tshirt(&app).await;

        let (status, json) = send(
            &app,
            Method::GET,
            "/api/v1/variants?color=red&sortBy=price&sortOrder=asc&pageSize=500",
            SELLER_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "list failed: {json}");
        assert_eq!(json["data"]["total"], 2);
        assert_eq!(json["data"]["pageSize"], 100);

        let (status, json) = send(
            &app,
            Method::GET,
            "/api/v1/variants?page=0",
            SELLER_TOKEN,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorCode"], "VALIDATION_ERROR");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn malformed_body_uses_error_envelope(pool: PgPool) {
        let app = app(pool);
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/v1/products",
            SELLER_TOKEN,
            Some(serde_json::json!({ "name": 5 })),
        )
        .await;
        assert!(status.is_client_error());
        assert_eq!(json["errorCode"], "VALIDATION_ERROR");
    }
}
