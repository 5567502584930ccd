//! REST surface: routing, response envelopes and error rendering.
//!
//! Every route except `/api/health` authenticates through [`auth::authenticate`]. Handlers
//! return `{ "success": true, "data": ... }` on success and the [`ApiError`] envelope otherwise.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use secrecy::SecretString;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rfq_tracker_core::config::AppConfig;
use rfq_tracker_core::errors::{ApplicationError, DomainError, InterfaceError};
use rfq_tracker_db::DbPool;

use crate::health;

pub mod auth;
pub mod dashboard;
pub mod notifications;
pub mod quotation;
pub mod reports;
pub mod rfq;
pub mod users;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(db_pool: DbPool, settings: ApiSettings) -> Self {
        Self { db_pool, settings: Arc::new(settings) }
    }
}

#[derive(Clone, Debug)]
pub struct ApiSettings {
    pub api_token: SecretString,
    pub default_currency: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub cors_origin: String,
}

impl ApiSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            api_token: config.auth.api_token.clone(),
            default_currency: config.rfq.default_currency.clone(),
            default_page_size: config.rfq.default_page_size,
            max_page_size: config.rfq.max_page_size,
            cors_origin: config.server.cors_origin.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors_origin);
    let api = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/rfq", get(rfq::list).post(rfq::create))
        .route("/api/rfq/{id}", get(rfq::detail).put(rfq::update).delete(rfq::delete))
        .route("/api/quotation", post(quotation::create))
        .route("/api/quotation/rfq/{rfq_id}", get(quotation::list_for_rfq))
        .route("/api/quotation/{id}", get(quotation::detail).put(quotation::update))
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/reports/monthly-performance", get(reports::monthly_performance))
        .route("/api/reports/customer-history", get(reports::customer_history))
        .route("/api/reports/engineer-performance", get(reports::engineer_performance))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/by-role/{role}", get(users::by_role))
        .route("/api/users/{id}", get(users::detail).put(users::update).delete(users::delete))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .with_state(state.clone());

    Router::new()
        .merge(health::router(state.db_pool))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(AllowOrigin::exact(value)),
        Err(_) => layer.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new())),
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, data, pagination: None })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn paginated<T: Serialize>(data: T, pagination: Pagination) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, data, pagination: Some(pagination) })
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error_class: &'a str,
    message: &'a str,
    correlation_id: &'a str,
}

/// Failure rendered as the JSON error envelope with the matching HTTP status.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn new(error: impl Into<ApplicationError>, correlation_id: &str) -> Self {
        Self(error.into().into_interface(correlation_id))
    }

    pub fn validation(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(DomainError::Validation(message.into()), correlation_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        if let InterfaceError::Internal { message, correlation_id } = &error {
            tracing::error!(
                event_name = "api.request_failed",
                correlation_id = %correlation_id,
                error = %message,
                "request failed with an internal error"
            );
        }

        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            success: false,
            error_class: error.error_class(),
            message: error.user_message(),
            correlation_id: error.correlation_id(),
        };
        (status, Json(body)).into_response()
    }
}

/// Unwraps a JSON body, reporting malformed input and unknown keys as validation failures.
pub fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation(rejection.body_text(), correlation_id))
}

pub fn query_params<T>(
    params: Result<Query<T>, QueryRejection>,
    correlation_id: &str,
) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::validation(rejection.body_text(), correlation_id))
}

/// Treats a blank query value as absent.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn parse_date(
    field: &str,
    value: Option<&str>,
    correlation_id: &str,
) -> Result<Option<NaiveDate>, ApiError> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ApiError::validation(format!("{field} must be a YYYY-MM-DD date"), correlation_id)
            })
        })
        .transpose()
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use rfq_tracker_core::domain::user::{NewUser, Role, User};
    use rfq_tracker_db::repositories::{SqlUserRepository, UserRepository};
    use rfq_tracker_db::{connect_with_settings, migrations, DbPool};

    use super::{router, ApiSettings, AppState};

    pub const TOKEN: &str = "test-service-token-0001";

    pub async fn app() -> (Router, DbPool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let settings = ApiSettings {
            api_token: TOKEN.to_string().into(),
            default_currency: "INR".to_string(),
            default_page_size: 50,
            max_page_size: 200,
            cors_origin: "*".to_string(),
        };
        (router(AppState::new(pool.clone(), settings)), pool)
    }

    pub async fn user(pool: &DbPool, username: &str, role: Role) -> User {
        SqlUserRepository::new(pool.clone())
            .create(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                full_name: format!("{username} user"),
                role,
            })
            .await
            .expect("create user")
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        actor: Option<&User>,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            request = request
                .header("authorization", format!("Bearer {TOKEN}"))
                .header("x-user-id", actor.id.0.as_str());
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => request.body(Body::empty()).expect("request"),
        };

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }
}
