use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use secrecy::ExposeSecret;

use rfq_tracker_core::domain::user::{Actor, User, UserId};
use rfq_tracker_core::errors::{ApplicationError, InterfaceError};
use rfq_tracker_db::repositories::{SqlUserRepository, UserRepository};

use super::{ok, ApiError, ApiResponse, AppState};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// The authenticated caller of one request.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user: User,
    pub correlation_id: String,
}

impl AuthContext {
    pub fn actor(&self) -> Actor {
        self.user.actor()
    }

    pub fn fail(&self, error: impl Into<ApplicationError>) -> ApiError {
        ApiError::new(error, &self.correlation_id)
    }
}

pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("req-{}", uuid::Uuid::new_v4()))
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Checks the shared service token and resolves the acting user named by `X-User-Id`.
pub async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<AuthContext, ApiError> {
    let correlation_id = correlation_id(headers);
    let unauthorized =
        |message: &str| ApiError(InterfaceError::unauthorized(message, correlation_id.as_str()));

    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| unauthorized("missing bearer token"))?;
    let expected = state.settings.api_token.expose_secret();
    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        tracing::warn!(
            event_name = "api.auth.rejected",
            correlation_id = %correlation_id,
            reason = "token_mismatch",
            "request rejected"
        );
        return Err(unauthorized("invalid credentials"));
    }

    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| unauthorized("missing X-User-Id header"))?;

    let user = SqlUserRepository::new(state.db_pool.clone())
        .find_by_id(&UserId(user_id.to_string()))
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    match user {
        Some(user) if user.is_active => Ok(AuthContext { user, correlation_id }),
        _ => Err(unauthorized("unknown or inactive user")),
    }
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    Ok(ok(ctx.user))
}
