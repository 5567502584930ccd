use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use rfq_tracker_core::access::{ensure_admin, ensure_can_view_user};
use rfq_tracker_core::domain::user::{NewUser, Role, User, UserId, UserPatch};
use rfq_tracker_core::errors::DomainError;
use rfq_tracker_db::repositories::{SqlUserRepository, UserRepository};

use super::auth::{authenticate, AuthContext};
use super::{created, json_body, ok, query_params, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedUser {
    pub id: UserId,
    pub permanent: bool,
}

fn parse_role(raw: &str, ctx: &AuthContext) -> Result<Role, ApiError> {
    raw.parse::<Role>().map_err(|error| ctx.fail(error))
}

fn not_found(ctx: &AuthContext) -> ApiError {
    ctx.fail(DomainError::NotFound("user not found".to_string()))
}

/// Admins see every account; other roles see active accounts only.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let users = SqlUserRepository::new(state.db_pool.clone())
        .list(ctx.actor().is_admin())
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(users))
}

pub async fn by_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role): Path<String>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let role = parse_role(&role, &ctx)?;
    let users = SqlUserRepository::new(state.db_pool.clone())
        .list_by_role(role)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(users))
}

pub async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let id = UserId(id);
    ensure_can_view_user(&ctx.actor(), &id).map_err(|error| ctx.fail(error))?;
    let user = SqlUserRepository::new(state.db_pool.clone())
        .find_by_id(&id)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| not_found(&ctx))?;
    Ok(ok(user))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    ensure_admin(&ctx.actor()).map_err(|error| ctx.fail(error))?;
    let body = json_body(payload, &ctx.correlation_id)?;

    let user = SqlUserRepository::new(state.db_pool.clone())
        .create(NewUser {
            username: body.username,
            email: body.email,
            full_name: body.full_name,
            role: parse_role(&body.role, &ctx)?,
        })
        .await
        .map_err(|error| ctx.fail(error))?;
    tracing::info!(
        event_name = "api.user.created",
        correlation_id = %ctx.correlation_id,
        user_id = %user.id,
        role = %user.role,
        "user created"
    );
    Ok(created(user))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    ensure_admin(&ctx.actor()).map_err(|error| ctx.fail(error))?;
    let body = json_body(payload, &ctx.correlation_id)?;

    let patch = UserPatch {
        email: body.email,
        full_name: body.full_name,
        role: body.role.as_deref().map(|role| parse_role(role, &ctx)).transpose()?,
        is_active: body.is_active,
    };
    let user = SqlUserRepository::new(state.db_pool.clone())
        .update(&UserId(id), &patch)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| not_found(&ctx))?;
    Ok(ok(user))
}

/// Deactivates the account, or removes it with `?permanent=true`. Admins cannot remove
/// themselves.
pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<Json<ApiResponse<DeletedUser>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    ensure_admin(&ctx.actor()).map_err(|error| ctx.fail(error))?;
    let params = query_params(params, &ctx.correlation_id)?;

    let id = UserId(id);
    if id == ctx.user.id {
        return Err(ApiError::validation("cannot delete your own account", &ctx.correlation_id));
    }

    let users = SqlUserRepository::new(state.db_pool.clone());
    let removed = if params.permanent {
        users.delete_permanently(&id).await
    } else {
        users.deactivate(&id).await
    }
    .map_err(|error| ctx.fail(error))?;
    if !removed {
        return Err(not_found(&ctx));
    }

    tracing::info!(
        event_name = "api.user.deleted",
        correlation_id = %ctx.correlation_id,
        user_id = %id,
        permanent = params.permanent,
        "user removed"
    );
    Ok(ok(DeletedUser { id, permanent: params.permanent }))
}
