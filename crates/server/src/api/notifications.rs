use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use rfq_tracker_core::domain::notification::Notification;
use rfq_tracker_core::errors::DomainError;
use rfq_tracker_db::repositories::{NotificationRepository, SqlNotificationRepository};

use super::auth::authenticate;
use super::{ok, query_params, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationParams {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub id: String,
    pub is_read: bool,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<NotificationParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let params = query_params(params, &ctx.correlation_id)?;
    let notifications = SqlNotificationRepository::new(state.db_pool.clone())
        .list_for_user(&ctx.user.id, params.unread_only)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(notifications))
}

/// Only the recipient can mark a notification; anyone else gets a 404.
pub async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MarkedRead>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let marked = SqlNotificationRepository::new(state.db_pool.clone())
        .mark_read(&ctx.user.id, &id)
        .await
        .map_err(|error| ctx.fail(error))?;
    if !marked {
        return Err(ctx.fail(DomainError::NotFound("notification not found".to_string())));
    }
    Ok(ok(MarkedRead { id, is_read: true }))
}
