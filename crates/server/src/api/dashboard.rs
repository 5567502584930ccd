use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use rfq_tracker_core::access::RfqScope;
use rfq_tracker_core::domain::dashboard::{DashboardStats, StatsPeriod};
use rfq_tracker_db::repositories::SqlDashboardRepository;

use super::auth::authenticate;
use super::{ok, present, query_params, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub period: Option<String>,
}

/// Aggregates restricted to the RFQs the caller can see.
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<StatsParams>, QueryRejection>,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let params = query_params(params, &ctx.correlation_id)?;
    let period = present(&params.period)
        .map(str::parse::<StatsPeriod>)
        .transpose()
        .map_err(|error| ctx.fail(error))?
        .unwrap_or_default();

    let stats = SqlDashboardRepository::new(state.db_pool.clone())
        .stats(&RfqScope::for_actor(&ctx.actor()), period, Utc::now().date_naive())
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(stats))
}
