use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Datelike, Utc};
use serde::Deserialize;

use rfq_tracker_core::access::RfqScope;
use rfq_tracker_core::domain::report::{EngineerPerformance, MonthlyPerformance};
use rfq_tracker_db::repositories::{CustomerHistoryItem, SqlReportRepository};

use super::auth::authenticate;
use super::{ok, parse_date, present, query_params, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyParams {
    pub year: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerParams {
    pub customer_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Month-by-month intake for one year, the current year by default.
pub async fn monthly_performance(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<MonthlyParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<MonthlyPerformance>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let params = query_params(params, &ctx.correlation_id)?;
    let year = match present(&params.year) {
        Some(raw) => raw
            .parse::<i32>()
            .ok()
            .filter(|year| (1..=9999).contains(year))
            .ok_or_else(|| {
                ApiError::validation("year must be between 1 and 9999", &ctx.correlation_id)
            })?,
        None => Utc::now().year(),
    };

    let months = SqlReportRepository::new(state.db_pool.clone())
        .monthly_performance(&RfqScope::for_actor(&ctx.actor()), year)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(months))
}

pub async fn customer_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<CustomerParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<CustomerHistoryItem>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let params = query_params(params, &ctx.correlation_id)?;
    let Some(customer_name) = present(&params.customer_name) else {
        return Err(ApiError::validation("customer_name is required", &ctx.correlation_id));
    };

    let history = SqlReportRepository::new(state.db_pool.clone())
        .customer_history(&RfqScope::for_actor(&ctx.actor()), customer_name)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(history))
}

/// Open to every role; the figures cover all engineers regardless of the caller.
pub async fn engineer_performance(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<EngineerPerformance>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let params = query_params(params, &ctx.correlation_id)?;
    let start_date = parse_date("start_date", present(&params.start_date), &ctx.correlation_id)?;
    let end_date = parse_date("end_date", present(&params.end_date), &ctx.correlation_id)?;

    let report = SqlReportRepository::new(state.db_pool.clone())
        .engineer_performance(start_date, end_date)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(report))
}
