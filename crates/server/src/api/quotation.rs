use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use rfq_tracker_core::access::{ensure_can_modify_rfq, ensure_can_view_rfq};
use rfq_tracker_core::domain::quotation::{
    ApprovalStatus, NewQuotation, Quotation, QuotationId, QuotationPatch,
};
use rfq_tracker_core::domain::rfq::{Rfq, RfqId};
use rfq_tracker_core::errors::DomainError;
use rfq_tracker_core::lifecycle::LifecycleManager;
use rfq_tracker_db::repositories::{
    QuotationRepository, RfqRepository, SqlQuotationRepository, SqlRfqRepository,
};

use super::auth::{authenticate, AuthContext};
use super::{created, json_body, ok, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuotationRequest {
    pub rfq_id: String,
    pub quotation_sent_date: Option<NaiveDate>,
    pub quoted_amount: Decimal,
    pub material_cost: Option<Decimal>,
    pub engineering_cost: Option<Decimal>,
    pub software_cost: Option<Decimal>,
    pub installation_cost: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub validity_date: Option<NaiveDate>,
    pub approval_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuotationRequest {
    pub quotation_sent_date: Option<NaiveDate>,
    pub quoted_amount: Option<Decimal>,
    pub material_cost: Option<Decimal>,
    pub engineering_cost: Option<Decimal>,
    pub software_cost: Option<Decimal>,
    pub installation_cost: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub validity_date: Option<NaiveDate>,
    pub approval_status: Option<String>,
    pub final_approved_amount: Option<Decimal>,
}

async fn load_rfq(state: &AppState, ctx: &AuthContext, id: &RfqId) -> Result<Rfq, ApiError> {
    SqlRfqRepository::new(state.db_pool.clone())
        .find_by_id(id)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.fail(DomainError::NotFound("RFQ not found".to_string())))
}

async fn load_quotation(
    state: &AppState,
    ctx: &AuthContext,
    id: String,
) -> Result<Quotation, ApiError> {
    SqlQuotationRepository::new(state.db_pool.clone())
        .find_by_id(&QuotationId(id))
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.fail(DomainError::NotFound("quotation not found".to_string())))
}

fn parse_approval(
    value: Option<&str>,
    ctx: &AuthContext,
) -> Result<Option<ApprovalStatus>, ApiError> {
    value.map(str::parse::<ApprovalStatus>).transpose().map_err(|error| ctx.fail(error))
}

/// Records a quotation and moves an early-stage RFQ to `Quotation Sent`.
///
/// The quotation is kept even when the follow-up transition fails; the failure is logged.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateQuotationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Quotation>>), ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let actor = ctx.actor();
    let body = json_body(payload, &ctx.correlation_id)?;

    let rfq = load_rfq(&state, &ctx, &RfqId(body.rfq_id)).await?;
    ensure_can_modify_rfq(&actor, &rfq).map_err(|error| ctx.fail(error))?;
    let approval_status = parse_approval(body.approval_status.as_deref(), &ctx)?;

    let quotation = SqlQuotationRepository::new(state.db_pool.clone())
        .create(NewQuotation {
            rfq_id: rfq.id.clone(),
            quotation_sent_date: body.quotation_sent_date,
            quoted_amount: body.quoted_amount,
            material_cost: body.material_cost,
            engineering_cost: body.engineering_cost,
            software_cost: body.software_cost,
            installation_cost: body.installation_cost,
            margin: body.margin,
            validity_date: body.validity_date,
            approval_status: approval_status.unwrap_or_default(),
            created_by: actor.id.clone(),
        })
        .await
        .map_err(|error| ctx.fail(error))?;

    let rfqs = SqlRfqRepository::new(state.db_pool.clone());
    match LifecycleManager::new(&rfqs).advance_after_quotation(&rfq, &actor).await {
        Ok(outcome) if outcome.is_applied() => {
            tracing::info!(
                event_name = "api.quotation.rfq_advanced",
                correlation_id = %ctx.correlation_id,
                rfq_id = %rfq.id,
                from = %rfq.status,
                to = %outcome.rfq().status,
                "rfq advanced after quotation"
            );
        }
        Ok(_) => {}
        Err(error) => {
            tracing::warn!(
                event_name = "api.quotation.rfq_advance_failed",
                correlation_id = %ctx.correlation_id,
                rfq_id = %rfq.id,
                error = %error,
                "quotation stored but rfq status was not advanced"
            );
        }
    }

    Ok(created(quotation))
}

pub async fn list_for_rfq(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(rfq_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Quotation>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let rfq = load_rfq(&state, &ctx, &RfqId(rfq_id)).await?;
    ensure_can_view_rfq(&ctx.actor(), &rfq).map_err(|error| ctx.fail(error))?;

    let quotations = SqlQuotationRepository::new(state.db_pool.clone())
        .list_for_rfq(&rfq.id)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(ok(quotations))
}

pub async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Quotation>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let quotation = load_quotation(&state, &ctx, id).await?;
    let rfq = load_rfq(&state, &ctx, &quotation.rfq_id).await?;
    ensure_can_view_rfq(&ctx.actor(), &rfq).map_err(|error| ctx.fail(error))?;
    Ok(ok(quotation))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateQuotationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Quotation>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let body = json_body(payload, &ctx.correlation_id)?;
    let quotation = load_quotation(&state, &ctx, id).await?;
    let rfq = load_rfq(&state, &ctx, &quotation.rfq_id).await?;
    ensure_can_modify_rfq(&ctx.actor(), &rfq).map_err(|error| ctx.fail(error))?;

    let approval_status = parse_approval(body.approval_status.as_deref(), &ctx)?;
    let patch = QuotationPatch {
        quotation_sent_date: body.quotation_sent_date,
        quoted_amount: body.quoted_amount,
        material_cost: body.material_cost,
        engineering_cost: body.engineering_cost,
        software_cost: body.software_cost,
        installation_cost: body.installation_cost,
        margin: body.margin,
        validity_date: body.validity_date,
        approval_status,
        final_approved_amount: body.final_approved_amount,
    };
    if patch.is_empty() {
        return Ok(ok(quotation));
    }

    let updated = SqlQuotationRepository::new(state.db_pool.clone())
        .update(&quotation.id, &patch)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.fail(DomainError::NotFound("quotation not found".to_string())))?;
    Ok(ok(updated))
}
