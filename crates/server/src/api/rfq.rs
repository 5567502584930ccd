use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rfq_tracker_core::access::{
    ensure_admin, ensure_can_create_rfq, ensure_can_modify_rfq, ensure_can_view_rfq, RfqScope,
};
use rfq_tracker_core::domain::rfq::{NewRfq, Priority, Rfq, RfqId, RfqPatch, RfqStatus};
use rfq_tracker_core::domain::user::{Role, UserId};
use rfq_tracker_core::errors::DomainError;
use rfq_tracker_core::lifecycle::{LifecycleManager, TransitionRequest};
use rfq_tracker_db::repositories::{
    RfqDetail, RfqQuery, RfqRepository, RfqSortField, RfqSummary, SortOrder, SqlRfqRepository,
    SqlUserRepository, UserRepository,
};

use super::auth::{authenticate, AuthContext};
use super::{
    created, json_body, ok, paginated, parse_date, present, query_params, ApiError, ApiResponse,
    AppState, Pagination,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListRfqParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub engineer_id: Option<String>,
    pub sales_id: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRfqRequest {
    pub customer_name: String,
    pub customer_contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub product_project_name: Option<String>,
    pub rfq_category: Option<String>,
    pub rfq_source: Option<String>,
    pub priority: Option<String>,
    pub rfq_received_date: NaiveDate,
    pub rfq_due_date: Option<NaiveDate>,
    pub expected_order_date: Option<NaiveDate>,
    pub estimated_project_value: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub assigned_engineer_id: Option<String>,
    pub assigned_sales_person_id: Option<String>,
    pub reason_for_lost_on_hold: Option<String>,
    pub remarks_notes: Option<String>,
}

/// Descriptive changes and an optional status move, written together or not at all.
///
/// When `status` is present, `reason_for_lost_on_hold` is the transition's reason; otherwise it
/// edits the stored reason.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRfqRequest {
    pub customer_name: Option<String>,
    pub customer_contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub product_project_name: Option<String>,
    pub rfq_category: Option<String>,
    pub rfq_source: Option<String>,
    pub priority: Option<String>,
    pub rfq_received_date: Option<NaiveDate>,
    pub rfq_due_date: Option<NaiveDate>,
    pub expected_order_date: Option<NaiveDate>,
    pub estimated_project_value: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub assigned_engineer_id: Option<String>,
    pub assigned_sales_person_id: Option<String>,
    pub reason_for_lost_on_hold: Option<String>,
    pub remarks_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedRfq {
    pub id: RfqId,
}

fn parse_field<T>(value: Option<&str>, ctx: &AuthContext) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = DomainError>,
{
    value.map(|raw| raw.parse::<T>()).transpose().map_err(|error| ctx.fail(error))
}

/// Rejects assignments to users that do not exist or do not hold the expected role.
async fn ensure_assignee(
    state: &AppState,
    ctx: &AuthContext,
    id: Option<&str>,
    role: Role,
) -> Result<Option<UserId>, ApiError> {
    let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    let user = SqlUserRepository::new(state.db_pool.clone())
        .find_by_id(&UserId(id.to_string()))
        .await
        .map_err(|error| ctx.fail(error))?;
    match user {
        Some(user) if user.is_active && (user.role == role || user.role == Role::Admin) => {
            Ok(Some(user.id))
        }
        _ => Err(ctx.fail(DomainError::Validation(format!("unknown {} `{id}`", role.as_str())))),
    }
}

async fn load_rfq(state: &AppState, ctx: &AuthContext, id: &str) -> Result<Rfq, ApiError> {
    SqlRfqRepository::new(state.db_pool.clone())
        .find_by_id(&RfqId(id.to_string()))
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.fail(DomainError::NotFound("RFQ not found".to_string())))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<ListRfqParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<RfqSummary>>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let params = query_params(params, &ctx.correlation_id)?;
    let settings = &state.settings;

    let limit = params.limit.unwrap_or(settings.default_page_size).clamp(1, settings.max_page_size);

    let mut query = RfqQuery::new(RfqScope::for_actor(&ctx.actor()), limit);
    query.page = params.page.unwrap_or(1).max(1);
    query.status = parse_field(present(&params.status), &ctx)?;
    query.priority = parse_field(present(&params.priority), &ctx)?;
    query.category = present(&params.category).map(ToOwned::to_owned);
    query.engineer_id = present(&params.engineer_id).map(|id| UserId(id.to_string()));
    query.sales_id = present(&params.sales_id).map(|id| UserId(id.to_string()));
    query.search = present(&params.search).map(ToOwned::to_owned);
    query.start_date = parse_date("start_date", present(&params.start_date), &ctx.correlation_id)?;
    query.end_date = parse_date("end_date", present(&params.end_date), &ctx.correlation_id)?;
    query.sort_by =
        parse_field::<RfqSortField>(present(&params.sort_by), &ctx)?.unwrap_or_default();
    query.sort_order =
        present(&params.sort_order).map(SortOrder::parse_lenient).unwrap_or_default();

    let page = SqlRfqRepository::new(state.db_pool.clone())
        .list(&query)
        .await
        .map_err(|error| ctx.fail(error))?;
    let pagination = Pagination {
        page: page.page,
        limit: page.limit,
        total: page.total,
        total_pages: page.total_pages(),
    };
    Ok(paginated(page.items, pagination))
}

pub async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<RfqDetail>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let detail = SqlRfqRepository::new(state.db_pool.clone())
        .detail(&RfqId(id))
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.fail(DomainError::NotFound("RFQ not found".to_string())))?;
    ensure_can_view_rfq(&ctx.actor(), &detail.summary.rfq).map_err(|error| ctx.fail(error))?;
    Ok(ok(detail))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateRfqRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Rfq>>), ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let actor = ctx.actor();
    ensure_can_create_rfq(&actor).map_err(|error| ctx.fail(error))?;
    let body = json_body(payload, &ctx.correlation_id)?;

    let engineer =
        ensure_assignee(&state, &ctx, body.assigned_engineer_id.as_deref(), Role::Engineer).await?;
    let sales =
        ensure_assignee(&state, &ctx, body.assigned_sales_person_id.as_deref(), Role::Sales)
            .await?
            .or_else(|| (actor.role == Role::Sales).then(|| actor.id.clone()));

    let input = NewRfq {
        customer_name: body.customer_name,
        customer_contact_person: body.customer_contact_person,
        email: body.email,
        phone: body.phone,
        company_name: body.company_name,
        product_project_name: body.product_project_name,
        rfq_category: body.rfq_category,
        rfq_source: body.rfq_source,
        priority: parse_field::<Priority>(body.priority.as_deref(), &ctx)?.unwrap_or_default(),
        rfq_received_date: body.rfq_received_date,
        rfq_due_date: body.rfq_due_date,
        expected_order_date: body.expected_order_date,
        estimated_project_value: body.estimated_project_value,
        currency: body.currency.unwrap_or_else(|| state.settings.default_currency.clone()),
        status: parse_field::<RfqStatus>(body.status.as_deref(), &ctx)?.unwrap_or_default(),
        assigned_engineer_id: engineer,
        assigned_sales_person_id: sales,
        created_by: actor.id.clone(),
        reason_for_lost_on_hold: body.reason_for_lost_on_hold,
        remarks_notes: body.remarks_notes,
    };

    let rfq = SqlRfqRepository::new(state.db_pool.clone())
        .create(input)
        .await
        .map_err(|error| ctx.fail(error))?;
    tracing::info!(
        event_name = "api.rfq.created",
        correlation_id = %ctx.correlation_id,
        rfq_id = %rfq.id,
        actor_id = %actor.id,
        "rfq created via api"
    );
    Ok(created(rfq))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateRfqRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Rfq>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    let actor = ctx.actor();
    let body = json_body(payload, &ctx.correlation_id)?;
    let current = load_rfq(&state, &ctx, &id).await?;
    ensure_can_modify_rfq(&actor, &current).map_err(|error| ctx.fail(error))?;

    let requested = parse_field::<RfqStatus>(body.status.as_deref(), &ctx)?;
    let (transition_reason, edited_reason) = match requested {
        Some(_) => (body.reason_for_lost_on_hold, None),
        None => (None, body.reason_for_lost_on_hold),
    };
    let patch = RfqPatch {
        customer_name: body.customer_name,
        customer_contact_person: body.customer_contact_person,
        email: body.email,
        phone: body.phone,
        company_name: body.company_name,
        product_project_name: body.product_project_name,
        rfq_category: body.rfq_category,
        rfq_source: body.rfq_source,
        priority: parse_field(body.priority.as_deref(), &ctx)?,
        rfq_received_date: body.rfq_received_date,
        rfq_due_date: body.rfq_due_date,
        expected_order_date: body.expected_order_date,
        estimated_project_value: body.estimated_project_value,
        currency: body.currency,
        assigned_engineer_id: ensure_assignee(
            &state,
            &ctx,
            body.assigned_engineer_id.as_deref(),
            Role::Engineer,
        )
        .await?,
        assigned_sales_person_id: ensure_assignee(
            &state,
            &ctx,
            body.assigned_sales_person_id.as_deref(),
            Role::Sales,
        )
        .await?,
        reason_for_lost_on_hold: edited_reason,
        remarks_notes: body.remarks_notes,
    };
    if requested.is_none() && patch.is_empty() {
        return Err(ctx.fail(DomainError::Validation("no fields to update".to_string())));
    }

    let repository = SqlRfqRepository::new(state.db_pool.clone());
    let moving = requested.filter(|status| current.status.can_transition_to(*status));
    let rfq = match moving {
        Some(status) => {
            let mut request = TransitionRequest::new(status).with_details(patch);
            request.reason = transition_reason;
            LifecycleManager::new(&repository)
                .transition(&current, request, &actor)
                .await
                .map_err(|error| ctx.fail(error))?
                .into_rfq()
        }
        None if patch.is_empty() => current,
        None => repository
            .update_details(&current.id, &patch)
            .await
            .map_err(|error| ctx.fail(error))?
            .ok_or_else(|| ctx.fail(DomainError::NotFound("RFQ not found".to_string())))?,
    };

    tracing::info!(
        event_name = "api.rfq.updated",
        correlation_id = %ctx.correlation_id,
        rfq_id = %rfq.id,
        status = %rfq.status,
        "rfq updated via api"
    );
    Ok(ok(rfq))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedRfq>>, ApiError> {
    let ctx = authenticate(&headers, &state).await?;
    ensure_admin(&ctx.actor()).map_err(|error| ctx.fail(error))?;

    let id = RfqId(id);
    let deleted = SqlRfqRepository::new(state.db_pool.clone())
        .delete(&id)
        .await
        .map_err(|error| ctx.fail(error))?;
    if !deleted {
        return Err(ctx.fail(DomainError::NotFound("RFQ not found".to_string())));
    }
    tracing::info!(
        event_name = "api.rfq.deleted",
        correlation_id = %ctx.correlation_id,
        rfq_id = %id,
        "rfq deleted"
    );
    Ok(ok(DeletedRfq { id }))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::{json, Value};

    use rfq_tracker_core::domain::user::Role;

    use crate::api::test_support::{app, send, user};

    fn rfq_body(customer: &str) -> Value {
        json!({
            "customer_name": customer,
            "rfq_received_date": "2026-04-02",
            "priority": "High",
            "estimated_project_value": "1500000.00",
            "rfq_category": "Automation"
        })
    }

    #[tokio::test]
    async fn sales_creates_rfq_and_is_assigned_by_default() {
        let (app, pool) = app().await;
        let sales = user(&pool, "priya", Role::Sales).await;

        let (status, body) =
            send(&app, Method::POST, "/api/rfq", Some(&sales), Some(rfq_body("ABC"))).await;
        assert_eq!(status, 201, "{body}");
        assert_eq!(body["data"]["status"], "Enquiry");
        assert_eq!(body["data"]["currency"], "INR");
        assert_eq!(body["data"]["assigned_sales_person_id"], sales.id.0.as_str());
        assert!(body["data"]["rfq_number"].as_str().is_some_and(|n| n.starts_with("RFQ-")));
    }

    #[tokio::test]
    async fn unknown_fields_and_restricted_roles_are_rejected() {
        let (app, pool) = app().await;
        let engineer = user(&pool, "kavya", Role::Engineer).await;
        let sales = user(&pool, "priya", Role::Sales).await;

        let (status, _) =
            send(&app, Method::POST, "/api/rfq", Some(&engineer), Some(rfq_body("ABC"))).await;
        assert_eq!(status, 403);

        let mut body = rfq_body("ABC");
        body["unexpected"] = json!(true);
        let (status, body) = send(&app, Method::POST, "/api/rfq", Some(&sales), Some(body)).await;
        assert_eq!(status, 400);
        assert_eq!(body["error_class"], "validation");
    }

    #[tokio::test]
    async fn status_transitions_through_put_follow_guards() {
        let (app, pool) = app().await;
        let sales = user(&pool, "priya", Role::Sales).await;
        let (_, created) =
            send(&app, Method::POST, "/api/rfq", Some(&sales), Some(rfq_body("ABC"))).await;
        let uri = format!("/api/rfq/{}", created["data"]["id"].as_str().expect("id"));

        let (status, body) =
            send(&app, Method::PUT, &uri, Some(&sales), Some(json!({ "status": "Won" }))).await;
        assert_eq!(status, 400);
        assert_eq!(body["error_class"], "precondition_failed");

        let (status, body) =
            send(&app, Method::PUT, &uri, Some(&sales), Some(json!({ "status": "Lost" }))).await;
        assert_eq!(status, 400);
        assert_eq!(body["error_class"], "validation");

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&sales),
            Some(json!({
                "status": "Lost",
                "reason_for_lost_on_hold": "price too high",
                "remarks_notes": "customer chose a cheaper vendor"
            })),
        )
        .await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["data"]["status"], "Lost");
        assert_eq!(body["data"]["reason_for_lost_on_hold"], "price too high");
        assert_eq!(body["data"]["remarks_notes"], "customer chose a cheaper vendor");

        let (status, detail) = send(&app, Method::GET, &uri, Some(&sales), None).await;
        assert_eq!(status, 200);
        let history = detail["data"]["status_history"].as_array().expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["new_status"], "Lost");
        assert_eq!(history[0]["old_status"], "Enquiry");
        assert_eq!(history[0]["reason"], "price too high");

        let (_, notes) = send(&app, Method::GET, "/api/notifications", Some(&sales), None).await;
        assert_eq!(notes["data"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn repeating_the_current_status_with_a_blank_reason_is_a_noop() {
        let (app, pool) = app().await;
        let sales = user(&pool, "priya", Role::Sales).await;
        let (_, created) =
            send(&app, Method::POST, "/api/rfq", Some(&sales), Some(rfq_body("ABC"))).await;
        let uri = format!("/api/rfq/{}", created["data"]["id"].as_str().expect("id"));
        let hold = json!({ "status": "On Hold", "reason_for_lost_on_hold": "budget freeze" });
        let (status, body) = send(&app, Method::PUT, &uri, Some(&sales), Some(hold)).await;
        assert_eq!(status, 200, "{body}");

        let repeat = json!({ "status": "On Hold", "reason_for_lost_on_hold": "" });
        let (status, body) = send(&app, Method::PUT, &uri, Some(&sales), Some(repeat)).await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["data"]["status"], "On Hold");
        assert_eq!(body["data"]["reason_for_lost_on_hold"], "budget freeze");

        let (_, detail) = send(&app, Method::GET, &uri, Some(&sales), None).await;
        assert_eq!(detail["data"]["status_history"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn blank_reason_on_a_reason_guarded_move_reports_reason_required() {
        let (app, pool) = app().await;
        let sales = user(&pool, "priya", Role::Sales).await;
        let (_, created) =
            send(&app, Method::POST, "/api/rfq", Some(&sales), Some(rfq_body("ABC"))).await;
        let uri = format!("/api/rfq/{}", created["data"]["id"].as_str().expect("id"));

        let lost = json!({ "status": "Lost", "reason_for_lost_on_hold": "   " });
        let (status, body) = send(&app, Method::PUT, &uri, Some(&sales), Some(lost)).await;
        assert_eq!(status, 400);
        assert_eq!(body["error_class"], "validation");
        assert_eq!(body["message"], "reason required");
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let (app, pool) = app().await;
        let sales = user(&pool, "priya", Role::Sales).await;
        let (_, created) =
            send(&app, Method::POST, "/api/rfq", Some(&sales), Some(rfq_body("ABC"))).await;
        let uri = format!("/api/rfq/{}", created["data"]["id"].as_str().expect("id"));

        let (status, body) = send(&app, Method::PUT, &uri, Some(&sales), Some(json!({}))).await;
        assert_eq!(status, 400);
        assert_eq!(body["error_class"], "validation");
        assert_eq!(body["message"], "no fields to update");
    }

    #[tokio::test]
    async fn list_is_scoped_and_paginated() {
        let (app, pool) = app().await;
        let priya = user(&pool, "priya", Role::Sales).await;
        let arjun = user(&pool, "arjun", Role::Sales).await;
        let admin = user(&pool, "root", Role::Admin).await;
        for customer in ["ABC", "Delta", "Orion"] {
            send(&app, Method::POST, "/api/rfq", Some(&priya), Some(rfq_body(customer))).await;
        }
        send(&app, Method::POST, "/api/rfq", Some(&arjun), Some(rfq_body("Zenith"))).await;

        let (status, body) =
            send(&app, Method::GET, "/api/rfq?limit=2&page=1", Some(&priya), None).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["pagination"]["total"], 3);
        assert_eq!(body["pagination"]["total_pages"], 2);

        let (_, body) = send(&app, Method::GET, "/api/rfq?search=zen", Some(&admin), None).await;
        assert_eq!(body["pagination"]["total"], 1);

        let (status, _) =
            send(&app, Method::GET, "/api/rfq?sort_by=colour", Some(&admin), None).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn only_admin_deletes_and_other_sales_cannot_view() {
        let (app, pool) = app().await;
        let priya = user(&pool, "priya", Role::Sales).await;
        let arjun = user(&pool, "arjun", Role::Sales).await;
        let admin = user(&pool, "root", Role::Admin).await;
        let (_, created) =
            send(&app, Method::POST, "/api/rfq", Some(&priya), Some(rfq_body("ABC"))).await;
        let uri = format!("/api/rfq/{}", created["data"]["id"].as_str().expect("id"));

        let (status, _) = send(&app, Method::GET, &uri, Some(&arjun), None).await;
        assert_eq!(status, 403);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&priya), None).await;
        assert_eq!(status, 403);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, 200);
        let (status, body) = send(&app, Method::GET, &uri, Some(&admin), None).await;
        assert_eq!(status, 404);
        assert_eq!(body["error_class"], "not_found");
    }
}
