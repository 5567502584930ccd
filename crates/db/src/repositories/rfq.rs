use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use rfq_tracker_core::access::RfqScope;
use rfq_tracker_core::domain::audit::{StatusAuditEntry, StatusHistoryItem};
use rfq_tracker_core::domain::notification::Notification;
use rfq_tracker_core::domain::quotation::Quotation;
use rfq_tracker_core::domain::rfq::{
    format_document_number, normalized_reason, NewRfq, Priority, Rfq, RfqId, RfqPatch, RfqStatus,
};
use rfq_tracker_core::domain::user::UserId;
use rfq_tracker_core::errors::DomainError;
use rfq_tracker_core::lifecycle::{LifecycleStore, QuotationSummary, StoreError, TransitionCommit};

use super::quotation::fetch_for_rfq;
use super::sequence::{next_value, RFQ_SEQUENCE};
use super::{
    column, format_date, format_timestamp, parse_enum, parse_optional_date,
    parse_optional_decimal, parse_date, parse_timestamp, RepositoryError, RfqRepository,
};
use crate::DbPool;

pub(crate) const RFQ_COLUMNS: &str = "r.id, r.rfq_number, r.customer_name, \
     r.customer_contact_person, r.email, r.phone, r.company_name, r.product_project_name, \
     r.rfq_category, r.rfq_source, \
     r.priority, r.rfq_received_date, r.rfq_due_date, r.expected_order_date, \
     r.estimated_project_value, r.currency, r.status, r.assigned_engineer_id, \
     r.assigned_sales_person_id, r.created_by, r.reason_for_lost_on_hold, r.remarks_notes, \
     r.created_at, r.updated_at";

pub(crate) const NAME_COLUMNS: &str = "e.full_name AS assigned_engineer_name, \
     s.full_name AS assigned_sales_person_name, c.full_name AS created_by_name";

pub(crate) const NAME_JOINS: &str = "LEFT JOIN users e ON e.id = r.assigned_engineer_id \
     LEFT JOIN users s ON s.id = r.assigned_sales_person_id \
     LEFT JOIN users c ON c.id = r.created_by";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RfqSortField {
    #[default]
    CreatedAt,
    ReceivedDate,
    DueDate,
    EstimatedValue,
    Priority,
}

impl RfqSortField {
    fn order_expression(&self) -> &'static str {
        match self {
            Self::CreatedAt => "r.created_at",
            Self::ReceivedDate => "r.rfq_received_date",
            Self::DueDate => "r.rfq_due_date",
            Self::EstimatedValue => "CAST(r.estimated_project_value AS REAL)",
            Self::Priority => {
                "CASE r.priority WHEN 'Low' THEN 1 WHEN 'Medium' THEN 2 \
                 WHEN 'High' THEN 3 WHEN 'Critical' THEN 4 END"
            }
        }
    }
}

impl FromStr for RfqSortField {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "created_at" => Ok(Self::CreatedAt),
            "rfq_received_date" => Ok(Self::ReceivedDate),
            "rfq_due_date" => Ok(Self::DueDate),
            "estimated_project_value" => Ok(Self::EstimatedValue),
            "priority" => Ok(Self::Priority),
            other => Err(DomainError::Validation(format!("unsupported sort field `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` sorts descending.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RfqQuery {
    pub scope: RfqScope,
    pub status: Option<RfqStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub engineer_id: Option<UserId>,
    pub sales_id: Option<UserId>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: RfqSortField,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl RfqQuery {
    pub fn new(scope: RfqScope, limit: u32) -> Self {
        Self {
            scope,
            status: None,
            priority: None,
            category: None,
            engineer_id: None,
            sales_id: None,
            search: None,
            start_date: None,
            end_date: None,
            sort_by: RfqSortField::default(),
            sort_order: SortOrder::default(),
            page: 1,
            limit,
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.limit)
    }

    fn push_filters(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        push_scope(builder, &self.scope);
        if let Some(status) = self.status {
            builder.push(" AND r.status = ").push_bind(status.as_str());
        }
        if let Some(priority) = self.priority {
            builder.push(" AND r.priority = ").push_bind(priority.as_str());
        }
        if let Some(category) = &self.category {
            builder.push(" AND r.rfq_category = ").push_bind(category.clone());
        }
        if let Some(engineer_id) = &self.engineer_id {
            builder.push(" AND r.assigned_engineer_id = ").push_bind(engineer_id.0.clone());
        }
        if let Some(sales_id) = &self.sales_id {
            builder.push(" AND r.assigned_sales_person_id = ").push_bind(sales_id.0.clone());
        }
        if let Some(start_date) = self.start_date {
            builder.push(" AND r.rfq_received_date >= ").push_bind(format_date(start_date));
        }
        if let Some(end_date) = self.end_date {
            builder.push(" AND r.rfq_received_date <= ").push_bind(format_date(end_date));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            builder.push(" AND (r.rfq_number LIKE ").push_bind(pattern.clone());
            builder.push(" OR r.customer_name LIKE ").push_bind(pattern.clone());
            builder.push(" OR r.product_project_name LIKE ").push_bind(pattern.clone());
            builder.push(" OR r.company_name LIKE ").push_bind(pattern);
            builder.push(")");
        }
    }
}

/// Appends the role restriction for `scope` to a query over `rfqs r`.
pub(crate) fn push_scope(builder: &mut QueryBuilder<'_, Sqlite>, scope: &RfqScope) {
    match scope {
        RfqScope::All => {}
        RfqScope::AssignedEngineer(id) => {
            builder.push(" AND r.assigned_engineer_id = ").push_bind(id.0.clone());
        }
        RfqScope::SalesOwner(id) => {
            builder.push(" AND (r.assigned_sales_person_id = ").push_bind(id.0.clone());
            builder.push(" OR r.created_by = ").push_bind(id.0.clone());
            builder.push(")");
        }
    }
}

/// List row: the RFQ plus display names and quotation count.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RfqSummary {
    #[serde(flatten)]
    pub rfq: Rfq,
    pub assigned_engineer_name: Option<String>,
    pub assigned_sales_person_name: Option<String>,
    pub created_by_name: Option<String>,
    pub quotation_count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RfqPage {
    pub items: Vec<RfqSummary>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl RfqPage {
    pub fn total_pages(&self) -> i64 {
        if self.limit == 0 {
            0
        } else {
            (self.total + i64::from(self.limit) - 1) / i64::from(self.limit)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RfqDetail {
    #[serde(flatten)]
    pub summary: RfqSummary,
    pub quotations: Vec<Quotation>,
    pub status_history: Vec<StatusHistoryItem>,
}

pub struct SqlRfqRepository {
    pool: DbPool,
}

impl SqlRfqRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

pub(crate) fn row_to_rfq(row: &SqliteRow) -> Result<Rfq, RepositoryError> {
    let priority: String = column(row, "priority")?;
    let status: String = column(row, "status")?;
    let received: String = column(row, "rfq_received_date")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;
    let engineer: Option<String> = column(row, "assigned_engineer_id")?;
    let sales: Option<String> = column(row, "assigned_sales_person_id")?;
    let created_by: Option<String> = column(row, "created_by")?;

    Ok(Rfq {
        id: RfqId(column(row, "id")?),
        rfq_number: column(row, "rfq_number")?,
        customer_name: column(row, "customer_name")?,
        customer_contact_person: column(row, "customer_contact_person")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        company_name: column(row, "company_name")?,
        product_project_name: column(row, "product_project_name")?,
        rfq_category: column(row, "rfq_category")?,
        rfq_source: column(row, "rfq_source")?,
        priority: parse_enum(&priority)?,
        rfq_received_date: parse_date(&received)?,
        rfq_due_date: parse_optional_date(column(row, "rfq_due_date")?)?,
        expected_order_date: parse_optional_date(column(row, "expected_order_date")?)?,
        estimated_project_value: parse_optional_decimal(column(row, "estimated_project_value")?)?,
        currency: column(row, "currency")?,
        status: parse_enum(&status)?,
        assigned_engineer_id: engineer.map(UserId),
        assigned_sales_person_id: sales.map(UserId),
        created_by: created_by.map(UserId),
        reason_for_lost_on_hold: column(row, "reason_for_lost_on_hold")?,
        remarks_notes: column(row, "remarks_notes")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub(crate) fn row_to_summary(row: &SqliteRow) -> Result<RfqSummary, RepositoryError> {
    Ok(RfqSummary {
        rfq: row_to_rfq(row)?,
        assigned_engineer_name: column(row, "assigned_engineer_name")?,
        assigned_sales_person_name: column(row, "assigned_sales_person_name")?,
        created_by_name: column(row, "created_by_name")?,
        quotation_count: column(row, "quotation_count")?,
    })
}

fn row_to_history(row: &SqliteRow) -> Result<StatusHistoryItem, RepositoryError> {
    let old_status: Option<String> = column(row, "old_status")?;
    let new_status: String = column(row, "new_status")?;
    let changed_by: Option<String> = column(row, "changed_by")?;
    let changed_at: String = column(row, "changed_at")?;

    Ok(StatusHistoryItem {
        entry: StatusAuditEntry {
            id: column(row, "id")?,
            rfq_id: RfqId(column(row, "rfq_id")?),
            old_status: old_status.as_deref().map(parse_enum).transpose()?,
            new_status: parse_enum(&new_status)?,
            changed_by: changed_by.map(UserId),
            reason: column(row, "reason")?,
            changed_at: parse_timestamp(&changed_at)?,
        },
        changed_by_name: column(row, "changed_by_name")?,
    })
}

async fn fetch_rfq(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Rfq>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {RFQ_COLUMNS} FROM rfqs r WHERE r.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_rfq).transpose()
}

pub(crate) async fn insert_audit_entry(
    conn: &mut SqliteConnection,
    entry: &StatusAuditEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO status_audit_log (id, rfq_id, old_status, new_status, changed_by, reason,
                                       changed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.rfq_id.0)
    .bind(entry.old_status.map(|status| status.as_str()))
    .bind(entry.new_status.as_str())
    .bind(entry.changed_by.as_ref().map(|id| id.0.as_str()))
    .bind(&entry.reason)
    .bind(format_timestamp(entry.changed_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: &Notification,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (id, user_id, rfq_id, title, message, notification_type,
                                    is_read, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&notification.id)
    .bind(&notification.user_id.0)
    .bind(notification.rfq_id.as_ref().map(|id| id.0.as_str()))
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.notification_type)
    .bind(notification.is_read)
    .bind(format_timestamp(notification.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Writes every descriptive column of `rfq`. Status is left to the lifecycle commit.
async fn write_details(conn: &mut SqliteConnection, rfq: &Rfq) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE rfqs SET customer_name = ?, customer_contact_person = ?, email = ?, phone = ?,
                         company_name = ?, product_project_name = ?, rfq_category = ?,
                         rfq_source = ?, priority = ?, rfq_received_date = ?,
                         rfq_due_date = ?, expected_order_date = ?,
                         estimated_project_value = ?, currency = ?,
                         assigned_engineer_id = ?, assigned_sales_person_id = ?,
                         reason_for_lost_on_hold = ?, remarks_notes = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&rfq.customer_name)
    .bind(&rfq.customer_contact_person)
    .bind(&rfq.email)
    .bind(&rfq.phone)
    .bind(&rfq.company_name)
    .bind(&rfq.product_project_name)
    .bind(&rfq.rfq_category)
    .bind(&rfq.rfq_source)
    .bind(rfq.priority.as_str())
    .bind(format_date(rfq.rfq_received_date))
    .bind(rfq.rfq_due_date.map(format_date))
    .bind(rfq.expected_order_date.map(format_date))
    .bind(optional_decimal(rfq.estimated_project_value))
    .bind(&rfq.currency)
    .bind(rfq.assigned_engineer_id.as_ref().map(|id| id.0.as_str()))
    .bind(rfq.assigned_sales_person_id.as_ref().map(|id| id.0.as_str()))
    .bind(&rfq.reason_for_lost_on_hold)
    .bind(&rfq.remarks_notes)
    .bind(format_timestamp(rfq.updated_at))
    .bind(&rfq.id.0)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn optional_decimal(value: Option<rust_decimal::Decimal>) -> Option<String> {
    value.map(|amount| amount.to_string())
}

#[async_trait]
impl RfqRepository for SqlRfqRepository {
    async fn create(&self, input: NewRfq) -> Result<Rfq, RepositoryError> {
        input.validate()?;

        let now = Utc::now();
        let reason = normalized_reason(input.reason_for_lost_on_hold.as_deref());
        let mut tx = self.pool.begin().await?;
        let sequence = next_value(&mut tx, RFQ_SEQUENCE, now.year()).await?;

        let rfq = Rfq {
            id: RfqId::generate(),
            rfq_number: format_document_number("RFQ", now.year(), sequence),
            customer_name: input.customer_name.trim().to_string(),
            customer_contact_person: input.customer_contact_person,
            email: input.email,
            phone: input.phone,
            company_name: input.company_name,
            product_project_name: input.product_project_name,
            rfq_category: input.rfq_category,
            rfq_source: input.rfq_source,
            priority: input.priority,
            rfq_received_date: input.rfq_received_date,
            rfq_due_date: input.rfq_due_date,
            expected_order_date: input.expected_order_date,
            estimated_project_value: input.estimated_project_value,
            currency: input.currency.trim().to_string(),
            status: input.status,
            assigned_engineer_id: input.assigned_engineer_id,
            assigned_sales_person_id: input.assigned_sales_person_id,
            created_by: Some(input.created_by.clone()),
            reason_for_lost_on_hold: reason.clone(),
            remarks_notes: input.remarks_notes,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO rfqs (id, rfq_number, customer_name, customer_contact_person, email,
                               phone, company_name, product_project_name, rfq_category,
                               rfq_source, priority, rfq_received_date, rfq_due_date,
                               expected_order_date, estimated_project_value, currency, status,
                               assigned_engineer_id, assigned_sales_person_id, created_by,
                               reason_for_lost_on_hold, remarks_notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rfq.id.0)
        .bind(&rfq.rfq_number)
        .bind(&rfq.customer_name)
        .bind(&rfq.customer_contact_person)
        .bind(&rfq.email)
        .bind(&rfq.phone)
        .bind(&rfq.company_name)
        .bind(&rfq.product_project_name)
        .bind(&rfq.rfq_category)
        .bind(&rfq.rfq_source)
        .bind(rfq.priority.as_str())
        .bind(format_date(rfq.rfq_received_date))
        .bind(rfq.rfq_due_date.map(format_date))
        .bind(rfq.expected_order_date.map(format_date))
        .bind(optional_decimal(rfq.estimated_project_value))
        .bind(&rfq.currency)
        .bind(rfq.status.as_str())
        .bind(rfq.assigned_engineer_id.as_ref().map(|id| id.0.as_str()))
        .bind(rfq.assigned_sales_person_id.as_ref().map(|id| id.0.as_str()))
        .bind(&input.created_by.0)
        .bind(&rfq.reason_for_lost_on_hold)
        .bind(&rfq.remarks_notes)
        .bind(format_timestamp(rfq.created_at))
        .bind(format_timestamp(rfq.updated_at))
        .execute(&mut *tx)
        .await?;

        let audit = StatusAuditEntry::new(
            rfq.id.clone(),
            None,
            rfq.status,
            input.created_by,
            reason.filter(|_| rfq.status.requires_reason()),
            now,
        );
        insert_audit_entry(&mut tx, &audit).await?;
        tx.commit().await?;

        tracing::info!(
            event_name = "rfq.created",
            rfq_id = %rfq.id,
            rfq_number = %rfq.rfq_number,
            status = %rfq.status,
            "rfq created"
        );
        Ok(rfq)
    }

    async fn find_by_id(&self, id: &RfqId) -> Result<Option<Rfq>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RFQ_COLUMNS} FROM rfqs r WHERE r.id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_rfq).transpose()
    }

    async fn list(&self, query: &RfqQuery) -> Result<RfqPage, RepositoryError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM rfqs r");
        query.push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RFQ_COLUMNS}, {NAME_COLUMNS},
                    (SELECT COUNT(*) FROM quotations q WHERE q.rfq_id = r.id) AS quotation_count
             FROM rfqs r {NAME_JOINS}"
        ));
        query.push_filters(&mut select);
        select.push(format!(
            " ORDER BY {} {}, r.rowid {}",
            query.sort_by.order_expression(),
            query.sort_order.keyword(),
            query.sort_order.keyword()
        ));
        select.push(" LIMIT ").push_bind(i64::from(query.limit));
        select.push(" OFFSET ").push_bind(query.offset());

        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(row_to_summary).collect::<Result<Vec<_>, _>>()?;

        Ok(RfqPage { items, total, page: query.page.max(1), limit: query.limit })
    }

    async fn detail(&self, id: &RfqId) -> Result<Option<RfqDetail>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RFQ_COLUMNS}, {NAME_COLUMNS},
                    (SELECT COUNT(*) FROM quotations q WHERE q.rfq_id = r.id) AS quotation_count
             FROM rfqs r {NAME_JOINS}
             WHERE r.id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let summary = row_to_summary(&row)?;
        let quotations = fetch_for_rfq(&self.pool, id).await?;
        let status_history = self.status_history(id).await?;

        Ok(Some(RfqDetail { summary, quotations, status_history }))
    }

    async fn update_details(
        &self,
        id: &RfqId,
        patch: &RfqPatch,
    ) -> Result<Option<Rfq>, RepositoryError> {
        let Some(mut rfq) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        patch.validate_for(&rfq)?;
        if patch.is_empty() {
            return Ok(Some(rfq));
        }
        patch.apply_to(&mut rfq);
        rfq.updated_at = Utc::now();

        let mut conn = self.pool.acquire().await?;
        write_details(&mut conn, &rfq).await?;
        Ok(Some(rfq))
    }

    async fn delete(&self, id: &RfqId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM rfqs WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn status_history(&self, id: &RfqId) -> Result<Vec<StatusHistoryItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT a.id, a.rfq_id, a.old_status, a.new_status, a.changed_by, a.reason,
                    a.changed_at, u.full_name AS changed_by_name
             FROM status_audit_log a
             LEFT JOIN users u ON u.id = a.changed_by
             WHERE a.rfq_id = ?
             ORDER BY a.changed_at DESC, a.rowid DESC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_history).collect()
    }
}

#[async_trait]
impl LifecycleStore for SqlRfqRepository {
    async fn quotation_summary(&self, rfq_id: &RfqId) -> Result<QuotationSummary, StoreError> {
        let (total, approved): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN approval_status = 'Approved' THEN 1 ELSE 0 END), 0)
             FROM quotations WHERE rfq_id = ?",
        )
        .bind(&rfq_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(QuotationSummary {
            total: u64::try_from(total).unwrap_or_default(),
            approved: u64::try_from(approved).unwrap_or_default(),
        })
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Rfq, StoreError> {
        let backend = |e: sqlx::Error| StoreError::Backend(e.to_string());
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let updated = sqlx::query(
            "UPDATE rfqs
             SET status = ?,
                 reason_for_lost_on_hold = COALESCE(?, reason_for_lost_on_hold),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(commit.to.as_str())
        .bind(&commit.reason)
        .bind(format_timestamp(commit.changed_at))
        .bind(&commit.rfq_id.0)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Err(StoreError::NotFound(commit.rfq_id));
        }

        insert_audit_entry(&mut tx, &commit.audit).await.map_err(backend)?;
        if let Some(notification) = &commit.notification {
            insert_notification(&mut tx, notification).await.map_err(backend)?;
        }

        let mut rfq = fetch_rfq(&mut tx, &commit.rfq_id.0)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(commit.rfq_id.clone()))?;
        if let Some(details) = &commit.details {
            details.apply_to(&mut rfq);
            write_details(&mut tx, &rfq).await.map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        tracing::info!(
            event_name = "rfq.status_changed",
            rfq_id = %commit.rfq_id,
            from = %commit.from,
            to = %commit.to,
            notified = commit.notification.is_some(),
            "rfq status transition committed"
        );
        Ok(rfq)
    }
}
