use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;

use rfq_tracker_core::domain::quotation::{NewQuotation, Quotation, QuotationId, QuotationPatch};
use rfq_tracker_core::domain::rfq::{format_document_number, RfqId};
use rfq_tracker_core::domain::user::UserId;
use rfq_tracker_core::errors::DomainError;

use super::sequence::{next_value, QUOTATION_SEQUENCE};
use super::{
    column, format_date, format_timestamp, parse_decimal, parse_enum, parse_optional_date,
    parse_optional_decimal, parse_timestamp, QuotationRepository, RepositoryError,
};
use crate::DbPool;

const QUOTATION_COLUMNS: &str = "id, quotation_number, rfq_id, revision_number, \
     quotation_sent_date, quoted_amount, material_cost, engineering_cost, software_cost, \
     installation_cost, margin, validity_date, approval_status, final_approved_amount, \
     created_by, created_at, updated_at";

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_quotation(row: &SqliteRow) -> Result<Quotation, RepositoryError> {
    let quoted_amount: String = column(row, "quoted_amount")?;
    let approval_status: String = column(row, "approval_status")?;
    let created_by: Option<String> = column(row, "created_by")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Quotation {
        id: QuotationId(column(row, "id")?),
        quotation_number: column(row, "quotation_number")?,
        rfq_id: RfqId(column(row, "rfq_id")?),
        revision_number: column(row, "revision_number")?,
        quotation_sent_date: parse_optional_date(column(row, "quotation_sent_date")?)?,
        quoted_amount: parse_decimal(&quoted_amount)?,
        material_cost: parse_optional_decimal(column(row, "material_cost")?)?,
        engineering_cost: parse_optional_decimal(column(row, "engineering_cost")?)?,
        software_cost: parse_optional_decimal(column(row, "software_cost")?)?,
        installation_cost: parse_optional_decimal(column(row, "installation_cost")?)?,
        margin: parse_optional_decimal(column(row, "margin")?)?,
        validity_date: parse_optional_date(column(row, "validity_date")?)?,
        approval_status: parse_enum(&approval_status)?,
        final_approved_amount: parse_optional_decimal(column(row, "final_approved_amount")?)?,
        created_by: created_by.map(UserId),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn amount(value: Option<Decimal>) -> Option<String> {
    value.map(|decimal| decimal.to_string())
}

/// Quotations of one RFQ, newest revision first.
pub(crate) async fn fetch_for_rfq(
    pool: &DbPool,
    rfq_id: &RfqId,
) -> Result<Vec<Quotation>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {QUOTATION_COLUMNS} FROM quotations
         WHERE rfq_id = ?
         ORDER BY revision_number DESC"
    ))
    .bind(&rfq_id.0)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_quotation).collect()
}

#[async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn create(&self, input: NewQuotation) -> Result<Quotation, RepositoryError> {
        input.validate()?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM rfqs WHERE id = ?")
            .bind(&input.rfq_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Err(DomainError::NotFound("RFQ not found".to_string()).into());
        }

        let revision_number: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(revision_number), 0) + 1 FROM quotations WHERE rfq_id = ?",
        )
        .bind(&input.rfq_id.0)
        .fetch_one(&mut *tx)
        .await?;
        let sequence = next_value(&mut tx, QUOTATION_SEQUENCE, now.year()).await?;

        let quotation = Quotation {
            id: QuotationId::generate(),
            quotation_number: format_document_number("QT", now.year(), sequence),
            rfq_id: input.rfq_id,
            revision_number,
            quotation_sent_date: input.quotation_sent_date,
            quoted_amount: input.quoted_amount,
            material_cost: input.material_cost,
            engineering_cost: input.engineering_cost,
            software_cost: input.software_cost,
            installation_cost: input.installation_cost,
            margin: input.margin,
            validity_date: input.validity_date,
            approval_status: input.approval_status,
            final_approved_amount: None,
            created_by: Some(input.created_by),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO quotations (id, quotation_number, rfq_id, revision_number,
                                     quotation_sent_date, quoted_amount, material_cost,
                                     engineering_cost, software_cost, installation_cost, margin,
                                     validity_date, approval_status, final_approved_amount,
                                     created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)",
        )
        .bind(&quotation.id.0)
        .bind(&quotation.quotation_number)
        .bind(&quotation.rfq_id.0)
        .bind(quotation.revision_number)
        .bind(quotation.quotation_sent_date.map(format_date))
        .bind(quotation.quoted_amount.to_string())
        .bind(amount(quotation.material_cost))
        .bind(amount(quotation.engineering_cost))
        .bind(amount(quotation.software_cost))
        .bind(amount(quotation.installation_cost))
        .bind(amount(quotation.margin))
        .bind(quotation.validity_date.map(format_date))
        .bind(quotation.approval_status.as_str())
        .bind(quotation.created_by.as_ref().map(|id| id.0.as_str()))
        .bind(format_timestamp(quotation.created_at))
        .bind(format_timestamp(quotation.updated_at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            event_name = "quotation.created",
            quotation_id = %quotation.id,
            rfq_id = %quotation.rfq_id,
            revision = quotation.revision_number,
            "quotation created"
        );
        Ok(quotation)
    }

    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_quotation).transpose()
    }

    async fn list_for_rfq(&self, rfq_id: &RfqId) -> Result<Vec<Quotation>, RepositoryError> {
        fetch_for_rfq(&self.pool, rfq_id).await
    }

    async fn update(
        &self,
        id: &QuotationId,
        patch: &QuotationPatch,
    ) -> Result<Option<Quotation>, RepositoryError> {
        patch.validate()?;

        let Some(mut quotation) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(quotation));
        }
        patch.apply_to(&mut quotation);
        quotation.updated_at = Utc::now();

        sqlx::query(
            "UPDATE quotations
             SET quotation_sent_date = ?, quoted_amount = ?, material_cost = ?,
                 engineering_cost = ?, software_cost = ?, installation_cost = ?, margin = ?,
                 validity_date = ?, approval_status = ?, final_approved_amount = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(quotation.quotation_sent_date.map(format_date))
        .bind(quotation.quoted_amount.to_string())
        .bind(amount(quotation.material_cost))
        .bind(amount(quotation.engineering_cost))
        .bind(amount(quotation.software_cost))
        .bind(amount(quotation.installation_cost))
        .bind(amount(quotation.margin))
        .bind(quotation.validity_date.map(format_date))
        .bind(quotation.approval_status.as_str())
        .bind(amount(quotation.final_approved_amount))
        .bind(format_timestamp(quotation.updated_at))
        .bind(&quotation.id.0)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            event_name = "quotation.updated",
            quotation_id = %quotation.id,
            approval_status = quotation.approval_status.as_str(),
            "quotation updated"
        );
        Ok(Some(quotation))
    }
}
