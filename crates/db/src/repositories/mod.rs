use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use rfq_tracker_core::domain::audit::StatusHistoryItem;
use rfq_tracker_core::domain::notification::Notification;
use rfq_tracker_core::domain::quotation::{NewQuotation, Quotation, QuotationId, QuotationPatch};
use rfq_tracker_core::domain::rfq::{NewRfq, Rfq, RfqId, RfqPatch};
use rfq_tracker_core::domain::user::{NewUser, Role, User, UserId, UserPatch};
use rfq_tracker_core::errors::{ApplicationError, DomainError};

pub mod dashboard;
#[cfg(test)]
mod memory;
pub mod notification;
pub mod quotation;
pub mod report;
pub mod rfq;
pub mod sequence;
pub mod user;

pub use dashboard::SqlDashboardRepository;
pub use notification::SqlNotificationRepository;
pub use quotation::SqlQuotationRepository;
pub use report::{CustomerHistoryItem, SqlReportRepository};
pub use rfq::{RfqDetail, RfqPage, RfqQuery, RfqSortField, RfqSummary, SortOrder, SqlRfqRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Rejected(#[from] DomainError),
    #[error(transparent)]
    Lifecycle(#[from] ApplicationError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Rejected(domain) => ApplicationError::Domain(domain),
            RepositoryError::Lifecycle(error) => error,
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait RfqRepository: Send + Sync {
    /// Inserts the RFQ with a freshly allocated number together with its creation audit entry.
    async fn create(&self, input: NewRfq) -> Result<Rfq, RepositoryError>;
    async fn find_by_id(&self, id: &RfqId) -> Result<Option<Rfq>, RepositoryError>;
    async fn list(&self, query: &RfqQuery) -> Result<RfqPage, RepositoryError>;
    async fn detail(&self, id: &RfqId) -> Result<Option<RfqDetail>, RepositoryError>;
    /// Writes descriptive fields only; status is owned by the lifecycle commit.
    async fn update_details(
        &self,
        id: &RfqId,
        patch: &RfqPatch,
    ) -> Result<Option<Rfq>, RepositoryError>;
    async fn delete(&self, id: &RfqId) -> Result<bool, RepositoryError>;
    async fn status_history(&self, id: &RfqId) -> Result<Vec<StatusHistoryItem>, RepositoryError>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn create(&self, input: NewQuotation) -> Result<Quotation, RepositoryError>;
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;
    async fn list_for_rfq(&self, rfq_id: &RfqId) -> Result<Vec<Quotation>, RepositoryError>;
    async fn update(
        &self,
        id: &QuotationId,
        patch: &QuotationPatch,
    ) -> Result<Option<Quotation>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, input: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<User>, RepositoryError>;
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError>;
    async fn update(&self, id: &UserId, patch: &UserPatch)
        -> Result<Option<User>, RepositoryError>;
    async fn deactivate(&self, id: &UserId) -> Result<bool, RepositoryError>;
    /// Removes the user and detaches every reference to them in one transaction.
    async fn delete_permanently(&self, id: &UserId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn mark_read(&self, user_id: &UserId, id: &str) -> Result<bool, RepositoryError>;
}

/// Fixed-width UTC timestamps so that text ordering matches chronological ordering.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn format_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{value}`: {e}")))
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| RepositoryError::Decode(format!("invalid date `{value}`: {e}")))
}

pub(crate) fn parse_optional_date(
    value: Option<String>,
) -> Result<Option<NaiveDate>, RepositoryError> {
    value.as_deref().map(parse_date).transpose()
}

pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("invalid decimal `{value}`: {e}")))
}

pub(crate) fn parse_optional_decimal(
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value.as_deref().map(parse_decimal).transpose()
}

pub(crate) fn parse_enum<T>(value: &str) -> Result<T, RepositoryError>
where
    T: FromStr<Err = DomainError>,
{
    value.parse::<T>().map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use rfq_tracker_core::domain::user::{NewUser, Role, User};

    use super::user::SqlUserRepository;
    use super::UserRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    pub async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
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
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_timestamp, parse_timestamp, RepositoryError};
    use rfq_tracker_core::errors::{ApplicationError, DomainError};

    #[test]
    fn timestamps_round_trip_with_fixed_width() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("timestamp");
        let formatted = format_timestamp(early);
        assert_eq!(formatted, "2026-01-02T03:04:05.000000Z");
        assert_eq!(parse_timestamp(&formatted).expect("parse"), early);
    }

    #[test]
    fn rejected_repository_error_keeps_domain_class() {
        let error = RepositoryError::Rejected(DomainError::Validation("bad".to_string()));
        assert_eq!(
            ApplicationError::from(error),
            ApplicationError::Domain(DomainError::Validation("bad".to_string()))
        );

        let error = RepositoryError::Decode("broken row".to_string());
        assert!(matches!(ApplicationError::from(error), ApplicationError::Persistence(_)));
    }
}
