use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use rfq_tracker_core::domain::notification::Notification;
use rfq_tracker_core::domain::rfq::RfqId;
use rfq_tracker_core::domain::user::UserId;

use super::{column, parse_timestamp, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_notification(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let rfq_id: Option<String> = column(row, "rfq_id")?;
    let created_at: String = column(row, "created_at")?;

    Ok(Notification {
        id: column(row, "id")?,
        user_id: UserId(column(row, "user_id")?),
        rfq_id: rfq_id.map(RfqId),
        title: column(row, "title")?,
        message: column(row, "message")?,
        notification_type: column(row, "notification_type")?,
        is_read: column(row, "is_read")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, rfq_id, title, message, notification_type, is_read, created_at
             FROM notifications
             WHERE user_id = ? AND (is_read = 0 OR ? = 0)
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(&user_id.0)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn mark_read(&self, user_id: &UserId, id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(&user_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
