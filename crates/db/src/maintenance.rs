use serde::Serialize;

use crate::connection::DbPool;
use crate::repositories::user::detach_user_references;
use crate::repositories::RepositoryError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub users_removed: u64,
    pub rfqs_removed: u64,
    pub rfqs_kept: u64,
}

/// Removes every sales and engineer account and all but the `keep` oldest RFQs, in one
/// transaction. Quotations, audit entries and notifications of removed RFQs cascade.
pub async fn cleanup(pool: &DbPool, keep: u32) -> Result<CleanupReport, RepositoryError> {
    let mut tx = pool.begin().await?;

    let user_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM users WHERE role IN ('sales', 'engineer')")
            .fetch_all(&mut *tx)
            .await?;
    for user_id in &user_ids {
        detach_user_references(&mut tx, user_id).await?;
        sqlx::query("DELETE FROM users WHERE id = ?").bind(user_id).execute(&mut *tx).await?;
    }

    let removed = sqlx::query(
        "DELETE FROM rfqs WHERE id NOT IN (
             SELECT id FROM rfqs ORDER BY created_at ASC, rowid ASC LIMIT ?
         )",
    )
    .bind(i64::from(keep))
    .execute(&mut *tx)
    .await?;
    let kept: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rfqs").fetch_one(&mut *tx).await?;

    tx.commit().await?;

    let report = CleanupReport {
        users_removed: user_ids.len() as u64,
        rfqs_removed: removed.rows_affected(),
        rfqs_kept: u64::try_from(kept).unwrap_or_default(),
    };
    tracing::info!(
        event_name = "maintenance.cleanup",
        users_removed = report.users_removed,
        rfqs_removed = report.rfqs_removed,
        rfqs_kept = report.rfqs_kept,
        "cleanup finished"
    );
    Ok(report)
}
