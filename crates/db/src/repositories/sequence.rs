use sqlx::SqliteConnection;

use super::RepositoryError;

pub const RFQ_SEQUENCE: &str = "rfq";
pub const QUOTATION_SEQUENCE: &str = "quotation";

/// Allocates the next value of a per-year counter. Must run inside the caller's transaction so
/// that a rolled-back insert also releases its number.
pub async fn next_value(
    conn: &mut SqliteConnection,
    name: &str,
    year: i32,
) -> Result<i64, RepositoryError> {
    let value: i64 = sqlx::query_scalar(
        "INSERT INTO number_sequence (name, year, last_value) VALUES (?, ?, 1)
         ON CONFLICT(name, year) DO UPDATE SET last_value = last_value + 1
         RETURNING last_value",
    )
    .bind(name)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}
