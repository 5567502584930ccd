use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite};

use rfq_tracker_core::access::RfqScope;
use rfq_tracker_core::domain::dashboard::{
    AgingItem, CountByLabel, DashboardStats, EngineerLoad, StatsPeriod, ValueTotals, WinLoss,
};
use rfq_tracker_core::domain::rfq::RfqId;
use rfq_tracker_core::domain::user::UserId;

use super::rfq::push_scope;
use super::{format_date, parse_date, parse_decimal, parse_enum, RepositoryError};
use crate::DbPool;

const AGING_LIMIT: i64 = 10;
const UNCATEGORIZED: &str = "Uncategorized";

pub struct SqlDashboardRepository {
    pool: DbPool,
}

impl SqlDashboardRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Aggregates for `scope` over `period`. Aging and overdue figures ignore the period.
    pub async fn stats(
        &self,
        scope: &RfqScope,
        period: StatsPeriod,
        today: NaiveDate,
    ) -> Result<DashboardStats, RepositoryError> {
        let since = period.start(today);

        let mut total = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM rfqs r");
        push_window(&mut total, scope, since);
        let total_rfqs: i64 = total.build_query_scalar().fetch_one(&self.pool).await?;

        let status_breakdown = self.breakdown("r.status", scope, since).await?;
        let category_breakdown = self
            .breakdown(&format!("COALESCE(r.rfq_category, '{UNCATEGORIZED}')"), scope, since)
            .await?;

        let mut outcome = QueryBuilder::<Sqlite>::new(
            "SELECT COALESCE(SUM(CASE WHEN r.status = 'Won' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN r.status = 'Lost' THEN 1 ELSE 0 END), 0)
             FROM rfqs r",
        );
        push_window(&mut outcome, scope, since);
        let (won, lost): (i64, i64) = outcome.build_query_as().fetch_one(&self.pool).await?;

        Ok(DashboardStats {
            period,
            total_rfqs,
            status_breakdown,
            category_breakdown,
            win_loss: WinLoss::new(won, lost),
            values: self.values(scope, since).await?,
            aging: self.aging(scope, today).await?,
            engineer_load: self.engineer_load(since).await?,
            overdue_count: self.overdue_count(scope, today).await?,
        })
    }

    async fn breakdown(
        &self,
        expression: &str,
        scope: &RfqScope,
        since: Option<NaiveDate>,
    ) -> Result<Vec<CountByLabel>, RepositoryError> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {expression} AS label, COUNT(*) FROM rfqs r"));
        push_window(&mut query, scope, since);
        query.push(" GROUP BY label ORDER BY COUNT(*) DESC, label ASC");

        let rows: Vec<(String, i64)> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(label, count)| CountByLabel { label, count }).collect())
    }

    /// Amounts are stored as text, so sums are taken in decimal arithmetic here.
    async fn values(
        &self,
        scope: &RfqScope,
        since: Option<NaiveDate>,
    ) -> Result<ValueTotals, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT q.quoted_amount, r.status, q.final_approved_amount
             FROM quotations q JOIN rfqs r ON r.id = q.rfq_id",
        );
        push_window(&mut query, scope, since);

        let rows: Vec<(String, String, Option<String>)> =
            query.build_query_as().fetch_all(&self.pool).await?;
        let mut totals = ValueTotals { total_quoted: Decimal::ZERO, total_won: Decimal::ZERO };
        for (quoted, status, approved) in rows {
            totals.total_quoted += parse_decimal(&quoted)?;
            if status == "Won" {
                if let Some(approved) = approved {
                    totals.total_won += parse_decimal(&approved)?;
                }
            }
        }
        Ok(totals)
    }

    async fn aging(
        &self,
        scope: &RfqScope,
        today: NaiveDate,
    ) -> Result<Vec<AgingItem>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT r.id, r.rfq_number, r.customer_name, r.status, r.priority, r.rfq_received_date
             FROM rfqs r",
        );
        push_window(&mut query, scope, None);
        query.push(" AND r.status NOT IN ('Won', 'Lost')");
        query.push(" ORDER BY r.rfq_received_date ASC, r.rowid ASC LIMIT ").push_bind(AGING_LIMIT);

        let rows: Vec<(String, String, String, String, String, String)> =
            query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(id, rfq_number, customer_name, status, priority, received)| {
                let rfq_received_date = parse_date(&received)?;
                Ok(AgingItem {
                    id: RfqId(id),
                    rfq_number,
                    customer_name,
                    status: parse_enum(&status)?,
                    priority: parse_enum(&priority)?,
                    rfq_received_date,
                    age_days: (today - rfq_received_date).num_days(),
                })
            })
            .collect()
    }

    async fn engineer_load(
        &self,
        since: Option<NaiveDate>,
    ) -> Result<Vec<EngineerLoad>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT u.id, u.full_name, COUNT(r.id),
                    COALESCE(SUM(CASE WHEN r.status NOT IN ('Won', 'Lost') THEN 1 ELSE 0 END), 0)
             FROM users u
             LEFT JOIN rfqs r ON r.assigned_engineer_id = u.id",
        );
        if let Some(since) = since {
            query.push(" AND r.rfq_received_date >= ").push_bind(format_date(since));
        }
        query.push(
            " WHERE u.role = 'engineer' AND u.is_active = 1
              GROUP BY u.id, u.full_name
              ORDER BY COUNT(r.id) DESC, u.full_name ASC",
        );

        let rows: Vec<(String, String, i64, i64)> =
            query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, full_name, rfq_count, open_count)| EngineerLoad {
                engineer_id: UserId(id),
                full_name,
                rfq_count,
                open_count,
            })
            .collect())
    }

    async fn overdue_count(
        &self,
        scope: &RfqScope,
        today: NaiveDate,
    ) -> Result<i64, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM rfqs r");
        push_window(&mut query, scope, None);
        query.push(" AND r.status NOT IN ('Won', 'Lost') AND r.rfq_due_date < ");
        query.push_bind(format_date(today));

        Ok(query.build_query_scalar().fetch_one(&self.pool).await?)
    }
}

fn push_window(builder: &mut QueryBuilder<'_, Sqlite>, scope: &RfqScope, since: Option<NaiveDate>) {
    builder.push(" WHERE 1 = 1");
    push_scope(builder, scope);
    if let Some(since) = since {
        builder.push(" AND r.rfq_received_date >= ").push_bind(format_date(since));
    }
}
