use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

use rfq_tracker_core::access::RfqScope;
use rfq_tracker_core::domain::report::{EngineerPerformance, MonthlyPerformance};
use rfq_tracker_core::domain::user::UserId;

use super::rfq::{push_scope, row_to_summary, RfqSummary, NAME_COLUMNS, NAME_JOINS, RFQ_COLUMNS};
use super::{format_date, parse_decimal, parse_optional_decimal, RepositoryError};
use crate::DbPool;

/// Customer history row: the list summary plus the largest amount quoted on the RFQ.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomerHistoryItem {
    #[serde(flatten)]
    pub summary: RfqSummary,
    pub max_quoted_amount: Option<Decimal>,
}

pub struct SqlReportRepository {
    pool: DbPool,
}

impl SqlReportRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Per-month intake for `year`, months without RFQs omitted.
    pub async fn monthly_performance(
        &self,
        scope: &RfqScope,
        year: i32,
    ) -> Result<Vec<MonthlyPerformance>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT substr(r.rfq_received_date, 1, 7), r.status, r.estimated_project_value
             FROM rfqs r
             WHERE substr(r.rfq_received_date, 1, 4) = ",
        );
        query.push_bind(format!("{year:04}"));
        push_scope(&mut query, scope);

        let rows: Vec<(String, String, Option<String>)> =
            query.build_query_as().fetch_all(&self.pool).await?;
        let mut months: BTreeMap<String, MonthlyPerformance> = BTreeMap::new();
        for (month, status, value) in rows {
            let entry = months
                .entry(month.clone())
                .or_insert_with(|| MonthlyPerformance::empty(month));
            entry.total_rfqs += 1;
            match status.as_str() {
                "Won" => entry.won += 1,
                "Lost" => entry.lost += 1,
                "Quotation Sent" => entry.quotation_sent += 1,
                _ => {}
            }
            if let Some(value) = parse_optional_decimal(value)? {
                entry.total_estimated_value += value;
            }
        }
        Ok(months.into_values().collect())
    }

    /// RFQs whose customer name contains `customer_name`, case-insensitively, newest first.
    pub async fn customer_history(
        &self,
        scope: &RfqScope,
        customer_name: &str,
    ) -> Result<Vec<CustomerHistoryItem>, RepositoryError> {
        let pattern = format!("%{}%", customer_name.trim());

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RFQ_COLUMNS}, {NAME_COLUMNS},
                    (SELECT COUNT(*) FROM quotations q WHERE q.rfq_id = r.id) AS quotation_count
             FROM rfqs r {NAME_JOINS}
             WHERE r.customer_name LIKE "
        ));
        select.push_bind(pattern.clone());
        push_scope(&mut select, scope);
        select.push(" ORDER BY r.rfq_received_date DESC, r.rowid DESC");
        let rows = select.build().fetch_all(&self.pool).await?;
        let summaries = rows.iter().map(row_to_summary).collect::<Result<Vec<_>, _>>()?;

        let mut amounts = QueryBuilder::<Sqlite>::new(
            "SELECT q.rfq_id, q.quoted_amount
             FROM quotations q JOIN rfqs r ON r.id = q.rfq_id
             WHERE r.customer_name LIKE ",
        );
        amounts.push_bind(pattern);
        push_scope(&mut amounts, scope);
        let quoted: Vec<(String, String)> = amounts.build_query_as().fetch_all(&self.pool).await?;
        let mut largest: HashMap<String, Decimal> = HashMap::new();
        for (rfq_id, amount) in quoted {
            let amount = parse_decimal(&amount)?;
            largest.entry(rfq_id).and_modify(|max| *max = (*max).max(amount)).or_insert(amount);
        }

        Ok(summaries
            .into_iter()
            .map(|summary| {
                let max_quoted_amount = largest.get(&summary.rfq.id.0).copied();
                CustomerHistoryItem { summary, max_quoted_amount }
            })
            .collect())
    }

    /// Every active engineer with counts over RFQs received inside the window, ordered by won
    /// value. Engineers with nothing in the window are listed with zeroes.
    pub async fn engineer_performance(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<EngineerPerformance>, RepositoryError> {
        let mut counts = QueryBuilder::<Sqlite>::new(
            "SELECT u.id, u.full_name, COUNT(r.id),
                    COALESCE(SUM(CASE WHEN r.status = 'Won' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN r.status = 'Lost' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN r.status NOT IN ('Won', 'Lost') THEN 1 ELSE 0 END), 0)
             FROM users u
             LEFT JOIN rfqs r ON r.assigned_engineer_id = u.id",
        );
        push_received_window(&mut counts, start_date, end_date);
        counts.push(
            " WHERE u.role = 'engineer' AND u.is_active = 1
              GROUP BY u.id, u.full_name",
        );
        let rows: Vec<(String, String, i64, i64, i64, i64)> =
            counts.build_query_as().fetch_all(&self.pool).await?;

        let mut won = QueryBuilder::<Sqlite>::new(
            "SELECT r.assigned_engineer_id, q.final_approved_amount
             FROM rfqs r
             JOIN quotations q ON q.rfq_id = r.id AND q.approval_status = 'Approved'
             WHERE r.status = 'Won' AND r.assigned_engineer_id IS NOT NULL
               AND q.final_approved_amount IS NOT NULL",
        );
        push_received_window(&mut won, start_date, end_date);
        let won_rows: Vec<(String, String)> = won.build_query_as().fetch_all(&self.pool).await?;
        let mut won_amounts: HashMap<String, Vec<Decimal>> = HashMap::new();
        for (engineer_id, amount) in won_rows {
            won_amounts.entry(engineer_id).or_default().push(parse_decimal(&amount)?);
        }

        let mut report: Vec<EngineerPerformance> = rows
            .into_iter()
            .map(|(id, full_name, total_rfqs, won, lost, active)| {
                let amounts = won_amounts.remove(&id).unwrap_or_default();
                EngineerPerformance {
                    engineer_id: UserId(id),
                    full_name,
                    total_rfqs,
                    won,
                    lost,
                    active,
                    total_won_value: Decimal::ZERO,
                    avg_won_value: None,
                }
                .with_won_amounts(&amounts)
            })
            .collect();
        report.sort_by(|a, b| {
            b.total_won_value
                .cmp(&a.total_won_value)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        Ok(report)
    }
}

fn push_received_window(
    builder: &mut QueryBuilder<'_, Sqlite>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) {
    if let Some(start_date) = start_date {
        builder.push(" AND r.rfq_received_date >= ").push_bind(format_date(start_date));
    }
    if let Some(end_date) = end_date {
        builder.push(" AND r.rfq_received_date <= ").push_bind(format_date(end_date));
    }
}
