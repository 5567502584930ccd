use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::rfq::{Priority, RfqId, RfqStatus};
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    #[default]
    Month,
    Quarter,
    Year,
    All,
}

impl StatsPeriod {
    /// First day of the period containing `today`, or `None` for an unbounded period.
    pub fn start(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Month => today.with_day(1),
            Self::Quarter => {
                let first_month = (today.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(today.year(), first_month, 1)
            }
            Self::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            Self::All => None,
        }
    }
}

impl FromStr for StatsPeriod {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(DomainError::Validation(format!(
                "unknown period `{other}` (expected month|quarter|year|all)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountByLabel {
    pub label: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinLoss {
    pub won: i64,
    pub lost: i64,
    pub ratio: Decimal,
}

impl WinLoss {
    /// `won / lost` to two places; `100.00` when nothing was lost but something was won.
    pub fn new(won: i64, lost: i64) -> Self {
        let mut ratio = if lost > 0 {
            (Decimal::from(won) / Decimal::from(lost)).round_dp(2)
        } else if won > 0 {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        ratio.rescale(2);
        Self { won, lost, ratio }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueTotals {
    pub total_quoted: Decimal,
    pub total_won: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingItem {
    pub id: RfqId,
    pub rfq_number: String,
    pub customer_name: String,
    pub status: RfqStatus,
    pub priority: Priority,
    pub rfq_received_date: NaiveDate,
    pub age_days: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineerLoad {
    pub engineer_id: UserId,
    pub full_name: String,
    pub rfq_count: i64,
    pub open_count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub period: StatsPeriod,
    pub total_rfqs: i64,
    pub status_breakdown: Vec<CountByLabel>,
    pub category_breakdown: Vec<CountByLabel>,
    pub win_loss: WinLoss,
    pub values: ValueTotals,
    pub aging: Vec<AgingItem>,
    pub engineer_load: Vec<EngineerLoad>,
    pub overdue_count: i64,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{StatsPeriod, WinLoss};

    #[test]
    fn period_start_is_first_day_of_enclosing_window() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 19).expect("date");
        assert_eq!(StatsPeriod::Month.start(today), NaiveDate::from_ymd_opt(2026, 8, 1));
        assert_eq!(StatsPeriod::Quarter.start(today), NaiveDate::from_ymd_opt(2026, 7, 1));
        assert_eq!(StatsPeriod::Year.start(today), NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(StatsPeriod::All.start(today), None);
    }

    #[test]
    fn win_loss_ratio_edge_cases() {
        assert_eq!(WinLoss::new(3, 2).ratio, Decimal::new(150, 2));
        assert_eq!(WinLoss::new(1, 3).ratio, Decimal::new(33, 2));
        assert_eq!(WinLoss::new(4, 0).ratio, Decimal::new(10000, 2));
        assert_eq!(WinLoss::new(0, 0).ratio, Decimal::ZERO);
    }

    #[test]
    fn period_parses_known_values_only() {
        assert_eq!("Quarter".parse::<StatsPeriod>().expect("period"), StatsPeriod::Quarter);
        assert!("week".parse::<StatsPeriod>().is_err());
    }
}
