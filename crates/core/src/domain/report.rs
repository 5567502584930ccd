use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// One calendar month of RFQ intake, keyed `YYYY-MM` by received date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPerformance {
    pub month: String,
    pub total_rfqs: i64,
    pub won: i64,
    pub lost: i64,
    pub quotation_sent: i64,
    pub total_estimated_value: Decimal,
}

impl MonthlyPerformance {
    pub fn empty(month: String) -> Self {
        Self {
            month,
            total_rfqs: 0,
            won: 0,
            lost: 0,
            quotation_sent: 0,
            total_estimated_value: Decimal::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineerPerformance {
    pub engineer_id: UserId,
    pub full_name: String,
    pub total_rfqs: i64,
    pub won: i64,
    pub lost: i64,
    pub active: i64,
    pub total_won_value: Decimal,
    /// Mean approved amount across won RFQs; absent until something is won with an amount.
    pub avg_won_value: Option<Decimal>,
}

impl EngineerPerformance {
    /// Folds approved amounts on won RFQs into the value columns.
    pub fn with_won_amounts(mut self, amounts: &[Decimal]) -> Self {
        self.total_won_value = amounts.iter().copied().sum();
        self.avg_won_value = match i64::try_from(amounts.len()) {
            Ok(count) if count > 0 => {
                Some((self.total_won_value / Decimal::from(count)).round_dp(2))
            }
            _ => None,
        };
        self
    }
}
