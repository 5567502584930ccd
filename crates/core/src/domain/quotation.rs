use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::rfq::RfqId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationId(pub String);

impl QuotationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for QuotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::Validation(format!(
                "unknown approval status `{other}` (expected Pending|Approved|Rejected)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub quotation_number: String,
    pub rfq_id: RfqId,
    pub revision_number: i64,
    pub quotation_sent_date: Option<NaiveDate>,
    pub quoted_amount: Decimal,
    pub material_cost: Option<Decimal>,
    pub engineering_cost: Option<Decimal>,
    pub software_cost: Option<Decimal>,
    pub installation_cost: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub validity_date: Option<NaiveDate>,
    pub approval_status: ApprovalStatus,
    pub final_approved_amount: Option<Decimal>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewQuotation {
    pub rfq_id: RfqId,
    pub quotation_sent_date: Option<NaiveDate>,
    pub quoted_amount: Decimal,
    pub material_cost: Option<Decimal>,
    pub engineering_cost: Option<Decimal>,
    pub software_cost: Option<Decimal>,
    pub installation_cost: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub validity_date: Option<NaiveDate>,
    pub approval_status: ApprovalStatus,
    pub created_by: UserId,
}

impl NewQuotation {
    pub fn validate(&self) -> Result<(), DomainError> {
        ensure_non_negative("quoted amount", Some(self.quoted_amount))?;
        ensure_non_negative("material cost", self.material_cost)?;
        ensure_non_negative("engineering cost", self.engineering_cost)?;
        ensure_non_negative("software cost", self.software_cost)?;
        ensure_non_negative("installation cost", self.installation_cost)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuotationPatch {
    pub quotation_sent_date: Option<NaiveDate>,
    pub quoted_amount: Option<Decimal>,
    pub material_cost: Option<Decimal>,
    pub engineering_cost: Option<Decimal>,
    pub software_cost: Option<Decimal>,
    pub installation_cost: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub validity_date: Option<NaiveDate>,
    pub approval_status: Option<ApprovalStatus>,
    pub final_approved_amount: Option<Decimal>,
}

impl QuotationPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        ensure_non_negative("quoted amount", self.quoted_amount)?;
        ensure_non_negative("material cost", self.material_cost)?;
        ensure_non_negative("engineering cost", self.engineering_cost)?;
        ensure_non_negative("software cost", self.software_cost)?;
        ensure_non_negative("installation cost", self.installation_cost)?;
        ensure_non_negative("final approved amount", self.final_approved_amount)
    }

    pub fn apply_to(&self, quotation: &mut Quotation) {
        if let Some(value) = self.quotation_sent_date {
            quotation.quotation_sent_date = Some(value);
        }
        if let Some(value) = self.quoted_amount {
            quotation.quoted_amount = value;
        }
        if let Some(value) = self.material_cost {
            quotation.material_cost = Some(value);
        }
        if let Some(value) = self.engineering_cost {
            quotation.engineering_cost = Some(value);
        }
        if let Some(value) = self.software_cost {
            quotation.software_cost = Some(value);
        }
        if let Some(value) = self.installation_cost {
            quotation.installation_cost = Some(value);
        }
        if let Some(value) = self.margin {
            quotation.margin = Some(value);
        }
        if let Some(value) = self.validity_date {
            quotation.validity_date = Some(value);
        }
        if let Some(value) = self.approval_status {
            quotation.approval_status = value;
        }
        if let Some(value) = self.final_approved_amount {
            quotation.final_approved_amount = Some(value);
        }
    }
}

fn ensure_non_negative(field: &str, value: Option<Decimal>) -> Result<(), DomainError> {
    match value {
        Some(amount) if amount.is_sign_negative() => {
            Err(DomainError::Validation(format!("{field} cannot be negative")))
        }
        _ => Ok(()),
    }
}
