use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RfqId(pub String);

impl RfqId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RfqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow state of an RFQ.
///
/// The graph between states is complete: any state may move to any other, subject only to the
/// guards declared by [`RfqStatus::guards`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RfqStatus {
    #[default]
    #[serde(rename = "Enquiry")]
    Enquiry,
    #[serde(rename = "Under Review")]
    UnderReview,
    #[serde(rename = "Quotation Sent")]
    QuotationSent,
    #[serde(rename = "Negotiation")]
    Negotiation,
    #[serde(rename = "Won")]
    Won,
    #[serde(rename = "Lost")]
    Lost,
    #[serde(rename = "On Hold")]
    OnHold,
}

/// A precondition attached to entering a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionGuard {
    /// At least one quotation exists for the RFQ.
    QuotationExists,
    /// At least one quotation for the RFQ has been approved.
    ApprovedQuotationExists,
    /// A non-blank reason accompanies the request.
    ReasonRequired,
}

impl RfqStatus {
    pub const ALL: [RfqStatus; 7] = [
        RfqStatus::Enquiry,
        RfqStatus::UnderReview,
        RfqStatus::QuotationSent,
        RfqStatus::Negotiation,
        RfqStatus::Won,
        RfqStatus::Lost,
        RfqStatus::OnHold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enquiry => "Enquiry",
            Self::UnderReview => "Under Review",
            Self::QuotationSent => "Quotation Sent",
            Self::Negotiation => "Negotiation",
            Self::Won => "Won",
            Self::Lost => "Lost",
            Self::OnHold => "On Hold",
        }
    }

    /// Guards evaluated, in order, before entering this status.
    pub fn guards(&self) -> &'static [TransitionGuard] {
        match self {
            Self::QuotationSent => &[TransitionGuard::QuotationExists],
            Self::Won => &[TransitionGuard::ApprovedQuotationExists],
            Self::Lost | Self::OnHold => &[TransitionGuard::ReasonRequired],
            Self::Enquiry | Self::UnderReview | Self::Negotiation => &[],
        }
    }

    /// Whether a request for `next` would change the record at all.
    ///
    /// Exits from `Won` and `Lost` are permitted; only guard failures reject a move.
    pub fn can_transition_to(&self, next: RfqStatus) -> bool {
        *self != next
    }

    pub fn requires_reason(&self) -> bool {
        self.guards().contains(&TransitionGuard::ReasonRequired)
    }

    /// Won and Lost close the commercial pipeline for reporting purposes.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    pub fn raises_notification(&self) -> bool {
        self.is_closed()
    }

    /// Statuses from which creating a quotation moves the RFQ to `Quotation Sent`.
    pub fn advances_on_quotation(&self) -> bool {
        !matches!(self, Self::QuotationSent | Self::Negotiation | Self::Won)
    }
}

impl fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RfqStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RfqStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| DomainError::Validation(format!("unknown RFQ status `{value}`")))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// Sort weight so that `ORDER BY priority` follows urgency rather than spelling.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(DomainError::Validation(format!(
                "unknown priority `{other}` (expected Low|Medium|High|Critical)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    pub rfq_number: String,
    pub customer_name: String,
    pub customer_contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub product_project_name: Option<String>,
    pub rfq_category: Option<String>,
    pub rfq_source: Option<String>,
    pub priority: Priority,
    pub rfq_received_date: NaiveDate,
    pub rfq_due_date: Option<NaiveDate>,
    pub expected_order_date: Option<NaiveDate>,
    pub estimated_project_value: Option<Decimal>,
    pub currency: String,
    pub status: RfqStatus,
    pub assigned_engineer_id: Option<UserId>,
    pub assigned_sales_person_id: Option<UserId>,
    pub created_by: Option<UserId>,
    pub reason_for_lost_on_hold: Option<String>,
    pub remarks_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when an RFQ is first recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRfq {
    pub customer_name: String,
    pub customer_contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub product_project_name: Option<String>,
    pub rfq_category: Option<String>,
    pub rfq_source: Option<String>,
    pub priority: Priority,
    pub rfq_received_date: NaiveDate,
    pub rfq_due_date: Option<NaiveDate>,
    pub expected_order_date: Option<NaiveDate>,
    pub estimated_project_value: Option<Decimal>,
    pub currency: String,
    pub status: RfqStatus,
    pub assigned_engineer_id: Option<UserId>,
    pub assigned_sales_person_id: Option<UserId>,
    pub created_by: UserId,
    pub reason_for_lost_on_hold: Option<String>,
    pub remarks_notes: Option<String>,
}

impl NewRfq {
    /// Checks the record-level invariants that do not need storage.
    ///
    /// A brand new RFQ owns no quotations, so statuses guarded by quotation checks are
    /// unreachable at creation time.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::Validation("customer name is required".to_string()));
        }
        if self.currency.trim().is_empty() {
            return Err(DomainError::Validation("currency is required".to_string()));
        }
        if let Some(value) = self.estimated_project_value {
            if value.is_sign_negative() {
                return Err(DomainError::Validation(
                    "estimated project value cannot be negative".to_string(),
                ));
            }
        }

        for guard in self.status.guards() {
            match guard {
                TransitionGuard::QuotationExists => {
                    return Err(DomainError::PreconditionFailed("no quotation".to_string()))
                }
                TransitionGuard::ApprovedQuotationExists => {
                    return Err(DomainError::PreconditionFailed(
                        "no approved quotation".to_string(),
                    ))
                }
                TransitionGuard::ReasonRequired => {
                    if normalized_reason(self.reason_for_lost_on_hold.as_deref()).is_none() {
                        return Err(DomainError::Validation("reason required".to_string()));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Descriptive fields of an existing RFQ. Status is deliberately absent: it only changes
/// through the lifecycle manager.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RfqPatch {
    pub customer_name: Option<String>,
    pub customer_contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub product_project_name: Option<String>,
    pub rfq_category: Option<String>,
    pub rfq_source: Option<String>,
    pub priority: Option<Priority>,
    pub rfq_received_date: Option<NaiveDate>,
    pub rfq_due_date: Option<NaiveDate>,
    pub expected_order_date: Option<NaiveDate>,
    pub estimated_project_value: Option<Decimal>,
    pub currency: Option<String>,
    pub assigned_engineer_id: Option<UserId>,
    pub assigned_sales_person_id: Option<UserId>,
    pub reason_for_lost_on_hold: Option<String>,
    pub remarks_notes: Option<String>,
}

impl RfqPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validates the patch against the record it will be applied to.
    pub fn validate_for(&self, current: &Rfq) -> Result<(), DomainError> {
        if matches!(&self.customer_name, Some(name) if name.trim().is_empty()) {
            return Err(DomainError::Validation("customer name cannot be empty".to_string()));
        }
        if matches!(&self.currency, Some(currency) if currency.trim().is_empty()) {
            return Err(DomainError::Validation("currency cannot be empty".to_string()));
        }
        if matches!(self.estimated_project_value, Some(value) if value.is_sign_negative()) {
            return Err(DomainError::Validation(
                "estimated project value cannot be negative".to_string(),
            ));
        }
        if current.status.requires_reason() {
            if let Some(reason) = &self.reason_for_lost_on_hold {
                if reason.trim().is_empty() {
                    return Err(DomainError::Validation(format!(
                        "reason cannot be cleared while status is {}",
                        current.status
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn apply_to(&self, rfq: &mut Rfq) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut rfq.customer_name, &self.customer_name);
        set_opt(&mut rfq.customer_contact_person, &self.customer_contact_person);
        set_opt(&mut rfq.email, &self.email);
        set_opt(&mut rfq.phone, &self.phone);
        set_opt(&mut rfq.company_name, &self.company_name);
        set_opt(&mut rfq.product_project_name, &self.product_project_name);
        set_opt(&mut rfq.rfq_category, &self.rfq_category);
        set_opt(&mut rfq.rfq_source, &self.rfq_source);
        set(&mut rfq.priority, &self.priority);
        set(&mut rfq.rfq_received_date, &self.rfq_received_date);
        set_opt(&mut rfq.rfq_due_date, &self.rfq_due_date);
        set_opt(&mut rfq.expected_order_date, &self.expected_order_date);
        set_opt(&mut rfq.estimated_project_value, &self.estimated_project_value);
        set(&mut rfq.currency, &self.currency);
        set_opt(&mut rfq.assigned_engineer_id, &self.assigned_engineer_id);
        set_opt(&mut rfq.assigned_sales_person_id, &self.assigned_sales_person_id);
        set_opt(&mut rfq.reason_for_lost_on_hold, &self.reason_for_lost_on_hold);
        set_opt(&mut rfq.remarks_notes, &self.remarks_notes);
    }
}

/// Trims a free-text reason, treating blank input as absent.
pub fn normalized_reason(reason: Option<&str>) -> Option<String> {
    reason.map(str::trim).filter(|value| !value.is_empty()).map(ToOwned::to_owned)
}

/// Formats a sequence number as `<prefix>-<year>-<seq>` with at least four digits.
pub fn format_document_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:04}")
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{format_document_number, NewRfq, Priority, Rfq, RfqId, RfqPatch, RfqStatus};
    use crate::domain::user::UserId;
    use crate::errors::DomainError;

    fn new_rfq(status: RfqStatus) -> NewRfq {
        NewRfq {
            customer_name: "ABC Manufacturing Ltd.".to_string(),
            customer_contact_person: None,
            email: None,
            phone: None,
            company_name: None,
            product_project_name: None,
            rfq_category: Some("Automation".to_string()),
            rfq_source: None,
            priority: Priority::High,
            rfq_received_date: NaiveDate::from_ymd_opt(2026, 1, 15).expect("date"),
            rfq_due_date: None,
            expected_order_date: None,
            estimated_project_value: None,
            currency: "INR".to_string(),
            status,
            assigned_engineer_id: None,
            assigned_sales_person_id: None,
            created_by: UserId("u-sales".to_string()),
            reason_for_lost_on_hold: None,
            remarks_notes: None,
        }
    }

    fn rfq(status: RfqStatus) -> Rfq {
        let now = Utc::now();
        Rfq {
            id: RfqId("rfq-1".to_string()),
            rfq_number: "RFQ-2026-0001".to_string(),
            customer_name: "ABC".to_string(),
            customer_contact_person: None,
            email: None,
            phone: None,
            company_name: None,
            product_project_name: None,
            rfq_category: None,
            rfq_source: None,
            priority: Priority::Medium,
            rfq_received_date: NaiveDate::from_ymd_opt(2026, 1, 15).expect("date"),
            rfq_due_date: None,
            expected_order_date: None,
            estimated_project_value: None,
            currency: "INR".to_string(),
            status,
            assigned_engineer_id: None,
            assigned_sales_person_id: None,
            created_by: None,
            reason_for_lost_on_hold: Some("budget frozen".to_string()),
            remarks_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_labels_round_trip_through_from_str() {
        for status in RfqStatus::ALL {
            assert_eq!(status.as_str().parse::<RfqStatus>().expect("parse"), status);
        }
        assert_eq!("on hold".parse::<RfqStatus>().expect("case-insensitive"), RfqStatus::OnHold);
        assert!("Archived".parse::<RfqStatus>().is_err());
    }

    #[test]
    fn new_records_start_as_enquiry() {
        assert_eq!(RfqStatus::default(), RfqStatus::Enquiry);
    }

    #[test]
    fn status_serializes_with_display_labels() {
        let json = serde_json::to_string(&RfqStatus::QuotationSent).expect("serialize");
        assert_eq!(json, "\"Quotation Sent\"");
    }

    #[test]
    fn graph_is_permissive_including_exits_from_closed_states() {
        assert!(RfqStatus::Won.can_transition_to(RfqStatus::Enquiry));
        assert!(RfqStatus::Lost.can_transition_to(RfqStatus::Negotiation));
        assert!(RfqStatus::Enquiry.can_transition_to(RfqStatus::Won));
        assert!(!RfqStatus::Negotiation.can_transition_to(RfqStatus::Negotiation));
    }

    #[test]
    fn creation_rejects_quotation_guarded_statuses() {
        let error = new_rfq(RfqStatus::Won).validate().expect_err("won at creation");
        assert!(matches!(error, DomainError::PreconditionFailed(_)));

        let error = new_rfq(RfqStatus::QuotationSent).validate().expect_err("sent at creation");
        assert!(matches!(error, DomainError::PreconditionFailed(_)));
    }

    #[test]
    fn creation_as_lost_requires_reason() {
        let mut input = new_rfq(RfqStatus::Lost);
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));

        input.reason_for_lost_on_hold = Some("went with competitor".to_string());
        input.validate().expect("reason supplied");
    }

    #[test]
    fn patch_cannot_blank_reason_on_held_rfq() {
        let current = rfq(RfqStatus::OnHold);
        let patch =
            RfqPatch { reason_for_lost_on_hold: Some("   ".to_string()), ..RfqPatch::default() };
        assert!(matches!(patch.validate_for(&current), Err(DomainError::Validation(_))));
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut record = rfq(RfqStatus::Enquiry);
        let patch = RfqPatch {
            priority: Some(Priority::Critical),
            remarks_notes: Some("customer escalated".to_string()),
            ..RfqPatch::default()
        };
        patch.apply_to(&mut record);

        assert_eq!(record.priority, Priority::Critical);
        assert_eq!(record.remarks_notes.as_deref(), Some("customer escalated"));
        assert_eq!(record.customer_name, "ABC");
        assert_eq!(record.status, RfqStatus::Enquiry);
    }

    #[test]
    fn document_numbers_are_zero_padded() {
        assert_eq!(format_document_number("RFQ", 2026, 7), "RFQ-2026-0007");
        assert_eq!(format_document_number("QT", 2026, 12345), "QT-2026-12345");
    }
}
