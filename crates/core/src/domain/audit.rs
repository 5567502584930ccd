use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rfq::{RfqId, RfqStatus};
use crate::domain::user::UserId;

/// One immutable row of an RFQ's status history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAuditEntry {
    pub id: String,
    pub rfq_id: RfqId,
    /// `None` only for the entry written when the RFQ is created.
    pub old_status: Option<RfqStatus>,
    pub new_status: RfqStatus,
    /// Cleared when the acting user is permanently deleted.
    pub changed_by: Option<UserId>,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl StatusAuditEntry {
    pub fn new(
        rfq_id: RfqId,
        old_status: Option<RfqStatus>,
        new_status: RfqStatus,
        changed_by: UserId,
        reason: Option<String>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rfq_id,
            old_status,
            new_status,
            changed_by: Some(changed_by),
            reason,
            changed_at,
        }
    }

    pub fn is_creation(&self) -> bool {
        self.old_status.is_none()
    }
}

/// Audit entry joined with the display name of the user who made the change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryItem {
    #[serde(flatten)]
    pub entry: StatusAuditEntry,
    pub changed_by_name: Option<String>,
}
