use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rfq::{RfqId, RfqStatus};
use crate::domain::user::UserId;

pub const STATUS_CHANGE_TYPE: &str = "status_change";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: UserId,
    pub rfq_id: Option<RfqId>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Notice raised when an RFQ closes as won or lost, addressed to whoever closed it.
    pub fn status_change(
        user_id: UserId,
        rfq_id: RfqId,
        rfq_number: &str,
        status: RfqStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            rfq_id: Some(rfq_id),
            title: format!("RFQ {rfq_number} marked as {status}"),
            message: format!("RFQ {rfq_number} has been marked as {status}"),
            notification_type: STATUS_CHANGE_TYPE.to_string(),
            is_read: false,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::Notification;
    use crate::domain::rfq::{RfqId, RfqStatus};
    use crate::domain::user::UserId;

    #[test]
    fn status_change_notice_uses_rfq_number() {
        let notice = Notification::status_change(
            UserId("u-1".to_string()),
            RfqId("rfq-1".to_string()),
            "RFQ-2026-0003",
            RfqStatus::Won,
            Utc::now(),
        );

        assert_eq!(notice.title, "RFQ RFQ-2026-0003 marked as Won");
        assert_eq!(notice.message, "RFQ RFQ-2026-0003 has been marked as Won");
        assert_eq!(notice.notification_type, "status_change");
        assert!(!notice.is_read);
    }
}
