use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use rfq_tracker_core::domain::audit::StatusAuditEntry;
use rfq_tracker_core::domain::notification::Notification;
use rfq_tracker_core::domain::quotation::{ApprovalStatus, Quotation};
use rfq_tracker_core::domain::rfq::{Rfq, RfqId};
use rfq_tracker_core::lifecycle::{LifecycleStore, QuotationSummary, StoreError, TransitionCommit};

#[derive(Default)]
struct MemoryState {
    rfqs: HashMap<String, Rfq>,
    quotations: Vec<Quotation>,
    audit: Vec<StatusAuditEntry>,
    notifications: Vec<Notification>,
}

/// Lifecycle storage held in process memory for exercising the manager without SQLite. All parts of a commit are applied under one
/// write lock, and [`fail_next_commit`](Self::fail_next_commit) rejects a commit before anything
/// is written.
#[derive(Default)]
pub struct InMemoryLifecycleStore {
    state: RwLock<MemoryState>,
    fail_next: AtomicBool,
}

impl InMemoryLifecycleStore {
    pub async fn insert_rfq(&self, rfq: Rfq) {
        self.state.write().await.rfqs.insert(rfq.id.0.clone(), rfq);
    }

    pub async fn insert_quotation(&self, quotation: Quotation) {
        self.state.write().await.quotations.push(quotation);
    }

    pub async fn rfq(&self, id: &RfqId) -> Option<Rfq> {
        self.state.read().await.rfqs.get(&id.0).cloned()
    }

    /// Audit entries for `id`, newest first.
    pub async fn audit_for(&self, id: &RfqId) -> Vec<StatusAuditEntry> {
        let state = self.state.read().await;
        state.audit.iter().rev().filter(|entry| entry.rfq_id == *id).cloned().collect()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn quotation_summary(&self, rfq_id: &RfqId) -> Result<QuotationSummary, StoreError> {
        let state = self.state.read().await;
        let mut summary = QuotationSummary::default();
        for quotation in state.quotations.iter().filter(|q| q.rfq_id == *rfq_id) {
            summary.total += 1;
            if quotation.approval_status == ApprovalStatus::Approved {
                summary.approved += 1;
            }
        }
        Ok(summary)
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Rfq, StoreError> {
        let mut state = self.state.write().await;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }

        let Some(rfq) = state.rfqs.get_mut(&commit.rfq_id.0) else {
            return Err(StoreError::NotFound(commit.rfq_id));
        };
        rfq.status = commit.to;
        if let Some(reason) = &commit.reason {
            rfq.reason_for_lost_on_hold = Some(reason.clone());
        }
        if let Some(details) = &commit.details {
            details.apply_to(rfq);
        }
        rfq.updated_at = commit.changed_at;
        let updated = rfq.clone();

        state.audit.push(commit.audit);
        if let Some(notification) = commit.notification {
            state.notifications.push(notification);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use rfq_tracker_core::domain::quotation::{ApprovalStatus, Quotation, QuotationId};
    use rfq_tracker_core::domain::rfq::{Priority, Rfq, RfqId, RfqStatus};
    use rfq_tracker_core::domain::user::{Actor, Role, UserId};
    use rfq_tracker_core::errors::{ApplicationError, DomainError};
    use rfq_tracker_core::lifecycle::{LifecycleManager, TransitionRequest};

    use super::InMemoryLifecycleStore;

    fn rfq(status: RfqStatus) -> Rfq {
        let now = Utc::now();
        Rfq {
            id: RfqId("rfq-mem".to_string()),
            rfq_number: "RFQ-2026-0042".to_string(),
            customer_name: "Nova Plastics".to_string(),
            customer_contact_person: None,
            email: None,
            phone: None,
            company_name: None,
            product_project_name: None,
            rfq_category: None,
            rfq_source: None,
            priority: Priority::High,
            rfq_received_date: NaiveDate::from_ymd_opt(2026, 5, 4).expect("date"),
            rfq_due_date: None,
            expected_order_date: None,
            estimated_project_value: None,
            currency: "INR".to_string(),
            status,
            assigned_engineer_id: None,
            assigned_sales_person_id: Some(UserId("sales-1".to_string())),
            created_by: Some(UserId("sales-1".to_string())),
            reason_for_lost_on_hold: None,
            remarks_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn quotation(status: ApprovalStatus) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: QuotationId::generate(),
            quotation_number: "QT-2026-0001".to_string(),
            rfq_id: RfqId("rfq-mem".to_string()),
            revision_number: 1,
            quotation_sent_date: None,
            quoted_amount: Decimal::new(250_000, 0),
            material_cost: None,
            engineering_cost: None,
            software_cost: None,
            installation_cost: None,
            margin: None,
            validity_date: None,
            approval_status: status,
            final_approved_amount: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn actor() -> Actor {
        Actor::new("sales-1", Role::Sales)
    }

    #[tokio::test]
    async fn negotiation_to_won_with_approved_quotation_notifies_once() {
        let store = InMemoryLifecycleStore::default();
        let current = rfq(RfqStatus::Negotiation);
        store.insert_rfq(current.clone()).await;
        store.insert_quotation(quotation(ApprovalStatus::Pending)).await;
        store.insert_quotation(quotation(ApprovalStatus::Approved)).await;

        let manager = LifecycleManager::new(&store);
        let outcome = manager
            .transition(&current, TransitionRequest::new(RfqStatus::Won), &actor())
            .await
            .expect("won");

        assert_eq!(outcome.rfq().status, RfqStatus::Won);
        assert_eq!(store.notifications().await.len(), 1);
        let audit = store.audit_for(&current.id).await;
        assert_eq!(audit[0].old_status, Some(RfqStatus::Negotiation));
    }

    #[tokio::test]
    async fn injected_failure_writes_nothing() {
        let store = InMemoryLifecycleStore::default();
        let current = rfq(RfqStatus::Enquiry);
        store.insert_rfq(current.clone()).await;
        store.fail_next_commit();

        let manager = LifecycleManager::new(&store);
        let error = manager
            .transition(
                &current,
                TransitionRequest::new(RfqStatus::OnHold).with_reason("customer budget freeze"),
                &actor(),
            )
            .await
            .expect_err("injected failure");

        assert!(matches!(error, ApplicationError::Persistence(_)));
        let stored = store.rfq(&current.id).await.expect("rfq");
        assert_eq!(stored.status, RfqStatus::Enquiry);
        assert!(store.audit_for(&current.id).await.is_empty());
        assert!(store.notifications().await.is_empty());

        manager
            .transition(
                &current,
                TransitionRequest::new(RfqStatus::OnHold).with_reason("customer budget freeze"),
                &actor(),
            )
            .await
            .expect("retry succeeds");
        assert_eq!(store.audit_for(&current.id).await.len(), 1);
    }

    #[tokio::test]
    async fn missing_rfq_commit_is_not_found() {
        let store = InMemoryLifecycleStore::default();
        let manager = LifecycleManager::new(&store);

        let error = manager
            .transition(&rfq(RfqStatus::Enquiry), TransitionRequest::new(RfqStatus::UnderReview), &actor())
            .await
            .expect_err("unknown rfq");
        assert_eq!(error, ApplicationError::Domain(DomainError::NotFound("RFQ not found".to_string())));
    }
}
