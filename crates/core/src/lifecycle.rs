//! RFQ status lifecycle: guard evaluation and the atomic transition commit.
//!
//! Status changes after creation flow exclusively through [`LifecycleManager::transition`]. The
//! manager evaluates the target state's guards, builds a [`TransitionCommit`] carrying the status
//! write, the audit entry and the optional notification, and hands it to the store to apply in one
//! unit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::audit::StatusAuditEntry;
use crate::domain::notification::Notification;
use crate::domain::rfq::{normalized_reason, Rfq, RfqId, RfqPatch, RfqStatus, TransitionGuard};
use crate::domain::user::Actor;
use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuotationSummary {
    pub total: u64,
    pub approved: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    pub requested: RfqStatus,
    pub reason: Option<String>,
    /// Descriptive edits written in the same commit as the status change. Ignored when the
    /// request turns out to be a no-op.
    pub details: Option<RfqPatch>,
}

impl TransitionRequest {
    pub fn new(requested: RfqStatus) -> Self {
        Self { requested, reason: None, details: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_details(mut self, details: RfqPatch) -> Self {
        self.details = Some(details).filter(|patch| !patch.is_empty());
        self
    }
}

/// Everything a successful transition writes, applied by the store in one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionCommit {
    pub rfq_id: RfqId,
    pub from: RfqStatus,
    pub to: RfqStatus,
    /// Written to `reason_for_lost_on_hold` when present.
    pub reason: Option<String>,
    /// Applied after the status write, inside the same unit.
    pub details: Option<RfqPatch>,
    pub audit: StatusAuditEntry,
    pub notification: Option<Notification>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransitionOutcome {
    Unchanged(Rfq),
    Applied { rfq: Rfq, audit: StatusAuditEntry, notification: Option<Notification> },
}

impl TransitionOutcome {
    pub fn rfq(&self) -> &Rfq {
        match self {
            Self::Unchanged(rfq) | Self::Applied { rfq, .. } => rfq,
        }
    }

    pub fn into_rfq(self) -> Rfq {
        match self {
            Self::Unchanged(rfq) | Self::Applied { rfq, .. } => rfq,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("rfq {0} not found")]
    NotFound(RfqId),
    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => DomainError::NotFound("RFQ not found".to_string()).into(),
            StoreError::Backend(message) => ApplicationError::Persistence(message),
        }
    }
}

/// Storage operations the lifecycle needs. The commit is the only way status is written.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn quotation_summary(&self, rfq_id: &RfqId) -> Result<QuotationSummary, StoreError>;

    /// Applies the status update, audit append and optional notification atomically, returning
    /// the RFQ as stored afterwards. On error nothing is written.
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Rfq, StoreError>;
}

#[async_trait]
impl<S> LifecycleStore for &S
where
    S: LifecycleStore + ?Sized,
{
    async fn quotation_summary(&self, rfq_id: &RfqId) -> Result<QuotationSummary, StoreError> {
        (**self).quotation_summary(rfq_id).await
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Rfq, StoreError> {
        (**self).commit_transition(commit).await
    }
}

/// Checks the guards of `target` in declaration order; the first failure wins.
///
/// `summary` is only consulted for quotation guards and may be `None` when none apply.
pub fn evaluate_guards(
    target: RfqStatus,
    summary: Option<QuotationSummary>,
    reason: Option<&str>,
) -> Result<(), DomainError> {
    let summary = summary.unwrap_or_default();
    for guard in target.guards() {
        match guard {
            TransitionGuard::QuotationExists if summary.total == 0 => {
                return Err(DomainError::PreconditionFailed("no quotation".to_string()));
            }
            TransitionGuard::ApprovedQuotationExists if summary.approved == 0 => {
                return Err(DomainError::PreconditionFailed("no approved quotation".to_string()));
            }
            TransitionGuard::ReasonRequired if normalized_reason(reason).is_none() => {
                return Err(DomainError::Validation("reason required".to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

pub struct LifecycleManager<S> {
    store: S,
}

impl<S> LifecycleManager<S>
where
    S: LifecycleStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Moves `rfq` to the requested status on behalf of `actor`.
    ///
    /// The caller resolves the RFQ and checks that the actor may modify it. A request for the
    /// current status is a no-op that touches no storage.
    pub async fn transition(
        &self,
        rfq: &Rfq,
        request: TransitionRequest,
        actor: &Actor,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let target = request.requested;
        if !rfq.status.can_transition_to(target) {
            tracing::debug!(
                event_name = "lifecycle.transition.noop",
                rfq_id = %rfq.id,
                status = %target,
                "requested status equals current status"
            );
            return Ok(TransitionOutcome::Unchanged(rfq.clone()));
        }

        let reason = normalized_reason(request.reason.as_deref());
        let needs_summary = target.guards().iter().any(|guard| {
            matches!(
                guard,
                TransitionGuard::QuotationExists | TransitionGuard::ApprovedQuotationExists
            )
        });
        let summary = if needs_summary {
            Some(self.store.quotation_summary(&rfq.id).await?)
        } else {
            None
        };
        let checked = evaluate_guards(target, summary, reason.as_deref()).and_then(|()| {
            let mut projected = rfq.clone();
            projected.status = target;
            request.details.as_ref().map_or(Ok(()), |details| details.validate_for(&projected))
        });
        if let Err(error) = checked {
            tracing::info!(
                event_name = "lifecycle.transition.rejected",
                rfq_id = %rfq.id,
                from = %rfq.status,
                to = %target,
                actor_id = %actor.id,
                error = %error,
                "rfq transition rejected"
            );
            return Err(error.into());
        }

        let changed_at = Utc::now();
        let audit = StatusAuditEntry::new(
            rfq.id.clone(),
            Some(rfq.status),
            target,
            actor.id.clone(),
            reason.clone(),
            changed_at,
        );
        let notification = target.raises_notification().then(|| {
            Notification::status_change(
                actor.id.clone(),
                rfq.id.clone(),
                &rfq.rfq_number,
                target,
                changed_at,
            )
        });

        let commit = TransitionCommit {
            rfq_id: rfq.id.clone(),
            from: rfq.status,
            to: target,
            reason,
            details: request.details,
            audit: audit.clone(),
            notification: notification.clone(),
            changed_at,
        };
        let updated = self.store.commit_transition(commit).await?;

        Ok(TransitionOutcome::Applied { rfq: updated, audit, notification })
    }

    /// Moves the RFQ to `Quotation Sent` after a quotation was recorded, unless it is already at
    /// or beyond that point in the pipeline.
    pub async fn advance_after_quotation(
        &self,
        rfq: &Rfq,
        actor: &Actor,
    ) -> Result<TransitionOutcome, ApplicationError> {
        if !rfq.status.advances_on_quotation() {
            return Ok(TransitionOutcome::Unchanged(rfq.clone()));
        }
        self.transition(rfq, TransitionRequest::new(RfqStatus::QuotationSent), actor).await
    }
}
