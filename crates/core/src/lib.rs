pub mod access;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;

pub use access::RfqScope;
pub use domain::audit::{StatusAuditEntry, StatusHistoryItem};
pub use domain::dashboard::{DashboardStats, StatsPeriod};
pub use domain::notification::Notification;
pub use domain::quotation::{ApprovalStatus, NewQuotation, Quotation, QuotationId, QuotationPatch};
pub use domain::rfq::{NewRfq, Priority, Rfq, RfqId, RfqPatch, RfqStatus, TransitionGuard};
pub use domain::user::{Actor, NewUser, Role, User, UserId, UserPatch};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{
    LifecycleManager, LifecycleStore, QuotationSummary, StoreError, TransitionCommit,
    TransitionOutcome, TransitionRequest,
};
