//! `tabx-settlement` — settlement orchestration against an external
//! transfer authority.
//!
//! The coordinator's one correctness property is confirm-then-record: the
//! ledger must never reflect money that did not move, and money that moved
//! must be reflected exactly once. Every settlement runs as a short state
//! machine; ambiguous outcomes (timeouts) park the attempt until an explicit
//! reconciliation resolves what the authority actually did.

pub mod attempt;
pub mod authority;
pub mod coordinator;
pub mod error;

pub use attempt::{AttemptId, SettlementAttempt, SettlementPath, SettlementState};
pub use authority::{
    AuthorityError, Confirmation, InMemoryAuthority, TransferAuthority, TransferRef,
};
pub use coordinator::{
    ReconcileOutcome, SettlementConfig, SettlementCoordinator, SettlementReceipt,
};
pub use error::SettlementError;
