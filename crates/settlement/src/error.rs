//! Settlement error model, layered over the domain taxonomy.

use thiserror::Error;

use tabx_core::DomainError;

use crate::attempt::AttemptId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Validation / not-found / conflict, unchanged from the ledger layer.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The authority rejected or reverted the transfer. The ledger is left
    /// exactly as it was; this is never retried automatically.
    #[error("external transfer authority error: {0}")]
    ExternalLedger(String),

    /// The attempt's outcome is unknown (timed out, or confirmed but not yet
    /// recorded). It is neither success nor failure until an explicit
    /// reconciliation resolves it.
    #[error("settlement attempt {attempt} requires reconciliation")]
    ReconciliationPending { attempt: AttemptId },
}
