//! Settlement attempts and their state machine.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tabx_core::{Amount, DomainError, GroupId, Participant};
use tabx_ledger::PaymentOutcome;

use crate::authority::TransferRef;

/// Identifier of a settlement attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for AttemptId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("AttemptId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// How a settlement was (or will be) funded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementPath {
    /// Funded from the debtor's pre-funded balance held by the authority.
    Escrow,
    /// A direct value transfer from debtor to creditor.
    Direct,
}

impl core::fmt::Display for SettlementPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SettlementPath::Escrow => f.write_str("escrow"),
            SettlementPath::Direct => f.write_str("direct"),
        }
    }
}

/// Settlement attempt lifecycle.
///
/// ```text
/// Requested -> TransferPending -> TransferConfirmed -> LedgerUpdated   (success)
/// Requested -> TransferPending -> TransferFailed                      (failure, ledger untouched)
/// TransferPending -> TimedOut -> TransferConfirmed | TransferFailed   (via reconciliation)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    Requested,
    TransferPending,
    TransferConfirmed,
    LedgerUpdated,
    TransferFailed,
    TimedOut,
}

impl SettlementState {
    /// Valid transitions. Terminal states admit none; `TimedOut` is
    /// terminal-ambiguous and leaves only through reconciliation.
    fn allowed(self) -> &'static [SettlementState] {
        use SettlementState::*;
        match self {
            Requested => &[TransferPending, TransferFailed],
            TransferPending => &[TransferConfirmed, TransferFailed, TimedOut],
            TransferConfirmed => &[LedgerUpdated],
            TimedOut => &[TransferConfirmed, TransferFailed],
            LedgerUpdated | TransferFailed => &[],
        }
    }

    pub fn can_transition_to(self, to: SettlementState) -> bool {
        self.allowed().contains(&to)
    }

    /// `LedgerUpdated` and `TransferFailed` are resolved for good.
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            SettlementState::LedgerUpdated | SettlementState::TransferFailed
        )
    }
}

/// Ephemeral record of one in-flight settlement.
#[derive(Debug, Clone)]
pub struct SettlementAttempt {
    pub id: AttemptId,
    pub group_id: GroupId,
    pub debtor: Participant,
    pub creditor: Participant,
    pub requested: Amount,
    /// `min(requested, outstanding)` as observed at validation time.
    pub amount_to_apply: Amount,
    /// Decided once the prefunded balance has been queried.
    pub path: Option<SettlementPath>,
    /// Minted before the transfer is issued so a timed-out attempt can be
    /// resolved against the authority by reference.
    pub reference: TransferRef,
    pub state: SettlementState,
    /// Filled when the ledger mutation lands (`LedgerUpdated`).
    pub outcome: Option<PaymentOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettlementAttempt {
    pub fn new(
        group_id: GroupId,
        debtor: Participant,
        creditor: Participant,
        requested: Amount,
        amount_to_apply: Amount,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AttemptId::new(),
            group_id,
            debtor,
            creditor,
            requested,
            amount_to_apply,
            path: None,
            reference: TransferRef::new(),
            state: SettlementState::Requested,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SettlementState::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(Requested.can_transition_to(TransferPending));
        assert!(TransferPending.can_transition_to(TransferConfirmed));
        assert!(TransferConfirmed.can_transition_to(LedgerUpdated));
    }

    #[test]
    fn timed_out_leaves_only_through_reconciliation() {
        assert!(TransferPending.can_transition_to(TimedOut));
        assert!(TimedOut.can_transition_to(TransferConfirmed));
        assert!(TimedOut.can_transition_to(TransferFailed));
        assert!(!TimedOut.can_transition_to(LedgerUpdated));
    }

    #[test]
    fn resolved_states_admit_no_transitions() {
        for terminal in [LedgerUpdated, TransferFailed] {
            assert!(terminal.is_resolved());
            for to in [
                Requested,
                TransferPending,
                TransferConfirmed,
                LedgerUpdated,
                TransferFailed,
                TimedOut,
            ] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn no_skipping_the_confirmation_step() {
        assert!(!TransferPending.can_transition_to(LedgerUpdated));
        assert!(!Requested.can_transition_to(TransferConfirmed));
    }
}
