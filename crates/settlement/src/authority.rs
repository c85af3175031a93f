//! The external transfer authority seam.
//!
//! A pre-funded escrow balance per group member, plus direct value
//! transfers. The transport is out of scope here; the trait assumes a
//! synchronous-looking call whose confirmation is the only trigger for
//! ledger mutation.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use tabx_core::{Amount, DomainError, GroupId, Participant};

/// Caller-minted reference identifying one transfer instruction.
///
/// Minted *before* the transfer is issued: if the call times out, the
/// reference is all the coordinator has left to ask the authority what
/// actually happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferRef(Uuid);

impl TransferRef {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TransferRef {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for TransferRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TransferRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("TransferRef: {e}")))?;
        Ok(Self(uuid))
    }
}

/// The authority's acknowledgement that value actually moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub reference: TransferRef,
    pub amount: Amount,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// The authority refused the instruction (insufficient escrow, bad
    /// account, …). Definitive: the transfer did not happen.
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// The transfer was accepted and later reverted. Definitive.
    #[error("transfer reverted: {0}")]
    Reverted(String),

    /// The authority could not be reached or gave no answer. The outcome is
    /// unknown; only the reconciliation query retries on this.
    #[error("authority unavailable: {0}")]
    Unavailable(String),
}

/// Operations the coordinator consumes from the external value-transfer
/// system.
#[async_trait]
pub trait TransferAuthority: Send + Sync {
    /// Pre-funded balance `participant` holds with the authority for `group`.
    async fn prefunded_balance(
        &self,
        group_id: GroupId,
        participant: &Participant,
    ) -> Result<Amount, AuthorityError>;

    /// Move `amount` out of the debtor's pre-funded balance to `to`.
    async fn transfer_from_escrow(
        &self,
        reference: TransferRef,
        group_id: GroupId,
        from: &Participant,
        to: &Participant,
        amount: Amount,
    ) -> Result<Confirmation, AuthorityError>;

    /// Execute a direct value transfer from `from` to `to`.
    async fn transfer_direct(
        &self,
        reference: TransferRef,
        from: &Participant,
        to: &Participant,
        amount: Amount,
    ) -> Result<Confirmation, AuthorityError>;

    /// Reconciliation query: the true outcome of a previously issued
    /// transfer. `Ok(None)` is a definitive "never landed".
    async fn lookup_transfer(
        &self,
        reference: TransferRef,
    ) -> Result<Option<Confirmation>, AuthorityError>;
}

/// In-process authority.
///
/// Intended for tests/dev: holds escrow balances and a log of confirmed
/// transfers, with knobs to inject rejection, hangs and lookup outages.
#[derive(Default)]
pub struct InMemoryAuthority {
    escrow: RwLock<HashMap<(GroupId, Participant), Amount>>,
    confirmed: RwLock<HashMap<TransferRef, Confirmation>>,
    reject_transfers: AtomicBool,
    hang_transfers: AtomicBool,
    unavailable_lookups: AtomicU32,
}

impl InMemoryAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a participant's pre-funded balance for a group.
    pub fn fund_escrow(&self, group_id: GroupId, participant: Participant, amount: Amount) {
        let mut escrow = self.escrow.write().expect("escrow lock");
        let balance = escrow.entry((group_id, participant)).or_insert(Amount::ZERO);
        *balance = balance.checked_add(amount).expect("escrow balance overflow");
    }

    pub fn escrow_balance(&self, group_id: GroupId, participant: &Participant) -> Amount {
        self.escrow
            .read()
            .expect("escrow lock")
            .get(&(group_id, participant.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Make subsequent transfer instructions fail with `Rejected`.
    pub fn reject_transfers(&self, on: bool) {
        self.reject_transfers.store(on, Ordering::SeqCst);
    }

    /// Make subsequent transfer instructions hang forever (timeout testing).
    pub fn hang_transfers(&self, on: bool) {
        self.hang_transfers.store(on, Ordering::SeqCst);
    }

    /// Fail the next `n` lookup queries with `Unavailable`.
    pub fn fail_next_lookups(&self, n: u32) {
        self.unavailable_lookups.store(n, Ordering::SeqCst);
    }

    /// Mark a transfer as having landed out-of-band (simulates a transfer
    /// that completed after the caller stopped waiting).
    pub fn inject_confirmation(&self, reference: TransferRef, amount: Amount) {
        self.confirmed.write().expect("confirmation lock").insert(
            reference,
            Confirmation {
                reference,
                amount,
                confirmed_at: Utc::now(),
            },
        );
    }

    fn confirm(&self, reference: TransferRef, amount: Amount) -> Confirmation {
        let confirmation = Confirmation {
            reference,
            amount,
            confirmed_at: Utc::now(),
        };
        self.confirmed
            .write()
            .expect("confirmation lock")
            .insert(reference, confirmation.clone());
        confirmation
    }

    async fn gate(&self) -> Result<(), AuthorityError> {
        if self.hang_transfers.load(Ordering::SeqCst) {
            // Effectively forever; callers are expected to time out.
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.reject_transfers.load(Ordering::SeqCst) {
            return Err(AuthorityError::Rejected("transfer rejected by authority".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransferAuthority for InMemoryAuthority {
    async fn prefunded_balance(
        &self,
        group_id: GroupId,
        participant: &Participant,
    ) -> Result<Amount, AuthorityError> {
        Ok(self.escrow_balance(group_id, participant))
    }

    async fn transfer_from_escrow(
        &self,
        reference: TransferRef,
        group_id: GroupId,
        from: &Participant,
        to: &Participant,
        amount: Amount,
    ) -> Result<Confirmation, AuthorityError> {
        self.gate().await?;
        let _ = to;
        let mut escrow = self.escrow.write().expect("escrow lock");
        let balance = escrow
            .entry((group_id, from.clone()))
            .or_insert(Amount::ZERO);
        *balance = balance.checked_sub(amount).ok_or_else(|| {
            AuthorityError::Rejected(format!(
                "escrow balance {balance} does not cover {amount}"
            ))
        })?;
        drop(escrow);
        Ok(self.confirm(reference, amount))
    }

    async fn transfer_direct(
        &self,
        reference: TransferRef,
        from: &Participant,
        to: &Participant,
        amount: Amount,
    ) -> Result<Confirmation, AuthorityError> {
        self.gate().await?;
        let _ = (from, to);
        Ok(self.confirm(reference, amount))
    }

    async fn lookup_transfer(
        &self,
        reference: TransferRef,
    ) -> Result<Option<Confirmation>, AuthorityError> {
        let pending = self.unavailable_lookups.load(Ordering::SeqCst);
        if pending > 0 {
            self.unavailable_lookups.store(pending - 1, Ordering::SeqCst);
            return Err(AuthorityError::Unavailable("lookup outage".into()));
        }
        Ok(self
            .confirmed
            .read()
            .expect("confirmation lock")
            .get(&reference)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(handle: &str) -> Participant {
        Participant::new(handle).unwrap()
    }

    #[tokio::test]
    async fn escrow_transfer_debits_the_prefunded_balance() {
        let authority = InMemoryAuthority::new();
        let group = GroupId::new(1);
        authority.fund_escrow(group, p("debtor"), Amount::from_units(100));

        let reference = TransferRef::new();
        let confirmation = authority
            .transfer_from_escrow(reference, group, &p("debtor"), &p("creditor"), Amount::from_units(60))
            .await
            .unwrap();
        assert_eq!(confirmation.amount, Amount::from_units(60));
        assert_eq!(
            authority.escrow_balance(group, &p("debtor")),
            Amount::from_units(40)
        );

        // The confirmation is findable by reference afterwards.
        let found = authority.lookup_transfer(reference).await.unwrap();
        assert_eq!(found, Some(confirmation));
    }

    #[tokio::test]
    async fn escrow_transfer_rejects_when_underfunded() {
        let authority = InMemoryAuthority::new();
        let group = GroupId::new(1);
        let err = authority
            .transfer_from_escrow(
                TransferRef::new(),
                group,
                &p("debtor"),
                &p("creditor"),
                Amount::from_units(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Rejected(_)));
    }

    #[tokio::test]
    async fn lookup_outage_is_consumed_per_query() {
        let authority = InMemoryAuthority::new();
        authority.fail_next_lookups(2);
        let reference = TransferRef::new();

        assert!(authority.lookup_transfer(reference).await.is_err());
        assert!(authority.lookup_transfer(reference).await.is_err());
        assert_eq!(authority.lookup_transfer(reference).await.unwrap(), None);
    }
}
