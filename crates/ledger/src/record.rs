//! Debt records and their key.

use chrono::{DateTime, Utc};

use tabx_core::{Amount, GroupId, Participant};

/// Unique key of a debt record: one record per debtor/creditor pair per group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub group_id: GroupId,
    pub debtor: Participant,
    pub creditor: Participant,
}

impl RecordKey {
    pub fn new(group_id: GroupId, debtor: Participant, creditor: Participant) -> Self {
        Self {
            group_id,
            debtor,
            creditor,
        }
    }
}

/// A ledger entry: what `debtor` still owes `creditor` within a group.
///
/// Invariants: `debtor != creditor`; `settled == outstanding.is_zero()`.
/// Fields are crate-private: records are owned exclusively by the ledger
/// and mutated only through `record_debt`/`apply_payment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebtRecord {
    group_id: GroupId,
    debtor: Participant,
    creditor: Participant,
    outstanding: Amount,
    settled: bool,
    last_updated: DateTime<Utc>,
}

impl DebtRecord {
    pub(crate) fn open(key: &RecordKey, amount: Amount, now: DateTime<Utc>) -> Self {
        Self {
            group_id: key.group_id,
            debtor: key.debtor.clone(),
            creditor: key.creditor.clone(),
            outstanding: amount,
            settled: amount.is_zero(),
            last_updated: now,
        }
    }

    pub(crate) fn accumulate(&mut self, amount: Amount, now: DateTime<Utc>) -> Option<()> {
        self.outstanding = self.outstanding.checked_add(amount)?;
        self.settled = self.outstanding.is_zero();
        self.last_updated = now;
        Some(())
    }

    pub(crate) fn discharge(&mut self, applied: Amount, now: DateTime<Utc>) {
        debug_assert!(applied <= self.outstanding);
        self.outstanding = self
            .outstanding
            .checked_sub(applied)
            .expect("applied amount is clamped to outstanding");
        self.settled = self.outstanding.is_zero();
        self.last_updated = now;
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn debtor(&self) -> &Participant {
        &self.debtor
    }

    pub fn creditor(&self) -> &Participant {
        &self.creditor
    }

    pub fn outstanding(&self) -> Amount {
        self.outstanding
    }

    pub fn settled(&self) -> bool {
        self.settled
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.group_id, self.debtor.clone(), self.creditor.clone())
    }
}

/// What a payment did to a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// The amount actually discharged. Overpayment is clamped, not rejected,
    /// and the clamped figure is reported so the caller can route the excess.
    pub applied: Amount,
    pub remaining: Amount,
    pub settled_now: bool,
}
