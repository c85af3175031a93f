//! Storage seams for debts and expenses.
//!
//! The ledger consumes persistence as a simple keyed store with per-key
//! atomic read-modify-write. Implementations own two guarantees:
//!
//! - all mutations touching the same [`RecordKey`] are serialized, while
//!   distinct keys proceed fully concurrently;
//! - reads return a consistent snapshot of a record (never a torn
//!   `outstanding`/`settled` pair).
//!
//! Engine choice beyond the in-memory store is deliberately out of scope;
//! any backend with per-key atomic read-modify-write can sit behind these
//! traits.

use tabx_core::{DomainResult, ExpenseId, GroupId};

use crate::expense::Expense;
use crate::record::{DebtRecord, RecordKey};

/// Keyed store of debt records.
pub trait DebtStore: Send + Sync {
    /// Snapshot read of one record. `None` if no record exists for the key.
    fn get(&self, key: &RecordKey) -> DomainResult<Option<DebtRecord>>;

    /// Snapshot read of every record in a group, settled ones included
    /// (records are never deleted).
    fn list_group(&self, group_id: GroupId) -> DomainResult<Vec<DebtRecord>>;

    /// Atomic read-modify-write of the slot for `key`.
    ///
    /// The closure runs under the key's exclusive serialization; the slot is
    /// `None` when no record exists yet. Lock acquisition is bounded: when
    /// contention exhausts the internal retries this fails with
    /// `DomainError::Conflict` and the closure has not run.
    fn with_slot(
        &self,
        key: &RecordKey,
        op: &mut dyn FnMut(&mut Option<DebtRecord>) -> DomainResult<()>,
    ) -> DomainResult<()>;
}

/// Append-only store of expenses.
pub trait ExpenseStore: Send + Sync {
    /// Allocate the next expense identifier. Each call returns a distinct id.
    fn next_id(&self) -> ExpenseId;

    fn append(&self, expense: Expense) -> DomainResult<()>;

    fn list_group(&self, group_id: GroupId) -> DomainResult<Vec<Expense>>;
}
