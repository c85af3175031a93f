//! In-memory store.
//!
//! Intended for tests/dev. Per-key serialization comes from one mutex per
//! record slot; the outer map lock is held only long enough to find or
//! insert a slot, so slow work on one key never blocks another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::Duration;

use tabx_core::{DomainError, DomainResult, ExpenseId, GroupId};

use crate::expense::Expense;
use crate::record::{DebtRecord, RecordKey};
use crate::store::{DebtStore, ExpenseStore};

type Slot = Arc<Mutex<Option<DebtRecord>>>;

/// How many times a writer retries a contended slot before surfacing a
/// conflict, and the base backoff doubled on each retry.
const LOCK_ATTEMPTS: u32 = 5;
const LOCK_BACKOFF: Duration = Duration::from_millis(1);

#[derive(Default)]
pub struct InMemoryLedgerStore {
    slots: RwLock<HashMap<RecordKey, Slot>>,
    expenses: RwLock<Vec<Expense>>,
    next_expense: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &RecordKey) -> DomainResult<Slot> {
        {
            let slots = self
                .slots
                .read()
                .map_err(|_| DomainError::conflict("debt map lock poisoned"))?;
            if let Some(slot) = slots.get(key) {
                return Ok(Arc::clone(slot));
            }
        }
        let mut slots = self
            .slots
            .write()
            .map_err(|_| DomainError::conflict("debt map lock poisoned"))?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    fn lock_slot(slot: &Slot) -> DomainResult<std::sync::MutexGuard<'_, Option<DebtRecord>>> {
        for attempt in 0..LOCK_ATTEMPTS {
            match slot.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(DomainError::conflict("record lock poisoned"));
                }
                Err(TryLockError::WouldBlock) => {
                    std::thread::sleep(LOCK_BACKOFF * (1u32 << attempt));
                }
            }
        }
        Err(DomainError::conflict(
            "record lock contention exhausted retries",
        ))
    }
}

impl DebtStore for InMemoryLedgerStore {
    fn get(&self, key: &RecordKey) -> DomainResult<Option<DebtRecord>> {
        let slot = {
            let slots = self
                .slots
                .read()
                .map_err(|_| DomainError::conflict("debt map lock poisoned"))?;
            match slots.get(key) {
                Some(slot) => Arc::clone(slot),
                None => return Ok(None),
            }
        };
        // Clone under the slot lock: outstanding/settled are never torn.
        let guard = Self::lock_slot(&slot)?;
        Ok(guard.clone())
    }

    fn list_group(&self, group_id: GroupId) -> DomainResult<Vec<DebtRecord>> {
        let slots: Vec<Slot> = {
            let map = self
                .slots
                .read()
                .map_err(|_| DomainError::conflict("debt map lock poisoned"))?;
            map.iter()
                .filter(|(key, _)| key.group_id == group_id)
                .map(|(_, slot)| Arc::clone(slot))
                .collect()
        };

        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            let guard = Self::lock_slot(&slot)?;
            if let Some(record) = guard.as_ref() {
                records.push(record.clone());
            }
        }
        // HashMap iteration order is arbitrary; projections are deterministic.
        records.sort_by(|a, b| {
            (a.debtor(), a.creditor()).cmp(&(b.debtor(), b.creditor()))
        });
        Ok(records)
    }

    fn with_slot(
        &self,
        key: &RecordKey,
        op: &mut dyn FnMut(&mut Option<DebtRecord>) -> DomainResult<()>,
    ) -> DomainResult<()> {
        let slot = self.slot(key)?;
        let mut guard = Self::lock_slot(&slot)?;
        op(&mut guard)
    }
}

impl ExpenseStore for InMemoryLedgerStore {
    fn next_id(&self) -> ExpenseId {
        ExpenseId::new(self.next_expense.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn append(&self, expense: Expense) -> DomainResult<()> {
        self.expenses
            .write()
            .map_err(|_| DomainError::conflict("expense log lock poisoned"))?
            .push(expense);
        Ok(())
    }

    fn list_group(&self, group_id: GroupId) -> DomainResult<Vec<Expense>> {
        Ok(self
            .expenses
            .read()
            .map_err(|_| DomainError::conflict("expense log lock poisoned"))?
            .iter()
            .filter(|e| e.group_id() == group_id)
            .cloned()
            .collect())
    }
}
