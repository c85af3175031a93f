//! The debt ledger: the single authoritative owner of debt records.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use tabx_core::{Amount, DomainError, DomainResult, GroupId, Participant};

use crate::expense::Expense;
use crate::record::{DebtRecord, PaymentOutcome, RecordKey};
use crate::store::{DebtStore, ExpenseStore};

/// Filter for outstanding-debt projections.
#[derive(Debug, Clone, Default)]
pub struct DebtFilter {
    pub debtor: Option<Participant>,
    pub creditor: Option<Participant>,
    /// Include fully settled records (the audit view). Off by default: the
    /// projection answers "who still owes whom".
    pub include_settled: bool,
}

/// The mutable ledger of pairwise debts.
///
/// Record mutation happens exclusively here, always inside the store's
/// per-key atomic read-modify-write, so concurrent callers on the same
/// `(group, debtor, creditor)` key are serialized while distinct keys
/// proceed in parallel.
pub struct DebtLedger {
    debts: Arc<dyn DebtStore>,
    expenses: Arc<dyn ExpenseStore>,
}

impl DebtLedger {
    pub fn new(debts: Arc<dyn DebtStore>, expenses: Arc<dyn ExpenseStore>) -> Self {
        Self { debts, expenses }
    }

    /// Store a validated expense and record one debt per non-payer
    /// participant with a non-zero share. The payer's own share represents
    /// money they owe themselves and produces no record.
    pub fn record_expense(
        &self,
        group_id: GroupId,
        total: Amount,
        payer: Participant,
        shares: Vec<(Participant, Amount)>,
    ) -> DomainResult<Expense> {
        let expense = Expense::new(
            self.expenses.next_id(),
            group_id,
            total,
            payer.clone(),
            shares,
            Utc::now(),
        )?;
        self.expenses.append(expense.clone())?;

        info!(
            expense_id = %expense.id(),
            group_id = %group_id,
            payer = %payer,
            total = %total,
            participants = expense.shares().len(),
            "expense recorded"
        );

        for (participant, share) in expense.shares() {
            if participant == &payer || share.is_zero() {
                continue;
            }
            self.record_debt(group_id, participant.clone(), payer.clone(), *share)?;
        }

        Ok(expense)
    }

    /// Record a debt of `amount` from `debtor` to `creditor`.
    ///
    /// Creates the record if none exists for the key; otherwise accumulates
    /// into the existing record, reopening it if it was settled. Records are
    /// never deleted, so a fresh debt between the same pair continues the
    /// same record.
    pub fn record_debt(
        &self,
        group_id: GroupId,
        debtor: Participant,
        creditor: Participant,
        amount: Amount,
    ) -> DomainResult<DebtRecord> {
        if debtor == creditor {
            return Err(DomainError::validation(format!(
                "debtor and creditor must differ: {debtor}"
            )));
        }
        if amount.is_zero() {
            return Err(DomainError::validation("debt amount must be positive"));
        }

        let key = RecordKey::new(group_id, debtor, creditor);
        let mut recorded: Option<DebtRecord> = None;
        self.debts.with_slot(&key, &mut |slot| {
            let now = Utc::now();
            match slot {
                Some(record) => {
                    record
                        .accumulate(amount, now)
                        .ok_or_else(|| DomainError::validation("outstanding amount overflows"))?;
                    recorded = Some(record.clone());
                }
                None => {
                    let record = DebtRecord::open(&key, amount, now);
                    recorded = Some(record.clone());
                    *slot = Some(record);
                }
            }
            Ok(())
        })?;

        let record = recorded.expect("slot closure ran");
        info!(
            group_id = %group_id,
            debtor = %record.debtor(),
            creditor = %record.creditor(),
            amount = %amount,
            outstanding = %record.outstanding(),
            "debt recorded"
        );
        Ok(record)
    }

    /// Snapshot of one record, settled or not.
    pub fn find(
        &self,
        group_id: GroupId,
        debtor: &Participant,
        creditor: &Participant,
    ) -> DomainResult<Option<DebtRecord>> {
        let key = RecordKey::new(group_id, debtor.clone(), creditor.clone());
        self.debts.get(&key)
    }

    /// Read-only projection of a group's debts. No side effects.
    pub fn get_outstanding(
        &self,
        group_id: GroupId,
        filter: &DebtFilter,
    ) -> DomainResult<Vec<DebtRecord>> {
        let records = self.debts.list_group(group_id)?;
        Ok(records
            .into_iter()
            .filter(|r| filter.include_settled || !r.settled())
            .filter(|r| filter.debtor.as_ref().is_none_or(|d| r.debtor() == d))
            .filter(|r| filter.creditor.as_ref().is_none_or(|c| r.creditor() == c))
            .collect())
    }

    /// Discharge up to `amount` of the record for the key.
    ///
    /// Fails with `NotFound` when no unsettled record exists. The applied
    /// amount is clamped to the outstanding balance; a zero application is
    /// a strict no-op (no timestamp bump). The clamp re-reads the record
    /// under the key's serialization, so two racing payments can never both
    /// observe the pre-payment balance; the loser applies against whatever
    /// the winner left, possibly zero.
    pub fn apply_payment(
        &self,
        group_id: GroupId,
        debtor: &Participant,
        creditor: &Participant,
        amount: Amount,
    ) -> DomainResult<PaymentOutcome> {
        // Snapshot validation: absent or already-settled keys are not
        // payable. A record that settles between here and the locked
        // section below is handled by the clamp, not by an error.
        match self.find(group_id, debtor, creditor)? {
            None => return Err(DomainError::not_found()),
            Some(record) if record.settled() => return Err(DomainError::not_found()),
            Some(_) => {}
        }

        let key = RecordKey::new(group_id, debtor.clone(), creditor.clone());
        let mut outcome: Option<PaymentOutcome> = None;
        self.debts.with_slot(&key, &mut |slot| {
            let record = slot.as_mut().ok_or_else(DomainError::not_found)?;

            let applied = amount.min(record.outstanding());
            if !applied.is_zero() {
                record.discharge(applied, Utc::now());
            }
            outcome = Some(PaymentOutcome {
                applied,
                remaining: record.outstanding(),
                settled_now: !applied.is_zero() && record.settled(),
            });
            Ok(())
        })?;

        let outcome = outcome.expect("slot closure ran");
        if outcome.applied < amount {
            warn!(
                group_id = %group_id,
                debtor = %debtor,
                creditor = %creditor,
                requested = %amount,
                applied = %outcome.applied,
                "payment clamped to outstanding balance"
            );
        }
        info!(
            group_id = %group_id,
            debtor = %debtor,
            creditor = %creditor,
            applied = %outcome.applied,
            remaining = %outcome.remaining,
            settled_now = outcome.settled_now,
            "payment applied"
        );
        Ok(outcome)
    }

    /// Expenses recorded for a group, in recording order.
    pub fn expenses(&self, group_id: GroupId) -> DomainResult<Vec<Expense>> {
        self.expenses.list_group(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryLedgerStore;

    fn ledger() -> DebtLedger {
        let store = Arc::new(InMemoryLedgerStore::new());
        DebtLedger::new(store.clone(), store)
    }

    fn p(handle: &str) -> Participant {
        Participant::new(handle).unwrap()
    }

    fn units(n: u128) -> Amount {
        Amount::from_units(n)
    }

    const G: GroupId = GroupId::new(1);

    #[test]
    fn record_debt_creates_then_accumulates() {
        let ledger = ledger();
        let first = ledger.record_debt(G, p("a"), p("b"), units(40)).unwrap();
        assert_eq!(first.outstanding(), units(40));

        let second = ledger.record_debt(G, p("a"), p("b"), units(35)).unwrap();
        assert_eq!(second.outstanding(), units(75));

        // One record per pair, not two.
        let records = ledger.get_outstanding(G, &DebtFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn record_debt_rejects_self_debt_and_zero() {
        let ledger = ledger();
        assert!(matches!(
            ledger.record_debt(G, p("a"), p("a"), units(10)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            ledger.record_debt(G, p("a"), p("b"), Amount::ZERO),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn overpayment_is_clamped_and_reported() {
        let ledger = ledger();
        ledger.record_debt(G, p("a"), p("b"), units(75)).unwrap();

        let outcome = ledger.apply_payment(G, &p("a"), &p("b"), units(100)).unwrap();
        assert_eq!(outcome.applied, units(75));
        assert_eq!(outcome.remaining, Amount::ZERO);
        assert!(outcome.settled_now);
    }

    #[test]
    fn zero_payment_is_a_strict_no_op() {
        let ledger = ledger();
        ledger.record_debt(G, p("a"), p("b"), units(50)).unwrap();
        let before = ledger.find(G, &p("a"), &p("b")).unwrap().unwrap();

        let outcome = ledger.apply_payment(G, &p("a"), &p("b"), Amount::ZERO).unwrap();
        assert_eq!(outcome.applied, Amount::ZERO);
        assert!(!outcome.settled_now);

        let after = ledger.find(G, &p("a"), &p("b")).unwrap().unwrap();
        assert_eq!(after.last_updated(), before.last_updated());
        assert!(!after.settled());
    }

    #[test]
    fn payment_on_unknown_key_is_not_found() {
        let ledger = ledger();
        assert_eq!(
            ledger.apply_payment(G, &p("x"), &p("y"), units(10)).unwrap_err(),
            DomainError::NotFound
        );
    }

    #[test]
    fn payment_on_settled_record_is_not_found() {
        let ledger = ledger();
        ledger.record_debt(G, p("a"), p("b"), units(10)).unwrap();
        ledger.apply_payment(G, &p("a"), &p("b"), units(10)).unwrap();

        assert_eq!(
            ledger.apply_payment(G, &p("a"), &p("b"), units(1)).unwrap_err(),
            DomainError::NotFound
        );
    }

    #[test]
    fn settled_record_survives_as_audit_trail_and_reopens() {
        let ledger = ledger();
        ledger.record_debt(G, p("a"), p("b"), units(10)).unwrap();
        ledger.apply_payment(G, &p("a"), &p("b"), units(10)).unwrap();

        assert!(ledger.get_outstanding(G, &DebtFilter::default()).unwrap().is_empty());
        let audit = ledger
            .get_outstanding(
                G,
                &DebtFilter {
                    include_settled: true,
                    ..DebtFilter::default()
                },
            )
            .unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].outstanding(), Amount::ZERO);

        // A fresh debt between the same pair reopens the same record.
        let reopened = ledger.record_debt(G, p("a"), p("b"), units(5)).unwrap();
        assert_eq!(reopened.outstanding(), units(5));
        assert!(!reopened.settled());
    }

    #[test]
    fn outstanding_projection_filters_by_party() {
        let ledger = ledger();
        ledger.record_debt(G, p("a"), p("x"), units(10)).unwrap();
        ledger.record_debt(G, p("b"), p("x"), units(20)).unwrap();
        ledger.record_debt(G, p("a"), p("y"), units(30)).unwrap();

        let owed_to_x = ledger
            .get_outstanding(
                G,
                &DebtFilter {
                    creditor: Some(p("x")),
                    ..DebtFilter::default()
                },
            )
            .unwrap();
        assert_eq!(owed_to_x.len(), 2);

        let a_owes = ledger
            .get_outstanding(
                G,
                &DebtFilter {
                    debtor: Some(p("a")),
                    ..DebtFilter::default()
                },
            )
            .unwrap();
        assert_eq!(a_owes.len(), 2);
    }

    #[test]
    fn record_expense_creates_debts_for_non_payers_only() {
        let ledger = ledger();
        let shares = vec![
            (p("payer"), units(34)),
            (p("a"), units(33)),
            (p("b"), units(33)),
        ];
        let expense = ledger
            .record_expense(G, units(100), p("payer"), shares)
            .unwrap();
        assert_eq!(expense.total(), units(100));

        let records = ledger.get_outstanding(G, &DebtFilter::default()).unwrap();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.creditor(), &p("payer"));
            assert_eq!(record.outstanding(), units(33));
        }

        assert_eq!(ledger.expenses(G).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_payments_never_double_apply() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = Arc::new(DebtLedger::new(store.clone(), store));
        ledger.record_debt(G, p("a"), p("b"), units(50)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                ledger.apply_payment(G, &p("a"), &p("b"), units(50))
            }));
        }

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Both callers passed the pre-lock validation or one saw the record
        // already settled; either way the total applied never exceeds the
        // original outstanding and exactly one payment settles the record.
        let mut total_applied = Amount::ZERO;
        let mut settled_count = 0;
        let mut not_found = 0;
        for outcome in outcomes {
            match outcome {
                Ok(o) => {
                    total_applied = total_applied.checked_add(o.applied).unwrap();
                    if o.settled_now {
                        settled_count += 1;
                    }
                }
                Err(DomainError::NotFound) => not_found += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(total_applied, units(50));
        assert_eq!(settled_count, 1);
        assert!(not_found <= 1);

        let record = ledger.find(G, &p("a"), &p("b")).unwrap().unwrap();
        assert!(record.settled());
        assert_eq!(record.outstanding(), Amount::ZERO);
    }
}
