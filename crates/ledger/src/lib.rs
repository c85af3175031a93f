//! `tabx-ledger` — the authoritative mutable ledger of pairwise debts.
//!
//! One record per `(group, debtor, creditor)` key; debts between the same
//! pair accumulate rather than forking parallel records, and fully settled
//! records are kept with zero outstanding as an audit trail. All mutation
//! flows through [`DebtLedger`]; no other component holds a mutable
//! reference to a record.

pub mod expense;
pub mod in_memory;
pub mod ledger;
pub mod record;
pub mod store;

pub use expense::Expense;
pub use in_memory::InMemoryLedgerStore;
pub use ledger::{DebtFilter, DebtLedger};
pub use record::{DebtRecord, PaymentOutcome, RecordKey};
pub use store::{DebtStore, ExpenseStore};
