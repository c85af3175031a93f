//! Service wiring shared by every handler.

use std::sync::Arc;

use tabx_ledger::{DebtLedger, InMemoryLedgerStore};
use tabx_registry::{GroupRoster, InMemoryDirectory, InMemoryRoster, ParticipantDirectory};
use tabx_settlement::{SettlementConfig, SettlementCoordinator, TransferAuthority};

pub struct AppServices {
    pub directory: Arc<dyn ParticipantDirectory>,
    pub roster: Arc<dyn GroupRoster>,
    pub ledger: Arc<DebtLedger>,
    pub coordinator: SettlementCoordinator,
}

/// Wire the in-process stack around the given transfer authority.
pub fn build_services(authority: Arc<dyn TransferAuthority>, config: SettlementConfig) -> AppServices {
    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = Arc::new(DebtLedger::new(store.clone(), store));
    let coordinator = SettlementCoordinator::new(ledger.clone(), authority, config);

    AppServices {
        directory: Arc::new(InMemoryDirectory::new()),
        roster: Arc::new(InMemoryRoster::new()),
        ledger,
        coordinator,
    }
}
