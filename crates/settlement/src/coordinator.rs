//! Settlement coordination: escrow-or-direct routing, confirm-then-record,
//! and reconciliation of ambiguous outcomes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use tabx_core::{Amount, DomainError, GroupId, Participant};
use tabx_ledger::{DebtLedger, PaymentOutcome};

use crate::attempt::{AttemptId, SettlementAttempt, SettlementPath, SettlementState};
use crate::authority::{AuthorityError, TransferAuthority};
use crate::error::SettlementError;

/// Tunables for the coordinator.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// How long to wait for the authority to confirm a transfer before the
    /// attempt is parked as `TimedOut`.
    pub transfer_timeout: Duration,
    /// Reconciliation lookup retries when the authority is unavailable.
    pub reconcile_attempts: u32,
    /// Initial reconciliation backoff; doubles per retry.
    pub reconcile_backoff: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            transfer_timeout: Duration::from_secs(10),
            reconcile_attempts: 5,
            reconcile_backoff: Duration::from_millis(100),
        }
    }
}

/// What a completed settlement did to the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub attempt: AttemptId,
    pub path: SettlementPath,
    /// Amount actually discharged. May be less than requested: the request
    /// is clamped to the outstanding balance before any value moves.
    pub applied: Amount,
    pub remaining: Amount,
    pub settled_now: bool,
}

/// Resolution of a reconciled attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The transfer landed and the ledger now reflects it.
    Applied(SettlementReceipt),
    /// The transfer definitively never happened; the attempt is closed with
    /// the ledger untouched.
    Discarded { attempt: AttemptId },
}

/// Orchestrates settlements against the external transfer authority.
///
/// The ledger is only ever mutated after the authority has confirmed the
/// transfer, and each confirmation is applied at most once. Attempts whose
/// outcome is unknown (timeouts, or confirmed transfers whose ledger write
/// lost a lock race) stay parked until [`SettlementCoordinator::reconcile`]
/// resolves them. Every passage from confirmed to recorded, whether in
/// `settle` or in reconciliation, runs under one gate, so no two actors can
/// apply the same confirmation.
pub struct SettlementCoordinator {
    ledger: Arc<DebtLedger>,
    authority: Arc<dyn TransferAuthority>,
    attempts: RwLock<HashMap<AttemptId, SettlementAttempt>>,
    reconcile_gate: Mutex<()>,
    config: SettlementConfig,
}

impl SettlementCoordinator {
    pub fn new(
        ledger: Arc<DebtLedger>,
        authority: Arc<dyn TransferAuthority>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            ledger,
            authority,
            attempts: RwLock::new(HashMap::new()),
            reconcile_gate: Mutex::new(()),
            config,
        }
    }

    /// Settle up to `amount` of the debt `debtor` owes `creditor` in
    /// `group_id`.
    ///
    /// Routing: if the debtor's pre-funded balance with the authority covers
    /// the amount, the transfer is funded from escrow; otherwise a direct
    /// transfer is issued. Either way the ledger is only discharged once the
    /// authority confirms.
    ///
    /// A timeout returns [`SettlementError::ReconciliationPending`]; the
    /// attempt is retained and must be resolved via [`Self::reconcile`].
    pub async fn settle(
        &self,
        group_id: GroupId,
        debtor: &Participant,
        creditor: &Participant,
        amount: Amount,
    ) -> Result<SettlementReceipt, SettlementError> {
        if amount.is_zero() {
            return Err(DomainError::validation("settlement amount must be positive").into());
        }
        let outstanding = match self.ledger.find(group_id, debtor, creditor)? {
            None => return Err(DomainError::not_found().into()),
            Some(record) if record.settled() => return Err(DomainError::not_found().into()),
            Some(record) => record.outstanding(),
        };
        // Clamp before any value moves: transferring more than is owed and
        // clamping afterwards would strand the excess at the authority.
        let amount_to_apply = amount.min(outstanding);
        if amount_to_apply < amount {
            warn!(
                group_id = %group_id,
                debtor = %debtor,
                creditor = %creditor,
                requested = %amount,
                clamped = %amount_to_apply,
                "settlement request exceeds outstanding balance"
            );
        }

        let attempt = SettlementAttempt::new(
            group_id,
            debtor.clone(),
            creditor.clone(),
            amount,
            amount_to_apply,
        );
        let attempt_id = attempt.id;
        let reference = attempt.reference;
        self.attempts
            .write()
            .expect("attempts lock")
            .insert(attempt_id, attempt);

        let balance = match self.authority.prefunded_balance(group_id, debtor).await {
            Ok(balance) => balance,
            Err(e) => {
                // No transfer was issued, so failing here is definitive.
                self.transition(attempt_id, SettlementState::TransferFailed);
                return Err(SettlementError::ExternalLedger(e.to_string()));
            }
        };
        let path = if balance >= amount_to_apply {
            SettlementPath::Escrow
        } else {
            SettlementPath::Direct
        };
        self.set_path(attempt_id, path);
        info!(
            attempt = %attempt_id,
            path = %path,
            amount = %amount_to_apply,
            prefunded = %balance,
            "settlement transfer starting"
        );

        self.transition(attempt_id, SettlementState::TransferPending);
        let transfer = match path {
            SettlementPath::Escrow => self
                .authority
                .transfer_from_escrow(reference, group_id, debtor, creditor, amount_to_apply),
            SettlementPath::Direct => self
                .authority
                .transfer_direct(reference, debtor, creditor, amount_to_apply),
        };
        let confirmed = match timeout(self.config.transfer_timeout, transfer).await {
            Err(_) => {
                self.transition(attempt_id, SettlementState::TimedOut);
                warn!(attempt = %attempt_id, "transfer timed out, parked for reconciliation");
                return Err(SettlementError::ReconciliationPending {
                    attempt: attempt_id,
                });
            }
            Ok(Err(AuthorityError::Unavailable(reason))) => {
                // The instruction may or may not have been received; treat
                // like a timeout and let reconciliation find out.
                self.transition(attempt_id, SettlementState::TimedOut);
                warn!(attempt = %attempt_id, %reason, "authority unreachable, parked for reconciliation");
                return Err(SettlementError::ReconciliationPending {
                    attempt: attempt_id,
                });
            }
            Ok(Err(e)) => {
                self.transition(attempt_id, SettlementState::TransferFailed);
                warn!(attempt = %attempt_id, error = %e, "transfer failed, ledger untouched");
                return Err(SettlementError::ExternalLedger(e.to_string()));
            }
            Ok(Ok(confirmation)) => confirmation,
        };

        // The sweep selects `TransferConfirmed` attempts, so the transition
        // and the ledger write must be one atomic step under the gate or a
        // concurrent sweep could apply the same confirmation twice.
        let _gate = self.reconcile_gate.lock().await;
        self.transition(attempt_id, SettlementState::TransferConfirmed);
        self.apply_confirmed(attempt_id, confirmed.amount)
    }

    /// Resolve one parked attempt. Idempotent: an already-applied attempt
    /// returns its original receipt, a discarded one reports `Discarded`.
    pub async fn reconcile(
        &self,
        attempt_id: AttemptId,
    ) -> Result<ReconcileOutcome, SettlementError> {
        let _gate = self.reconcile_gate.lock().await;

        let snapshot = self
            .attempt(attempt_id)
            .ok_or_else(DomainError::not_found)?;

        match snapshot.state {
            SettlementState::LedgerUpdated => {
                let outcome = snapshot.outcome.expect("resolved attempt has outcome");
                Ok(ReconcileOutcome::Applied(
                    self.receipt(&snapshot, outcome),
                ))
            }
            SettlementState::TransferFailed => {
                Ok(ReconcileOutcome::Discarded { attempt: attempt_id })
            }
            SettlementState::TransferConfirmed => {
                // Confirmed earlier but the ledger write lost a lock race.
                let receipt = self.apply_confirmed(attempt_id, snapshot.amount_to_apply)?;
                Ok(ReconcileOutcome::Applied(receipt))
            }
            SettlementState::TimedOut => self.resolve_timed_out(&snapshot).await,
            SettlementState::Requested | SettlementState::TransferPending => {
                // Still in flight on the original task.
                Err(SettlementError::ReconciliationPending {
                    attempt: attempt_id,
                })
            }
        }
    }

    /// Reconcile every attempt currently awaiting resolution.
    pub async fn reconcile_pending(
        &self,
    ) -> Vec<(AttemptId, Result<ReconcileOutcome, SettlementError>)> {
        let pending: Vec<AttemptId> = {
            let attempts = self.attempts.read().expect("attempts lock");
            let mut ids: Vec<_> = attempts
                .values()
                .filter(|a| {
                    matches!(
                        a.state,
                        SettlementState::TimedOut | SettlementState::TransferConfirmed
                    )
                })
                .map(|a| a.id)
                .collect();
            ids.sort();
            ids
        };

        let mut results = Vec::with_capacity(pending.len());
        for id in pending {
            let outcome = self.reconcile(id).await;
            results.push((id, outcome));
        }
        results
    }

    /// Snapshot of one attempt.
    pub fn attempt(&self, attempt_id: AttemptId) -> Option<SettlementAttempt> {
        self.attempts
            .read()
            .expect("attempts lock")
            .get(&attempt_id)
            .cloned()
    }

    /// Drop resolved attempts last touched more than `older_than` ago and
    /// return how many were dropped. Unresolved attempts are always
    /// retained: they still need reconciliation. Intended to be called
    /// periodically so a long-lived process does not accumulate attempts
    /// without bound.
    pub fn prune_resolved(&self, older_than: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - older_than;
        let mut attempts = self.attempts.write().expect("attempts lock");
        let before = attempts.len();
        attempts.retain(|_, a| !a.state.is_resolved() || a.updated_at > cutoff);
        let pruned = before - attempts.len();
        if pruned > 0 {
            info!(pruned, retained = attempts.len(), "resolved attempts pruned");
        }
        pruned
    }

    /// Ask the authority what a timed-out transfer actually did, retrying
    /// unavailability with bounded exponential backoff.
    async fn resolve_timed_out(
        &self,
        snapshot: &SettlementAttempt,
    ) -> Result<ReconcileOutcome, SettlementError> {
        for attempt in 0..self.config.reconcile_attempts {
            match self.authority.lookup_transfer(snapshot.reference).await {
                Ok(Some(confirmation)) => {
                    info!(
                        attempt = %snapshot.id,
                        reference = %snapshot.reference,
                        "timed-out transfer landed, applying"
                    );
                    self.transition(snapshot.id, SettlementState::TransferConfirmed);
                    let receipt = self.apply_confirmed(snapshot.id, confirmation.amount)?;
                    return Ok(ReconcileOutcome::Applied(receipt));
                }
                Ok(None) => {
                    info!(
                        attempt = %snapshot.id,
                        reference = %snapshot.reference,
                        "timed-out transfer never landed, discarding"
                    );
                    self.transition(snapshot.id, SettlementState::TransferFailed);
                    return Ok(ReconcileOutcome::Discarded {
                        attempt: snapshot.id,
                    });
                }
                Err(AuthorityError::Unavailable(reason)) => {
                    let backoff = self.config.reconcile_backoff * (1u32 << attempt);
                    warn!(
                        attempt = %snapshot.id,
                        %reason,
                        retry_in_ms = backoff.as_millis() as u64,
                        "authority unavailable during reconciliation"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e @ (AuthorityError::Rejected(_) | AuthorityError::Reverted(_))) => {
                    info!(attempt = %snapshot.id, error = %e, "transfer definitively failed, discarding");
                    self.transition(snapshot.id, SettlementState::TransferFailed);
                    return Ok(ReconcileOutcome::Discarded {
                        attempt: snapshot.id,
                    });
                }
            }
        }
        // Still unknown; the attempt stays `TimedOut` for the next pass.
        Err(SettlementError::ReconciliationPending {
            attempt: snapshot.id,
        })
    }

    /// Record a confirmed transfer in the ledger and resolve the attempt.
    fn apply_confirmed(
        &self,
        attempt_id: AttemptId,
        amount: Amount,
    ) -> Result<SettlementReceipt, SettlementError> {
        let snapshot = self
            .attempt(attempt_id)
            .ok_or_else(DomainError::not_found)?;

        let outcome = match self.ledger.apply_payment(
            snapshot.group_id,
            &snapshot.debtor,
            &snapshot.creditor,
            amount,
        ) {
            Ok(outcome) => outcome,
            Err(DomainError::NotFound) => {
                // The record settled through another channel after the
                // transfer was confirmed. The value moved; record a zero
                // application rather than pretending the attempt failed.
                warn!(
                    attempt = %attempt_id,
                    "debt settled elsewhere before confirmed transfer was recorded"
                );
                PaymentOutcome {
                    applied: Amount::ZERO,
                    remaining: Amount::ZERO,
                    settled_now: false,
                }
            }
            Err(e) => {
                // Lock contention or similar: the confirmation stands, only
                // the ledger write is deferred to reconciliation.
                warn!(attempt = %attempt_id, error = %e, "confirmed transfer parked, ledger write deferred");
                return Err(SettlementError::ReconciliationPending {
                    attempt: attempt_id,
                });
            }
        };

        self.resolve(attempt_id, outcome);
        info!(
            attempt = %attempt_id,
            applied = %outcome.applied,
            remaining = %outcome.remaining,
            settled_now = outcome.settled_now,
            "settlement recorded"
        );
        Ok(self.receipt(&snapshot, outcome))
    }

    fn receipt(&self, attempt: &SettlementAttempt, outcome: PaymentOutcome) -> SettlementReceipt {
        SettlementReceipt {
            attempt: attempt.id,
            path: attempt.path.unwrap_or(SettlementPath::Direct),
            applied: outcome.applied,
            remaining: outcome.remaining,
            settled_now: outcome.settled_now,
        }
    }

    fn set_path(&self, attempt_id: AttemptId, path: SettlementPath) {
        let mut attempts = self.attempts.write().expect("attempts lock");
        if let Some(attempt) = attempts.get_mut(&attempt_id) {
            attempt.path = Some(path);
            attempt.updated_at = chrono::Utc::now();
        }
    }

    fn transition(&self, attempt_id: AttemptId, to: SettlementState) {
        let mut attempts = self.attempts.write().expect("attempts lock");
        if let Some(attempt) = attempts.get_mut(&attempt_id) {
            debug_assert!(
                attempt.state.can_transition_to(to),
                "illegal transition {:?} -> {:?}",
                attempt.state,
                to
            );
            attempt.state = to;
            attempt.updated_at = chrono::Utc::now();
        }
    }

    fn resolve(&self, attempt_id: AttemptId, outcome: PaymentOutcome) {
        let mut attempts = self.attempts.write().expect("attempts lock");
        if let Some(attempt) = attempts.get_mut(&attempt_id) {
            debug_assert!(
                attempt
                    .state
                    .can_transition_to(SettlementState::LedgerUpdated),
                "illegal transition {:?} -> LedgerUpdated",
                attempt.state
            );
            attempt.state = SettlementState::LedgerUpdated;
            attempt.outcome = Some(outcome);
            attempt.updated_at = chrono::Utc::now();
        }
    }
}
