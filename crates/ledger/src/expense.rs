//! Expenses: the immutable source of recorded debts.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use tabx_core::{Amount, DomainError, DomainResult, ExpenseId, GroupId, Participant};

/// A split expense. Immutable after construction; corrections are modeled
/// as new expenses, never as mutation of an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    group_id: GroupId,
    total: Amount,
    payer: Participant,
    shares: Vec<(Participant, Amount)>,
    recorded_at: DateTime<Utc>,
}

impl Expense {
    /// Build an expense, enforcing the exact-sum invariant: the shares must
    /// sum to `total` precisely, cover a non-empty unique participant set,
    /// and `total` must be positive.
    pub fn new(
        id: ExpenseId,
        group_id: GroupId,
        total: Amount,
        payer: Participant,
        shares: Vec<(Participant, Amount)>,
        recorded_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if total.is_zero() {
            return Err(DomainError::validation("expense total must be positive"));
        }
        if shares.is_empty() {
            return Err(DomainError::validation("expense must have participants"));
        }

        let mut seen = HashSet::new();
        let mut sum = Amount::ZERO;
        for (participant, share) in &shares {
            if !seen.insert(participant.as_str()) {
                return Err(DomainError::validation(format!(
                    "duplicate participant in expense: {participant}"
                )));
            }
            sum = sum
                .checked_add(*share)
                .ok_or_else(|| DomainError::validation("expense share sum overflows"))?;
        }
        if sum != total {
            return Err(DomainError::validation(format!(
                "expense shares sum to {sum}, expected {total}"
            )));
        }

        Ok(Self {
            id,
            group_id,
            total,
            payer,
            shares,
            recorded_at,
        })
    }

    pub fn id(&self) -> ExpenseId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn total(&self) -> Amount {
        self.total
    }

    pub fn payer(&self) -> &Participant {
        &self.payer
    }

    /// Ordered participant → share mapping (same order the split produced).
    pub fn shares(&self) -> &[(Participant, Amount)] {
        &self.shares
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.shares.iter().map(|(p, _)| p)
    }

    pub fn share_of(&self, participant: &Participant) -> Option<Amount> {
        self.shares
            .iter()
            .find(|(p, _)| p == participant)
            .map(|(_, a)| *a)
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
