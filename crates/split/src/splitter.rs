//! Remainder-on-the-last-entry share computation.
//!
//! Both split modes share one remainder-assignment policy: whatever integer
//! division or caller-provided shares leave unaccounted lands on the *last*
//! participant in iteration order. Callers that want a specific recipient of
//! the remainder must place them last; this ordering dependency is part of
//! the contract.

use std::collections::HashSet;

use tabx_core::{Amount, DomainError, DomainResult, Participant};

/// Per-participant shares in caller order.
pub type Shares = Vec<(Participant, Amount)>;

fn ensure_unique<'a, I>(participants: I) -> DomainResult<()>
where
    I: Iterator<Item = &'a Participant>,
{
    let mut seen = HashSet::new();
    for p in participants {
        if !seen.insert(p.as_str()) {
            return Err(DomainError::validation(format!(
                "duplicate participant in split: {p}"
            )));
        }
    }
    Ok(())
}

fn ensure_positive_total(total: Amount) -> DomainResult<()> {
    if total.is_zero() {
        return Err(DomainError::validation("split total must be positive"));
    }
    Ok(())
}

/// Split `total` evenly across `participants`.
///
/// Every participant receives `total div count` except the last, who absorbs
/// the entire remainder, so the shares always sum to `total` exactly.
pub fn split_equal(total: Amount, participants: &[Participant]) -> DomainResult<Shares> {
    ensure_positive_total(total)?;
    if participants.is_empty() {
        return Err(DomainError::validation("split requires at least one participant"));
    }
    ensure_unique(participants.iter())?;

    let count = participants.len() as u128;
    let (base, _) = total.div_rem(count).expect("count is non-zero");

    // base * (count - 1) <= total, so the subtraction cannot underflow.
    let last_share = Amount::from_units(total.units() - base.units() * (count - 1));

    let mut shares = Vec::with_capacity(participants.len());
    for (idx, participant) in participants.iter().enumerate() {
        let share = if idx == participants.len() - 1 { last_share } else { base };
        shares.push((participant.clone(), share));
    }
    Ok(shares)
}

/// Split `total` using caller-provided shares, auto-balancing any difference
/// onto the last entry.
///
/// If the provided shares do not sum to `total`, the last participant's share
/// is adjusted by the difference. The adjustment may reduce the last share but
/// never below zero; an adjustment that would is rejected.
pub fn split_custom(total: Amount, shares: &[(Participant, Amount)]) -> DomainResult<Shares> {
    ensure_positive_total(total)?;
    if shares.is_empty() {
        return Err(DomainError::validation("split requires at least one participant"));
    }
    ensure_unique(shares.iter().map(|(p, _)| p))?;

    let mut sum = Amount::ZERO;
    for (participant, share) in shares {
        sum = sum
            .checked_add(*share)
            .ok_or_else(|| DomainError::validation(format!("share sum overflows at {participant}")))?;
    }

    let mut balanced: Shares = shares.to_vec();
    let last = balanced.last_mut().expect("shares are non-empty");

    if sum < total {
        let surplus = total.checked_sub(sum).expect("sum < total");
        last.1 = last.1.checked_add(surplus).ok_or_else(|| {
            DomainError::validation("adjusted share overflows")
        })?;
    } else if sum > total {
        let deficit = sum.checked_sub(total).expect("sum > total");
        last.1 = last.1.checked_sub(deficit).ok_or_else(|| {
            DomainError::validation(format!(
                "shares exceed total by {deficit}; adjustment would drive {}'s share negative",
                last.0
            ))
        })?;
    }

    Ok(balanced)
}
