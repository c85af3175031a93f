//! Request/response DTOs and JSON mapping helpers.
//!
//! Amounts cross the wire as decimal strings of indivisible units; JSON
//! numbers cannot carry the full range.

use serde::Deserialize;
use serde_json::json;

use tabx_core::{Amount, Participant};
use tabx_ledger::{DebtRecord, Expense};
use tabx_registry::{Group, Registration};
use tabx_settlement::{ReconcileOutcome, SettlementReceipt};

use crate::app::errors;

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub address: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub address: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Equal,
    Custom,
}

/// One requested share in a custom split. Order matters: the last entry
/// absorbs any rounding adjustment.
#[derive(Debug, Deserialize)]
pub struct ShareEntry {
    pub address: String,
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct RecordExpenseRequest {
    pub total: Amount,
    pub payer: String,
    pub split: SplitKind,
    /// Participants for an equal split, in share order.
    #[serde(default)]
    pub participants: Vec<String>,
    /// Requested shares for a custom split, in share order.
    #[serde(default)]
    pub shares: Vec<ShareEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DebtQuery {
    pub debtor: Option<String>,
    pub creditor: Option<String>,
    #[serde(default)]
    pub include_settled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub debtor: String,
    pub creditor: String,
    pub amount: Amount,
}

pub fn parse_participant(address: &str) -> Result<Participant, axum::response::Response> {
    Participant::new(address).map_err(errors::domain_error_to_response)
}

pub fn registration_to_json(r: &Registration) -> serde_json::Value {
    json!({
        "address": r.participant,
        "username": r.display_name,
        "registered_at": r.registered_at,
    })
}

pub fn group_to_json(g: &Group) -> serde_json::Value {
    json!({
        "id": g.id().value(),
        "name": g.name(),
        "owner": g.owner(),
        "members": g.members(),
        "created_at": g.created_at(),
    })
}

pub fn expense_to_json(e: &Expense) -> serde_json::Value {
    json!({
        "id": e.id().value(),
        "group_id": e.group_id().value(),
        "total": e.total(),
        "payer": e.payer(),
        "shares": e
            .shares()
            .iter()
            .map(|(p, amount)| json!({"address": p, "amount": amount}))
            .collect::<Vec<_>>(),
        "recorded_at": e.recorded_at(),
    })
}

/// Ledger rows carry identifiers only; display names are joined on here.
pub fn debt_to_json(
    record: &DebtRecord,
    debtor_name: Option<String>,
    creditor_name: Option<String>,
) -> serde_json::Value {
    json!({
        "group_id": record.group_id().value(),
        "debtor": record.debtor(),
        "debtor_name": debtor_name,
        "creditor": record.creditor(),
        "creditor_name": creditor_name,
        "outstanding": record.outstanding(),
        "settled": record.settled(),
        "last_updated": record.last_updated(),
    })
}

pub fn attempt_to_json(a: &tabx_settlement::SettlementAttempt) -> serde_json::Value {
    json!({
        "id": a.id.to_string(),
        "group_id": a.group_id.value(),
        "debtor": a.debtor,
        "creditor": a.creditor,
        "requested": a.requested,
        "amount_to_apply": a.amount_to_apply,
        "path": a.path,
        "reference": a.reference.to_string(),
        "state": a.state,
        "created_at": a.created_at,
        "updated_at": a.updated_at,
    })
}

pub fn receipt_to_json(r: &SettlementReceipt) -> serde_json::Value {
    json!({
        "attempt_id": r.attempt.to_string(),
        "path": r.path,
        "applied": r.applied,
        "remaining": r.remaining,
        "settled_now": r.settled_now,
    })
}

pub fn reconcile_outcome_to_json(outcome: &ReconcileOutcome) -> serde_json::Value {
    match outcome {
        ReconcileOutcome::Applied(receipt) => json!({
            "resolution": "applied",
            "receipt": receipt_to_json(receipt),
        }),
        ReconcileOutcome::Discarded { attempt } => json!({
            "resolution": "discarded",
            "attempt_id": attempt.to_string(),
        }),
    }
}
