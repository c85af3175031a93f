use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tabx_core::{DomainError, GroupId, Participant};
use tabx_registry::Group;
use tabx_split::{split_custom, split_equal};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub async fn record(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<u64>,
    Json(body): Json<dto::RecordExpenseRequest>,
) -> axum::response::Response {
    let group = match services.roster.get(GroupId::new(id)) {
        Ok(group) => group,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let payer = match dto::parse_participant(&body.payer) {
        Ok(p) => p,
        Err(res) => return res,
    };
    if let Err(res) = require_member(&group, &payer) {
        return res;
    }

    let shares = match body.split {
        dto::SplitKind::Equal => {
            let mut participants = Vec::with_capacity(body.participants.len());
            for address in &body.participants {
                let participant = match dto::parse_participant(address) {
                    Ok(p) => p,
                    Err(res) => return res,
                };
                if let Err(res) = require_member(&group, &participant) {
                    return res;
                }
                participants.push(participant);
            }
            split_equal(body.total, &participants)
        }
        dto::SplitKind::Custom => {
            let mut requested = Vec::with_capacity(body.shares.len());
            for entry in &body.shares {
                let participant = match dto::parse_participant(&entry.address) {
                    Ok(p) => p,
                    Err(res) => return res,
                };
                if let Err(res) = require_member(&group, &participant) {
                    return res;
                }
                requested.push((participant, entry.amount));
            }
            split_custom(body.total, &requested)
        }
    };
    let shares = match shares {
        Ok(shares) => shares,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .ledger
        .record_expense(group.id(), body.total, payer, shares)
    {
        Ok(expense) => (StatusCode::CREATED, Json(dto::expense_to_json(&expense))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<u64>,
) -> axum::response::Response {
    let group_id = GroupId::new(id);
    if let Err(e) = services.roster.get(group_id) {
        return errors::domain_error_to_response(e);
    }
    match services.ledger.expenses(group_id) {
        Ok(expenses) => {
            let items: Vec<_> = expenses.iter().map(dto::expense_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub(super) fn require_member(
    group: &Group,
    participant: &Participant,
) -> Result<(), axum::response::Response> {
    if group.is_member(participant) {
        Ok(())
    } else {
        Err(errors::domain_error_to_response(DomainError::validation(
            format!("{participant} is not a member of group {}", group.id()),
        )))
    }
}
