use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tabx_core::GroupId;
use tabx_settlement::AttemptId;

use crate::app::routes::expenses::require_member;
use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub async fn settle(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<u64>,
    Json(body): Json<dto::SettleRequest>,
) -> axum::response::Response {
    let group = match services.roster.get(GroupId::new(id)) {
        Ok(group) => group,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let debtor = match dto::parse_participant(&body.debtor) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let creditor = match dto::parse_participant(&body.creditor) {
        Ok(p) => p,
        Err(res) => return res,
    };
    for participant in [&debtor, &creditor] {
        if let Err(res) = require_member(&group, participant) {
            return res;
        }
    }

    match services
        .coordinator
        .settle(group.id(), &debtor, &creditor, body.amount)
        .await
    {
        Ok(receipt) => (StatusCode::OK, Json(dto::receipt_to_json(&receipt))).into_response(),
        Err(e) => errors::settlement_error_to_response(e),
    }
}

pub async fn get_attempt(
    Extension(services): Extension<Arc<AppServices>>,
    Path(attempt_id): Path<String>,
) -> axum::response::Response {
    let attempt_id: AttemptId = match attempt_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.coordinator.attempt(attempt_id) {
        Some(attempt) => (StatusCode::OK, Json(dto::attempt_to_json(&attempt))).into_response(),
        None => errors::domain_error_to_response(tabx_core::DomainError::not_found()),
    }
}

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(attempt_id): Path<String>,
) -> axum::response::Response {
    let attempt_id: AttemptId = match attempt_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.coordinator.reconcile(attempt_id).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(dto::reconcile_outcome_to_json(&outcome)),
        )
            .into_response(),
        Err(e) => errors::settlement_error_to_response(e),
    }
}

pub async fn reconcile_pending(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let results = services.coordinator.reconcile_pending().await;
    let items: Vec<_> = results
        .into_iter()
        .map(|(id, outcome)| match outcome {
            Ok(outcome) => serde_json::json!({
                "attempt_id": id.to_string(),
                "outcome": dto::reconcile_outcome_to_json(&outcome),
            }),
            Err(e) => serde_json::json!({
                "attempt_id": id.to_string(),
                "error": e.to_string(),
            }),
        })
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
