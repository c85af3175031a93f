use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tabx_core::DomainError;
use tabx_settlement::SettlementError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn settlement_error_to_response(err: SettlementError) -> axum::response::Response {
    match err {
        SettlementError::Domain(e) => domain_error_to_response(e),
        SettlementError::ExternalLedger(msg) => {
            json_error(StatusCode::BAD_GATEWAY, "external_ledger_error", msg)
        }
        // Neither success nor failure: the caller holds the attempt id and
        // must follow up with a reconcile call.
        SettlementError::ReconciliationPending { attempt } => (
            StatusCode::ACCEPTED,
            axum::Json(json!({
                "error": "reconciliation_pending",
                "message": "settlement outcome unknown; reconcile the attempt",
                "attempt_id": attempt.to_string(),
            })),
        )
            .into_response(),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
