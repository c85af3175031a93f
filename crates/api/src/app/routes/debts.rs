use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tabx_core::GroupId;
use tabx_ledger::DebtFilter;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<u64>,
    Query(query): Query<dto::DebtQuery>,
) -> axum::response::Response {
    let group_id = GroupId::new(id);
    if let Err(e) = services.roster.get(group_id) {
        return errors::domain_error_to_response(e);
    }

    let mut filter = DebtFilter {
        include_settled: query.include_settled,
        ..DebtFilter::default()
    };
    if let Some(debtor) = &query.debtor {
        match dto::parse_participant(debtor) {
            Ok(p) => filter.debtor = Some(p),
            Err(res) => return res,
        }
    }
    if let Some(creditor) = &query.creditor {
        match dto::parse_participant(creditor) {
            Ok(p) => filter.creditor = Some(p),
            Err(res) => return res,
        }
    }

    match services.ledger.get_outstanding(group_id, &filter) {
        Ok(records) => {
            let items: Vec<_> = records
                .iter()
                .map(|record| {
                    let debtor_name = services.directory.display_name(record.debtor()).ok();
                    let creditor_name = services.directory.display_name(record.creditor()).ok();
                    dto::debt_to_json(record, debtor_name, creditor_name)
                })
                .collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
