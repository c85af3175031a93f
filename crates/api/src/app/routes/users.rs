use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterUserRequest>,
) -> axum::response::Response {
    let participant = match dto::parse_participant(&body.address) {
        Ok(p) => p,
        Err(res) => return res,
    };

    match services.directory.register(participant, &body.username) {
        Ok(registration) => (
            StatusCode::CREATED,
            Json(dto::registration_to_json(&registration)),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.directory.list() {
        Ok(registrations) => {
            let items: Vec<_> = registrations.iter().map(dto::registration_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
