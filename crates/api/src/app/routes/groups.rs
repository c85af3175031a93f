use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tabx_core::GroupId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateGroupRequest>,
) -> axum::response::Response {
    let owner = match dto::parse_participant(&body.owner) {
        Ok(p) => p,
        Err(res) => return res,
    };

    match services.roster.create(&body.name, owner) {
        Ok(group) => (StatusCode::CREATED, Json(dto::group_to_json(&group))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.roster.list() {
        Ok(groups) => {
            let items: Vec<_> = groups.iter().map(dto::group_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<u64>,
) -> axum::response::Response {
    match services.roster.get(GroupId::new(id)) {
        Ok(group) => (StatusCode::OK, Json(dto::group_to_json(&group))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<u64>,
    Json(body): Json<dto::AddMemberRequest>,
) -> axum::response::Response {
    let participant = match dto::parse_participant(&body.address) {
        Ok(p) => p,
        Err(res) => return res,
    };

    match services.roster.add_member(GroupId::new(id), participant) {
        Ok(group) => (StatusCode::OK, Json(dto::group_to_json(&group))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
