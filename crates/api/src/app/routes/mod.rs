use axum::{
    routing::{get, post, put},
    Router,
};

pub mod debts;
pub mod expenses;
pub mod groups;
pub mod settlements;
pub mod system;
pub mod users;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/users", post(users::register).get(users::list))
        .route("/groups", post(groups::create).get(groups::list))
        .route("/groups/:id", get(groups::get_group))
        .route("/groups/:id/members", put(groups::add_member))
        .route(
            "/groups/:id/expenses",
            post(expenses::record).get(expenses::list),
        )
        .route("/groups/:id/debts", get(debts::list))
        .route("/groups/:id/settle", post(settlements::settle))
        .route("/settlements/:attempt_id", get(settlements::get_attempt))
        .route(
            "/settlements/:attempt_id/reconcile",
            post(settlements::reconcile),
        )
        .route(
            "/settlements/reconcile-pending",
            post(settlements::reconcile_pending),
        )
}
