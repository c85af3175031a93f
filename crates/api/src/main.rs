use std::sync::Arc;
use std::time::Duration;

use tabx_settlement::{InMemoryAuthority, SettlementConfig};

#[tokio::main]
async fn main() {
    tabx_observability::init();

    let bind_addr = std::env::var("TABX_BIND_ADDR").unwrap_or_else(|_| {
        tracing::warn!("TABX_BIND_ADDR not set; using 0.0.0.0:8080");
        "0.0.0.0:8080".to_string()
    });

    let mut config = SettlementConfig::default();
    if let Ok(ms) = std::env::var("TABX_TRANSFER_TIMEOUT_MS") {
        match ms.parse::<u64>() {
            Ok(ms) => config.transfer_timeout = Duration::from_millis(ms),
            Err(_) => tracing::warn!("TABX_TRANSFER_TIMEOUT_MS is not a number; using default"),
        }
    }

    // In-process authority until a real transfer backend is wired in.
    let authority = Arc::new(InMemoryAuthority::new());
    let services = Arc::new(tabx_api::app::services::build_services(authority, config));
    let app = tabx_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
