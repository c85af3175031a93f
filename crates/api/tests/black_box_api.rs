use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;

use tabx_core::{Amount, GroupId, Participant};
use tabx_settlement::{InMemoryAuthority, SettlementConfig, TransferRef};

struct TestServer {
    base_url: String,
    authority: Arc<InMemoryAuthority>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port and
        // keep a handle on the authority so tests can script its behavior.
        let authority = Arc::new(InMemoryAuthority::new());
        let config = SettlementConfig {
            transfer_timeout: Duration::from_millis(50),
            reconcile_attempts: 3,
            reconcile_backoff: Duration::from_millis(1),
        };
        let services = Arc::new(tabx_api::app::services::build_services(
            authority.clone(),
            config,
        ));
        let app = tabx_api::app::build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            authority,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn p(handle: &str) -> Participant {
    Participant::new(handle).unwrap()
}

/// Register three users, create a group, record an equally split expense and
/// settle one debt through escrow.
#[tokio::test]
async fn expense_to_settlement_happy_path() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for (address, username) in [("0xaaa", "alice"), ("0xbbb", "bob"), ("0xccc", "carol")] {
        let res = client
            .post(format!("{}/users", srv.base_url))
            .json(&json!({"address": address, "username": username}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .post(format!("{}/groups", srv.base_url))
        .json(&json!({"name": "trip", "owner": "0xaaa"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let group: serde_json::Value = res.json().await.unwrap();
    let group_id = group["id"].as_u64().unwrap();
    assert_eq!(group["members"], json!(["0xaaa"]));

    for address in ["0xbbb", "0xccc"] {
        let res = client
            .put(format!("{}/groups/{}/members", srv.base_url, group_id))
            .json(&json!({"address": address}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    // Alice paid 91; split equally the last participant absorbs the remainder.
    let res = client
        .post(format!("{}/groups/{}/expenses", srv.base_url, group_id))
        .json(&json!({
            "total": "91",
            "payer": "0xaaa",
            "split": "equal",
            "participants": ["0xaaa", "0xbbb", "0xccc"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let expense: serde_json::Value = res.json().await.unwrap();
    assert_eq!(expense["total"], "91");
    assert_eq!(
        expense["shares"],
        json!([
            {"address": "0xaaa", "amount": "30"},
            {"address": "0xbbb", "amount": "30"},
            {"address": "0xccc", "amount": "31"},
        ])
    );

    // Two debts toward the payer, display names joined on.
    let res = client
        .get(format!("{}/groups/{}/debts", srv.base_url, group_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let debts: serde_json::Value = res.json().await.unwrap();
    let items = debts["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["debtor"], "0xbbb");
    assert_eq!(items[0]["debtor_name"], "bob");
    assert_eq!(items[0]["creditor_name"], "alice");
    assert_eq!(items[0]["outstanding"], "30");

    // Bob settles in full, funded from escrow.
    srv.authority
        .fund_escrow(GroupId::new(group_id), p("0xbbb"), Amount::from_units(30));
    let res = client
        .post(format!("{}/groups/{}/settle", srv.base_url, group_id))
        .json(&json!({"debtor": "0xbbb", "creditor": "0xaaa", "amount": "30"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let receipt: serde_json::Value = res.json().await.unwrap();
    assert_eq!(receipt["path"], "escrow");
    assert_eq!(receipt["applied"], "30");
    assert_eq!(receipt["settled_now"], true);

    // Only Carol's debt remains outstanding.
    let res = client
        .get(format!("{}/groups/{}/debts", srv.base_url, group_id))
        .send()
        .await
        .unwrap();
    let debts: serde_json::Value = res.json().await.unwrap();
    let items = debts["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["debtor"], "0xccc");
}

#[tokio::test]
async fn custom_split_adjusts_the_last_share() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/groups", srv.base_url))
        .json(&json!({"name": "dinner", "owner": "0xaaa"}))
        .send()
        .await
        .unwrap();
    let group: serde_json::Value = res.json().await.unwrap();
    let group_id = group["id"].as_u64().unwrap();

    for address in ["0xbbb", "0xccc"] {
        client
            .put(format!("{}/groups/{}/members", srv.base_url, group_id))
            .json(&json!({"address": address}))
            .send()
            .await
            .unwrap();
    }

    let res = client
        .post(format!("{}/groups/{}/expenses", srv.base_url, group_id))
        .json(&json!({
            "total": "100",
            "payer": "0xaaa",
            "split": "custom",
            "shares": [
                {"address": "0xaaa", "amount": "40"},
                {"address": "0xbbb", "amount": "40"},
                {"address": "0xccc", "amount": "10"},
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let expense: serde_json::Value = res.json().await.unwrap();
    assert_eq!(expense["shares"][2]["amount"], "20");
}

#[tokio::test]
async fn error_mapping_matches_the_domain_taxonomy() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Unknown group.
    let res = client
        .get(format!("{}/groups/999", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    // Duplicate username.
    for _ in 0..2 {
        client
            .post(format!("{}/users", srv.base_url))
            .json(&json!({"address": "0xaaa", "username": "alice"}))
            .send()
            .await
            .unwrap();
    }
    let res = client
        .post(format!("{}/users", srv.base_url))
        .json(&json!({"address": "0xddd", "username": "alice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Non-member payer.
    let res = client
        .post(format!("{}/groups", srv.base_url))
        .json(&json!({"name": "trip", "owner": "0xaaa"}))
        .send()
        .await
        .unwrap();
    let group_id = res.json::<serde_json::Value>().await.unwrap()["id"]
        .as_u64()
        .unwrap();
    let res = client
        .post(format!("{}/groups/{}/expenses", srv.base_url, group_id))
        .json(&json!({
            "total": "10",
            "payer": "0xeee",
            "split": "equal",
            "participants": ["0xeee"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn rejected_transfer_maps_to_bad_gateway() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let group_id = seed_group_with_debt(&srv, &client).await;
    srv.authority.reject_transfers(true);

    let res = client
        .post(format!("{}/groups/{}/settle", srv.base_url, group_id))
        .json(&json!({"debtor": "0xbbb", "creditor": "0xaaa", "amount": "30"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "external_ledger_error");

    // The debt is untouched.
    let res = client
        .get(format!("{}/groups/{}/debts", srv.base_url, group_id))
        .send()
        .await
        .unwrap();
    let debts: serde_json::Value = res.json().await.unwrap();
    assert_eq!(debts["items"][0]["outstanding"], "30");
}

#[tokio::test]
async fn timed_out_settlement_is_accepted_then_reconciled() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let group_id = seed_group_with_debt(&srv, &client).await;
    srv.authority.hang_transfers(true);

    let res = client
        .post(format!("{}/groups/{}/settle", srv.base_url, group_id))
        .json(&json!({"debtor": "0xbbb", "creditor": "0xaaa", "amount": "30"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "reconciliation_pending");
    let attempt_id = body["attempt_id"].as_str().unwrap().to_owned();

    // The attempt is parked as timed out; its transfer reference is visible
    // on the status endpoint.
    let res = client
        .get(format!("{}/settlements/{}", srv.base_url, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let attempt: serde_json::Value = res.json().await.unwrap();
    assert_eq!(attempt["state"], "timed_out");
    let reference: TransferRef = attempt["reference"].as_str().unwrap().parse().unwrap();

    // The transfer landed after the caller stopped waiting; reconciliation
    // must pick it up and apply it exactly once.
    srv.authority.hang_transfers(false);
    srv.authority
        .inject_confirmation(reference, Amount::from_units(30));

    let res = client
        .post(format!(
            "{}/settlements/{}/reconcile",
            srv.base_url, attempt_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["resolution"], "applied");
    assert_eq!(body["receipt"]["applied"], "30");

    let res = client
        .get(format!("{}/groups/{}/debts", srv.base_url, group_id))
        .send()
        .await
        .unwrap();
    let debts: serde_json::Value = res.json().await.unwrap();
    assert!(debts["items"].as_array().unwrap().is_empty());

    // The sweep endpoint finds nothing left to resolve.
    let res = client
        .post(format!("{}/settlements/reconcile-pending", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());
}

/// Group of alice + bob where bob owes alice 30.
async fn seed_group_with_debt(srv: &TestServer, client: &reqwest::Client) -> u64 {
    let res = client
        .post(format!("{}/groups", srv.base_url))
        .json(&json!({"name": "trip", "owner": "0xaaa"}))
        .send()
        .await
        .unwrap();
    let group_id = res.json::<serde_json::Value>().await.unwrap()["id"]
        .as_u64()
        .unwrap();
    client
        .put(format!("{}/groups/{}/members", srv.base_url, group_id))
        .json(&json!({"address": "0xbbb"}))
        .send()
        .await
        .unwrap();
    let res = client
        .post(format!("{}/groups/{}/expenses", srv.base_url, group_id))
        .json(&json!({
            "total": "60",
            "payer": "0xaaa",
            "split": "equal",
            "participants": ["0xaaa", "0xbbb"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    group_id
}
