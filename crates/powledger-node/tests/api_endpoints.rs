//! Endpoint tests for the ledger node router.

use axum_test::TestServer;
use powledger_core::{Ledger, LedgerConfig, PoolPolicy, SharedLedger};
use powledger_node::{
    router, AppState, ChainResponse, MineResponse, NewBlockForm, PendingResponse, SubmitResponse,
};
use serde_json::{json, Value};
use std::time::Duration;

fn server_with(state: AppState) -> TestServer {
    TestServer::new(router(state)).expect("Failed to create test server")
}

fn server(difficulty: usize) -> (TestServer, SharedLedger) {
    let ledger = SharedLedger::new(Ledger::with_difficulty(difficulty).unwrap());
    (server_with(AppState::new(ledger.clone())), ledger)
}

fn form(transaction: &str, amount: &str, customer: &str) -> NewBlockForm {
    NewBlockForm {
        transaction: Some(transaction.to_string()),
        amount: Some(amount.to_string()),
        customer_id: Some(customer.to_string()),
    }
}

#[tokio::test]
async fn test_health() {
    let (server, _) = server(1);
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_chain_starts_with_genesis() {
    let (server, _) = server(2);
    let response = server.get("/chain").await;
    assert_eq!(response.status_code(), 200);
    let body: ChainResponse = response.json();
    assert_eq!(body.length, 1);
    assert_eq!(body.chain[0].index(), 0);
    assert_eq!(body.chain[0].previous_hash().as_str(), "0");
}

#[tokio::test]
async fn test_new_block_submits_and_mines() {
    let (server, ledger) = server(2);

    let response = server
        .post("/new_block")
        .form(&form("coffee", "3", "c-17"))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: SubmitResponse = response.json();
    assert!(body.accepted);
    assert_eq!(body.mined, Some(1));
    assert_eq!(
        body.transaction.payload(),
        &json!({ "transaction": "coffee", "amount": "3", "customerID": "c-17" })
    );

    let chain: ChainResponse = server.get("/chain").await.json();
    assert_eq!(chain.length, 2);
    assert_eq!(chain.chain[1].previous_hash(), chain.chain[0].hash());
    assert!(chain.chain[1].hash().as_str().starts_with("00"));
    assert_eq!(ledger.pending_len(), 0);
}

#[tokio::test]
async fn test_new_block_with_missing_fields_records_nulls() {
    let (server, _) = server(1);
    let response = server
        .post("/new_block")
        .form(&[("transaction", "tip")])
        .await;
    assert_eq!(response.status_code(), 200);
    let body: SubmitResponse = response.json();
    assert_eq!(body.transaction.payload()["transaction"], "tip");
    assert!(body.transaction.payload()["amount"].is_null());
    assert!(body.transaction.payload()["customerID"].is_null());
}

#[tokio::test]
async fn test_tx_then_mine() {
    let (server, _) = server(1);

    let response = server.post("/tx").json(&json!({ "id": "t1" })).await;
    assert_eq!(response.status_code(), 202);
    let response = server.post("/tx").json(&json!({ "id": "t2" })).await;
    assert_eq!(response.status_code(), 202);

    let pending: PendingResponse = server.get("/pending").await.json();
    assert_eq!(pending.count, 2);

    let mined: MineResponse = server.post("/mine").await.json();
    assert_eq!(mined.mined, Some(1));
    assert_eq!(mined.length, 2);

    let pending: PendingResponse = server.get("/pending").await.json();
    assert_eq!(pending.count, 0);

    let chain: ChainResponse = server.get("/chain").await.json();
    assert_eq!(chain.chain[1].transactions().len(), 2);
}

#[tokio::test]
async fn test_mine_with_empty_pool_is_a_no_op() {
    let (server, _) = server(1);
    let mined: MineResponse = server.post("/mine").await.json();
    assert_eq!(mined.mined, None);
    assert_eq!(mined.length, 1);
}

#[tokio::test]
async fn test_first_only_policy_over_http() {
    let config = LedgerConfig::default()
        .with_difficulty(1)
        .with_pool_policy(PoolPolicy::FirstOnly);
    let ledger = SharedLedger::new(Ledger::new(config).unwrap());
    let server = server_with(AppState::new(ledger));

    server.post("/tx").json(&json!({ "id": "first" })).await;
    server.post("/tx").json(&json!({ "id": "second" })).await;
    let mined: MineResponse = server.post("/mine").await.json();
    assert_eq!(mined.mined, Some(1));

    let chain: ChainResponse = server.get("/chain").await.json();
    assert_eq!(chain.chain[1].transactions().len(), 1);
    let pending: PendingResponse = server.get("/pending").await.json();
    assert_eq!(pending.count, 0);
}

#[tokio::test]
async fn test_full_pool_is_refused() {
    let ledger = SharedLedger::new(Ledger::with_difficulty(1).unwrap());
    let server = server_with(AppState::new(ledger).with_max_pending(1));

    let response = server.post("/tx").json(&json!({ "id": "a" })).await;
    assert_eq!(response.status_code(), 202);
    let response = server.post("/tx").json(&json!({ "id": "b" })).expect_failure().await;
    assert_eq!(response.status_code(), 503);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("pool is full"));
}

#[tokio::test]
async fn test_mining_timeout_keeps_transaction_pending() {
    let ledger = SharedLedger::new(Ledger::with_difficulty(64).unwrap());
    let server = server_with(
        AppState::new(ledger.clone()).with_mine_timeout(Some(Duration::from_millis(50))),
    );

    let response = server
        .post("/new_block")
        .form(&form("rent", "900", "c-1"))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 504);
    assert_eq!(ledger.pending_len(), 1);
    assert_eq!(ledger.len(), 1);
}
