#![cfg(feature = "api")]
//! Integration tests for the LinkChain HTTP surface
//!
//! These tests drive every endpoint through the router and check status
//! codes and JSON shapes against a live in-process node.

use axum_test::TestServer;
use linkchain::api::build_api_router;
use linkchain::blockchain::{GENESIS_DATA, GENESIS_PREVIOUS_HASH};
use linkchain::node::{Node, NodeSettings};
use serde_json::{json, Value};

#[tokio::test]
async fn test_ledger_endpoints() {
    let node = Node::new(NodeSettings::default());
    node.listen("127.0.0.1:0").await.expect("Failed to bind peer listener");

    let server = TestServer::new(build_api_router(node.clone())).expect("Failed to create test server");

    // Test /health
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["node_state"], "Ready");
    assert!(json["timestamp"].is_string());

    // Genesis-only ledger
    let response = server.get("/getblockchain").await;
    assert_eq!(response.status_code(), 200);
    let chain: Value = response.json();
    assert_eq!(chain.as_array().unwrap().len(), 1);
    assert_eq!(chain[0]["data"], GENESIS_DATA);
    assert_eq!(chain[0]["previousHash"], GENESIS_PREVIOUS_HASH);

    let response = server.get("/validate").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["valid"], true);
    assert_eq!(json["message"], "Blockchain is valid");

    // Test /addblock
    let response = server.post("/addblock").json(&json!({ "data": "A" })).await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["message"], "Block added successfully");
    assert_eq!(json["block"]["data"], "A");
    let a_hash = json["block"]["hash"].as_str().unwrap().to_string();

    server.post("/addblock").json(&json!({ "data": "B" })).await.assert_status_ok();

    // Test /lastblock
    let response = server.get("/lastblock").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["data"], "B");
    assert_eq!(json["previousHash"], a_hash.as_str());
    assert!(json["timestamp"].is_number());

    // Test /block?index=
    let response = server.get("/block").add_query_param("index", 1).await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["hash"], a_hash.as_str());

    let chain: Value = server.get("/getblockchain").await.json();
    assert_eq!(chain.as_array().unwrap().len(), 3);

    let response = server.get("/validate").await;
    assert_eq!(response.status_code(), 200);

    assert_eq!(node.len().await, 3);
}

#[tokio::test]
async fn test_block_index_errors() {
    let node = Node::new(NodeSettings::default());
    let server = TestServer::new(build_api_router(node)).expect("Failed to create test server");

    let response = server.get("/block").await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json["error"], "Index is required");

    let response = server.get("/block").add_query_param("index", "abc").await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json["error"], "Invalid index");

    for index in ["-1", "1", "999"] {
        let response = server.get("/block").add_query_param("index", index).await;
        assert_eq!(response.status_code(), 400);
        let json: Value = response.json();
        assert_eq!(json["error"], "Index out of range");
    }

    let response = server.get("/block").add_query_param("index", 0).await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_addblock_rejects_bad_bodies() {
    let node = Node::new(NodeSettings::default());
    let server = TestServer::new(build_api_router(node.clone())).expect("Failed to create test server");

    let response = server.post("/addblock").json(&json!({ "payload": "x" })).await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert_eq!(json["error"], "Invalid request body");

    // A line break cannot be carried by newline framing.
    let response = server.post("/addblock").json(&json!({ "data": "a\nb" })).await;
    assert_eq!(response.status_code(), 400);
    assert!(response.json::<Value>()["error"].is_string());

    let response = server.get("/addblock").await;
    assert_eq!(response.status_code(), 405);

    assert_eq!(node.len().await, 1);
}

#[tokio::test]
async fn test_health_and_peers_before_listen() {
    let node = Node::new(NodeSettings::default());
    let server = TestServer::new(build_api_router(node)).expect("Failed to create test server");

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 503);
    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");

    let response = server.get("/peers").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["count"], 0);
    assert!(json["peers"].is_array());
}

#[tokio::test]
async fn test_connect_peer_endpoint() {
    let target = Node::new(NodeSettings::default());
    let target_addr = target.listen("127.0.0.1:0").await.unwrap();

    let node = Node::new(NodeSettings::default());
    let server = TestServer::new(build_api_router(node.clone())).expect("Failed to create test server");

    let response = server
        .post("/peers")
        .json(&json!({ "address": target_addr.to_string() }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(node.peers().await, vec![target_addr.to_string()]);

    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let closed_addr = closed.local_addr().unwrap().to_string();
    drop(closed);
    let response = server.post("/peers").json(&json!({ "address": closed_addr })).await;
    assert_eq!(response.status_code(), 502);
    assert_eq!(node.peers().await.len(), 1);

    node.shutdown().await;
    target.shutdown().await;
}
