//! HTTP surface for a LinkChain node
//!
//! Thin layer over [`Node`]: it parses requests, calls the node's operations
//! and renders JSON. It never touches the ledger directly.

use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::node::{Node, NodeState};

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    PeerUnreachable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PeerUnreachable(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::OutOfRange { .. } => ApiError::InvalidInput("Index out of range".to_string()),
            ChainError::Framing(msg) => ApiError::InvalidInput(msg),
            e @ ChainError::Connection { .. } => ApiError::PeerUnreachable(e.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct AddBlockRequest {
    pub data: String,
}

#[derive(Serialize)]
pub struct AddBlockResponse {
    pub message: String,
    pub block: Block,
}

#[derive(Deserialize)]
pub struct BlockQuery {
    pub index: Option<String>,
}

#[derive(Deserialize)]
pub struct ConnectPeerRequest {
    pub address: String,
}

#[derive(Serialize)]
struct ValidationResponse {
    message: &'static str,
    valid: bool,
}

#[derive(Serialize)]
struct SuccessResponse {
    message: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status, duration and the node's lifecycle state.
async fn logging_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();
    let node_state = node.state().await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        node_state = ?node_state,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints (for testing)
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/addblock", post(add_block))
        .route("/getblockchain", get(get_blockchain))
        .route("/block", get(get_block_by_index))
        .route("/lastblock", get(get_last_block))
        .route("/validate", get(validate_blockchain))
        .route("/peers", get(get_peers).post(connect_peer))
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serves the API on `address` until `shutdown` resolves.
pub async fn run_api_server<F>(node: Arc<Node>, address: &str, shutdown: F) -> Result<(), ChainError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_api_router(node);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|e| ChainError::Bind {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
    let local = listener.local_addr()?;

    tracing::info!("Starting API server on http://{}", local);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn add_block(
    State(node): State<Arc<Node>>,
    body: Result<Json<AddBlockRequest>, JsonRejection>,
) -> Result<Json<AddBlockResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        tracing::error!("Failed to decode request body: {}", e);
        ApiError::InvalidInput("Invalid request body".to_string())
    })?;

    let block = node.append_and_broadcast(req.data).await?;

    Ok(Json(AddBlockResponse {
        message: "Block added successfully".to_string(),
        block,
    }))
}

async fn get_blockchain(State(node): State<Arc<Node>>) -> Json<Vec<Block>> {
    Json(node.blocks().await)
}

async fn get_block_by_index(
    State(node): State<Arc<Node>>,
    Query(query): Query<BlockQuery>,
) -> Result<Json<Block>, ApiError> {
    let raw = match query.index.as_deref() {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            tracing::warn!("Index query parameter missing");
            return Err(ApiError::InvalidInput("Index is required".to_string()));
        }
    };

    let index: i64 = raw.parse().map_err(|_| {
        tracing::warn!(index = %raw, "Invalid index format");
        ApiError::InvalidInput("Invalid index".to_string())
    })?;

    Ok(Json(node.block_at(index).await?))
}

async fn get_last_block(State(node): State<Arc<Node>>) -> Json<Block> {
    Json(node.tail().await)
}

async fn validate_blockchain(State(node): State<Arc<Node>>) -> impl IntoResponse {
    if node.validate().await {
        (
            StatusCode::OK,
            Json(ValidationResponse {
                message: "Blockchain is valid",
                valid: true,
            }),
        )
    } else {
        tracing::warn!("Blockchain validation failed");
        (
            StatusCode::CONFLICT,
            Json(ValidationResponse {
                message: "Blockchain is invalid",
                valid: false,
            }),
        )
    }
}

async fn get_peers(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let peers = node.peers().await;
    Json(serde_json::json!({
        "count": peers.len(),
        "peers": peers
    }))
}

async fn connect_peer(
    State(node): State<Arc<Node>>,
    body: Result<Json<ConnectPeerRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::InvalidInput("Invalid request body".to_string()))?;
    if req.address.is_empty() {
        return Err(ApiError::InvalidInput("Peer address is required".to_string()));
    }

    node.connect_to_peer(&req.address).await?;

    Ok(Json(SuccessResponse {
        message: format!("Connected to peer {}", req.address),
    }))
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let state = node.state().await;
    let (status, label) = match state {
        NodeState::Ready => (StatusCode::OK, "healthy"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "node_state": format!("{:?}", state),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
