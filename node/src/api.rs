//! # REST + JSON-RPC API
//!
//! Builds the axum router that exposes the ledger node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                               |
//! |--------|------------------------|-------------------------------------------|
//! | GET    | `/health`              | Liveness probe                            |
//! | GET    | `/status`              | Version, last commit version, key count   |
//! | POST   | `/rpc`                 | JSON-RPC 2.0 gateway                      |
//! | GET    | `/assets`              | Every asset record                        |
//! | GET    | `/assets/:kind`        | Records of one kind                       |
//! | GET    | `/assets/:kind/:owner` | One record (404 when absent)              |
//!
//! ## JSON-RPC Methods
//!
//! | Method            | Params                                   | Result           |
//! |-------------------|------------------------------------------|------------------|
//! | `ledger_submit`   | `{function, args?, identity?}`           | receipt          |
//! | `ledger_evaluate` | `{function, args?, identity?}`           | payload          |
//! | `ledger_version`  | none                                     | `{version}`      |
//!
//! Contract failures map to application error codes: `-32001` not found,
//! `-32002` already exists, `-32003` insufficient balance, `-32004` commit
//! conflict, `-32602` invalid argument or unknown function.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use gemledger_contracts::{ContractHost, Invocation, LedgerError, LedgerResult, Receipt};

use crate::metrics::{retries_for, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub host: Arc<ContractHost>,
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Submit through the host on the blocking pool and record metrics.
    pub async fn submit(
        &self,
        invocation: Invocation,
        identity: Option<String>,
    ) -> LedgerResult<Receipt> {
        let function = invocation.function.clone();
        let started = Instant::now();
        let result = self.host.clone().submit_async(invocation, identity).await;

        let retries = retries_for(&result, self.host.max_attempts());
        self.metrics.record(&function, &result, retries, started.elapsed());
        if let Ok(receipt) = &result {
            self.metrics.set_version(receipt.version);
        }
        result
    }

    /// Evaluate through the host on the blocking pool and record metrics.
    pub async fn evaluate(
        &self,
        invocation: Invocation,
        identity: Option<String>,
    ) -> LedgerResult<Value> {
        let function = invocation.function.clone();
        let started = Instant::now();
        let result = self.host.clone().evaluate_async(invocation, identity).await;
        self.metrics.record(&function, &result, 0, started.elapsed());
        result
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/assets", get(all_assets_handler))
        .route("/assets/:kind", get(assets_by_kind_handler))
        .route("/assets/:kind/:owner", get(asset_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn err(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    /// `{"kind": <error code name>}` for contract failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&LedgerError> for JsonRpcError {
    fn from(e: &LedgerError) -> Self {
        Self {
            code: rpc_error_code(e),
            message: e.to_string(),
            data: Some(json!({ "kind": e.code() })),
        }
    }
}

/// JSON-RPC error code for a contract failure.
pub fn rpc_error_code(e: &LedgerError) -> i32 {
    match e {
        LedgerError::NotFound { .. } => -32001,
        LedgerError::AlreadyExists { .. } => -32002,
        LedgerError::InsufficientBalance { .. } => -32003,
        LedgerError::InvalidArgument(_) | LedgerError::UnknownFunction(_) => -32602,
        e if e.is_retryable() => -32004,
        _ => -32603,
    }
}

/// Params of `ledger_submit` and `ledger_evaluate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeParams {
    #[serde(flatten)]
    pub invocation: Invocation,
    #[serde(default)]
    pub identity: Option<String>,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub last_commit_version: u64,
    /// Committed keys in the world state.
    pub keys: usize,
    pub collector: String,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Error kind, e.g. `NotFound`.
    pub code: String,
}

/// HTTP status for a contract failure on a REST endpoint.
pub fn rest_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::InvalidArgument(_) | LedgerError::UnknownFunction(_) => {
            StatusCode::BAD_REQUEST
        }
        LedgerError::AlreadyExists { .. } => StatusCode::CONFLICT,
        LedgerError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        e if e.is_retryable() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn rest_response(result: LedgerResult<Value>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => {
            let status = rest_status(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, "request failed");
            }
            let body = ErrorResponse {
                error: e.to_string(),
                code: e.code().to_string(),
            };
            (status, Json(body)).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status`: version and world-state summary.
async fn status_handler(State(state): State<AppState>) -> Response {
    match state.host.last_version() {
        Ok(version) => {
            state.metrics.set_version(version);
            let resp = StatusResponse {
                version: state.version.clone(),
                last_commit_version: version,
                keys: state.host.store().len(),
                collector: state.host.contract().collector().to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            };
            Json(resp).into_response()
        }
        Err(e) => rest_response(Err(e)),
    }
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::err(
            req.id,
            JsonRpcError::new(-32600, "Invalid Request: jsonrpc must be \"2.0\""),
        ));
    }

    let response = match req.method.as_str() {
        "ledger_submit" => match parse_invoke_params(req.params) {
            Ok(params) => match state.submit(params.invocation, params.identity).await {
                Ok(receipt) => match serde_json::to_value(receipt) {
                    Ok(value) => JsonRpcResponse::ok(req.id, value),
                    Err(e) => JsonRpcResponse::err(req.id, (&LedgerError::from(e)).into()),
                },
                Err(e) => JsonRpcResponse::err(req.id, (&e).into()),
            },
            Err(error) => JsonRpcResponse::err(req.id, error),
        },
        "ledger_evaluate" => match parse_invoke_params(req.params) {
            Ok(params) => match state.evaluate(params.invocation, params.identity).await {
                Ok(value) => JsonRpcResponse::ok(req.id, value),
                Err(e) => JsonRpcResponse::err(req.id, (&e).into()),
            },
            Err(error) => JsonRpcResponse::err(req.id, error),
        },
        "ledger_version" => match state.host.last_version() {
            Ok(version) => JsonRpcResponse::ok(req.id, json!({ "version": version })),
            Err(e) => JsonRpcResponse::err(req.id, (&e).into()),
        },
        other => JsonRpcResponse::err(
            req.id,
            JsonRpcError::new(-32601, format!("Method not found: {other}")),
        ),
    };
    Json(response)
}

fn parse_invoke_params(params: Option<Value>) -> Result<InvokeParams, JsonRpcError> {
    let params = params
        .ok_or_else(|| JsonRpcError::new(-32602, "Invalid params: expected {function, args}"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(-32602, format!("Invalid params: {e}")))
}

/// `GET /assets`
async fn all_assets_handler(State(state): State<AppState>) -> Response {
    let inv = Invocation::new("GetAllAssets", Vec::<String>::new());
    rest_response(state.evaluate(inv, None).await)
}

/// `GET /assets/:kind`
async fn assets_by_kind_handler(
    Path(kind): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let inv = Invocation::new("GetAssetsByKind", [kind]);
    rest_response(state.evaluate(inv, None).await)
}

/// `GET /assets/:kind/:owner`: 404 when the record does not exist.
async fn asset_handler(
    Path((kind, owner)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let inv = Invocation::new("ReadAsset", [kind, owner]);
    rest_response(state.evaluate(inv, None).await)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use gemledger_contracts::AssetContract;
    use gemledger_protocol::{LedgerDb, MemoryState};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::metrics::NodeMetrics;

    /// Creates a test AppState over an empty in-memory world state.
    fn test_app_state() -> AppState {
        let host = ContractHost::new(Arc::new(MemoryState::new()), AssetContract::new());
        AppState {
            version: "0.1.0-test".into(),
            host: Arc::new(host),
            metrics: Arc::new(NodeMetrics::new().unwrap()),
        }
    }

    /// Creates a test AppState whose ledger has been seeded.
    fn seeded_app_state() -> AppState {
        let state = test_app_state();
        state
            .host
            .submit(&Invocation::new("InitLedger", Vec::<String>::new()), None)
            .unwrap();
        state
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    /// Posts a JSON-RPC call and decodes the response envelope.
    async fn rpc(router: &Router, method: &str, params: Value) -> JsonRpcResponse {
        let body = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn error_code(resp: &JsonRpcResponse) -> i32 {
        resp.error.as_ref().map(|e| e.code).unwrap_or_default()
    }

    // -- Health and status -------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_world_state() {
        let router = create_router(seeded_app_state());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.last_commit_version, 1);
        assert_eq!(resp.keys, 6);
        assert_eq!(resp.collector, "Distrib");
    }

    // -- JSON-RPC ------------------------------------------------------------

    #[tokio::test]
    async fn rpc_submit_commits_and_evaluate_reads() {
        let state = test_app_state();
        let router = create_router(state.clone());

        let resp = rpc(&router, "ledger_submit", json!({ "function": "InitLedger" })).await;
        assert!(resp.error.is_none(), "{:?}", resp.error);
        let receipt = resp.result.unwrap();
        assert_eq!(receipt["version"], 1);
        assert_eq!(receipt["attempts"], 1);

        let resp = rpc(
            &router,
            "ledger_submit",
            json!({
                "function": "TransferAsset",
                "args": ["gem", "SEO", "alice", "40"],
                "identity": "SEO",
            }),
        )
        .await;
        assert_eq!(resp.result.unwrap()["payload"], "SEO");

        let resp = rpc(
            &router,
            "ledger_evaluate",
            json!({ "function": "ReadAsset", "args": ["gem", "alice"] }),
        )
        .await;
        assert_eq!(resp.result.unwrap(), json!({"ID": "gem", "Owner": "alice", "Amount": 40}));

        let resp = rpc(&router, "ledger_version", Value::Null).await;
        assert_eq!(resp.result.unwrap()["version"], 2);

        assert_eq!(state.metrics.last_commit_version.get(), 2);
        assert_eq!(
            state.metrics.invocations_total.with_label_values(&["TransferAsset", "ok"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn rpc_maps_contract_errors_to_codes() {
        let router = create_router(seeded_app_state());

        let params = json!({ "function": "ReadAsset", "args": ["gem", "ghost"] });
        let resp = rpc(&router, "ledger_evaluate", params).await;
        assert_eq!(error_code(&resp), -32001);
        assert_eq!(resp.error.unwrap().data.unwrap()["kind"], "NotFound");

        let params = json!({ "function": "CreateAsset", "args": ["gem", "SEO", "1"] });
        let resp = rpc(&router, "ledger_submit", params).await;
        assert_eq!(error_code(&resp), -32002);

        let resp = rpc(
            &router,
            "ledger_submit",
            json!({ "function": "TransferAsset", "args": ["gem", "Team1", "SEO", "5"] }),
        )
        .await;
        assert_eq!(error_code(&resp), -32003);

        let params = json!({ "function": "ConvertGemToExp", "args": ["Team2", "-1"] });
        let resp = rpc(&router, "ledger_submit", params).await;
        assert_eq!(error_code(&resp), -32602);

        let resp = rpc(&router, "ledger_submit", json!({ "function": "Mint" })).await;
        assert_eq!(error_code(&resp), -32602);
    }

    #[tokio::test]
    async fn rpc_rejects_bad_envelopes() {
        let router = create_router(test_app_state());

        let resp = rpc(&router, "ledger_submit", Value::Null).await;
        assert_eq!(error_code(&resp), -32602);

        let resp = rpc(&router, "ledger_submit", json!({ "args": [] })).await;
        assert_eq!(error_code(&resp), -32602);

        let resp = rpc(&router, "ledger_blockHeight", json!([])).await;
        assert_eq!(error_code(&resp), -32601);
    }

    #[tokio::test]
    async fn rpc_invalid_version_returns_error() {
        let router = create_router(test_app_state());
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(
                    &json!({ "jsonrpc": "1.0", "method": "ledger_version", "id": 20 }),
                )
                .unwrap(),
            ))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let resp: JsonRpcResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error_code(&resp), -32600);
        assert_eq!(resp.id, json!(20));
    }

    // -- REST ----------------------------------------------------------------

    #[tokio::test]
    async fn asset_endpoint_returns_record_or_404() {
        let router = create_router(seeded_app_state());

        let (status, body) = get(&router, "/assets/gem/SEO").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({"ID": "gem", "Owner": "SEO", "Amount": 3000}));

        let (status, body) = get(&router, "/assets/gem/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "NotFound");
    }

    #[tokio::test]
    async fn invalid_key_component_is_bad_request() {
        let router = create_router(seeded_app_state());
        let (status, _) = get(&router, "/assets/gem/a%00b").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_endpoints_follow_key_order() {
        let router = create_router(seeded_app_state());

        let (status, body) = get(&router, "/assets").await;
        assert_eq!(status, StatusCode::OK);
        let all: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0]["Owner"], "Distrib");

        let (_, body) = get(&router, "/assets/gem").await;
        let gem: Vec<Value> = serde_json::from_slice(&body).unwrap();
        let owners: Vec<&str> = gem.iter().map(|a| a["Owner"].as_str().unwrap()).collect();
        assert_eq!(owners, ["SEO", "Team1", "Team2"]);
    }

    #[tokio::test]
    async fn sled_backed_state_serves_the_same_api() {
        let db = Arc::new(LedgerDb::open_temporary().unwrap());
        let state = AppState {
            version: "0.1.0-test".into(),
            host: Arc::new(ContractHost::new(db, AssetContract::with_collector("Treasury"))),
            metrics: Arc::new(NodeMetrics::new().unwrap()),
        };
        let router = create_router(state);

        rpc(&router, "ledger_submit", json!({ "function": "InitLedger" })).await;
        let params = json!({ "function": "TransferGemToDistrib", "args": ["SEO", "10"] });
        let resp = rpc(&router, "ledger_submit", params).await;
        assert!(resp.error.is_none());

        let (status, body) = get(&router, "/assets/gem/Treasury").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["Amount"], 10);
    }
}
