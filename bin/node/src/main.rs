//! Deposit tree node
//!
//! Hosts the contract ledger together with its off-chain mirror and serves
//! them over JSON-RPC:
//! - Contract methods: `initState`, `addValue`, `addAddress`, `deposit`, `checkFlags`
//! - `mt_sendTransaction` for transactions built by other clients
//! - Queries for state, events, witnesses and counters

use anyhow::Context;
use axum::{
    extract::State as AxumState,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mytree_core::{ContractError, Method, Transaction};
use mytree_host::{Config, LocalLedger, Mirror, MirrorDiverged, Submitter, TreeClient};
use mytree_merkle::{Field, Keccak256Hasher, MerkleError, PublicKey};

/// Height 8: 128 leaves
const DEPTH: usize = 7;

type Ledger = LocalLedger<DEPTH, Keccak256Hasher>;
type Client = TreeClient<DEPTH, Ledger, Keccak256Hasher>;

const STALE_STATE: i64 = -32000;
const REJECTED: i64 = -32001;
const MIRROR_DIVERGED: i64 = -32002;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

struct NodeState {
    client: Client,
    config: Config,
}

type SharedState = Arc<NodeState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting deposit tree node...");

    let config = Config::from_env()?;
    info!("  Height: {}", DEPTH + 1);
    info!("  Members: {}", config.members.len());
    info!("  Event page size: {}", config.event_page_size);

    let client = Client::new(Arc::new(Mirror::new()), Arc::new(Ledger::new()));
    if config.auto_init {
        let receipt = client.init(config.operator).await?;
        info!("Initialized with root {}", receipt.state.tree_root);
        for member in &config.members {
            client
                .add_address(config.operator, member.index, member.key)
                .await
                .with_context(|| format!("registering member {}", member.index))?;
            info!("Registered member {} at {}", member.key, member.index);
        }
    }

    let rpc_addr = config.rpc_addr.clone();
    let state = Arc::new(NodeState { client, config });

    let app = Router::new()
        .route("/health", get(health))
        .route("/", post(rpc_handler))
        .with_state(state);

    info!("RPC server listening on {}", rpc_addr);
    let listener = tokio::net::TcpListener::bind(&rpc_addr)
        .await
        .with_context(|| format!("binding {}", rpc_addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

/// JSON-RPC request
#[derive(Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Value,
}

/// JSON-RPC response
#[derive(Serialize)]
struct RpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Value,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(e: impl std::fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("invalid params: {}", e))
    }
}

impl From<ContractError> for RpcError {
    fn from(e: ContractError) -> Self {
        let code = if e.is_stale() { STALE_STATE } else { REJECTED };
        Self::new(code, e.to_string())
    }
}

impl From<anyhow::Error> for RpcError {
    fn from(e: anyhow::Error) -> Self {
        if let Some(contract) = e.downcast_ref::<ContractError>() {
            return contract.clone().into();
        }
        let code = if e.is::<MirrorDiverged>() {
            MIRROR_DIVERGED
        } else if e.is::<MerkleError>() {
            INVALID_PARAMS
        } else {
            INTERNAL_ERROR
        };
        Self::new(code, e.to_string())
    }
}

#[derive(Deserialize)]
struct InitParams {
    #[serde(default)]
    sender: Option<PublicKey>,
}

#[derive(Deserialize)]
struct AddValueParams {
    index: u64,
    value: Field,
    #[serde(default)]
    sender: Option<PublicKey>,
}

#[derive(Deserialize)]
struct AddAddressParams {
    index: u64,
    address: PublicKey,
    #[serde(default)]
    sender: Option<PublicKey>,
}

#[derive(Deserialize)]
struct DepositParams {
    index: u64,
    secret: Field,
    sender: PublicKey,
}

#[derive(Deserialize)]
struct CheckFlagsParams {
    secret: Field,
}

/// Params are either a single object or a one-element array holding it
fn params<T: DeserializeOwned>(req: &RpcRequest) -> Result<T, RpcError> {
    let value = match &req.params {
        Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    };
    let value = if value.is_null() { json!({}) } else { value };
    serde_json::from_value(value).map_err(RpcError::invalid_params)
}

/// First positional param as u64, if any
fn first_u64(req: &RpcRequest) -> Option<u64> {
    match &req.params {
        Some(Value::Array(items)) => items.first().and_then(Value::as_u64),
        Some(v) => v.as_u64(),
        None => None,
    }
}

async fn rpc_handler(
    AxumState(state): AxumState<SharedState>,
    Json(req): Json<RpcRequest>,
) -> Json<RpcResponse> {
    if req.jsonrpc != "2.0" && !req.jsonrpc.is_empty() {
        warn!("Unexpected jsonrpc version {:?}", req.jsonrpc);
    }

    let response = match dispatch(&state, &req).await {
        Ok(result) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id: req.id,
        },
        Err(error) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: req.id,
        },
    };
    Json(response)
}

async fn dispatch(state: &NodeState, req: &RpcRequest) -> Result<Value, RpcError> {
    let client = &state.client;
    let operator = state.config.operator;

    match req.method.as_str() {
        "mt_sendTransaction" => {
            let tx: Transaction<DEPTH> = params(req)?;
            let receipt = client.submit(tx).await?;
            return to_value(&receipt);
        }
        "mt_getState" => return to_value(&client.ledger().state().await),
        "mt_getRoot" => return to_value(&client.mirror().root().await),
        "mt_getEvents" => {
            let from = first_u64(req).unwrap_or(0);
            let events = client
                .ledger()
                .events(from, state.config.event_page_size)
                .await;
            return to_value(&events);
        }
        "mt_getWitness" => {
            let index =
                first_u64(req).ok_or_else(|| RpcError::invalid_params("missing leaf index"))?;
            let mirror = client.mirror();
            let witness = mirror.witness(index).await.map_err(RpcError::invalid_params)?;
            let leaf = mirror.leaf(index).await.map_err(RpcError::invalid_params)?;
            return Ok(json!({
                "index": index,
                "leaf": leaf,
                "witness": witness,
                "root": client.mirror().root().await,
            }));
        }
        "mt_getStats" => {
            let stats = client.ledger().stats().await;
            return Ok(json!({
                "accepted": stats.accepted,
                "rejected": stats.rejected,
                "occupied": client.mirror().occupied().await,
            }));
        }
        _ => {}
    }

    let method: Method = req
        .method
        .parse()
        .map_err(|e: ContractError| RpcError::new(METHOD_NOT_FOUND, e.to_string()))?;

    let receipt = match method {
        Method::InitState => {
            let p: InitParams = params(req)?;
            client.init(p.sender.unwrap_or(operator)).await?
        }
        Method::AddValue => {
            let p: AddValueParams = params(req)?;
            client
                .add_value(p.sender.unwrap_or(operator), p.index, p.value)
                .await?
        }
        Method::AddAddress => {
            let p: AddAddressParams = params(req)?;
            client
                .add_address(p.sender.unwrap_or(operator), p.index, p.address)
                .await?
        }
        Method::Deposit => {
            let p: DepositParams = params(req)?;
            client.deposit(p.sender, p.index, p.secret).await?
        }
        Method::CheckFlags => {
            let p: CheckFlagsParams = params(req)?;
            let valid = client.check_flags(operator, p.secret).await?;
            return Ok(json!(valid));
        }
    };
    to_value(&receipt)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mytree_core::StateField;

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Some(params),
            id: json!(1),
        }
    }

    fn node() -> NodeState {
        NodeState {
            client: Client::new(Arc::new(Mirror::new()), Arc::new(Ledger::new())),
            config: Config::default(),
        }
    }

    #[test]
    fn test_params_accept_object_or_array() {
        let req = request("checkFlags", json!([{ "secret": "12" }]));
        let p: CheckFlagsParams = params(&req).unwrap();
        assert_eq!(p.secret, Field::from_u64(12));
        let req = request("checkFlags", json!({ "secret": "0x20" }));
        let p: CheckFlagsParams = params(&req).unwrap();
        assert_eq!(p.secret, Field::from_u64(32));
        assert!(params::<CheckFlagsParams>(&request("checkFlags", json!([]))).is_err());
    }

    #[test]
    fn test_error_codes() {
        let stale = ContractError::StaleState {
            field: StateField::TreeRoot,
            expected: Field::ZERO,
            actual: Field::ONE,
        };
        assert_eq!(RpcError::from(stale).code, STALE_STATE);
        assert_eq!(RpcError::from(ContractError::NotInitialized).code, REJECTED);

        let diverged = anyhow::Error::from(MirrorDiverged {
            mirror: Field::ZERO,
            committed: Field::ONE,
        });
        assert_eq!(RpcError::from(diverged).code, MIRROR_DIVERGED);
    }

    #[tokio::test]
    async fn test_deposit_over_rpc() {
        let node = node();
        let alice = json!({ "x": "0x0b", "is_odd": true });

        dispatch(&node, &request("initState", json!([]))).await.unwrap();
        dispatch(&node, &request("addAddress", json!([{ "index": 3, "address": alice }])))
            .await
            .unwrap();
        let receipt = dispatch(
            &node,
            &request("deposit", json!([{ "index": 3, "secret": "8", "sender": alice }])),
        )
        .await
        .unwrap();
        assert_eq!(receipt["method"], json!("deposit"));

        let err = dispatch(
            &node,
            &request("deposit", json!([{ "index": 3, "secret": "8", "sender": alice }])),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, REJECTED);

        let events = dispatch(&node, &request("mt_getEvents", json!([0]))).await.unwrap();
        assert_eq!(events.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_index() {
        let node = node();
        let err = dispatch(&node, &request("transfer", json!([]))).await.unwrap_err();
        assert_eq!(err.code, METHOD_NOT_FOUND);

        let err = dispatch(&node, &request("mt_getWitness", json!([128]))).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        let ok = dispatch(&node, &request("checkFlags", json!({ "secret": "28" }))).await.unwrap();
        assert_eq!(ok, json!(true));
    }
}
