//! Connections to HTTP networks, against a mocked JSON-RPC node.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chain_connect::hooks::{BoxFuture, Handler, Next, RequestEvent};
use chain_connect::*;
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{Value, json};

use crate::init_tracing;

/// A mock answering `method` with `result`, not yet registered.
fn method_mock(server: &mut ServerGuard, method: &str, result: Value) -> Mock {
    server
        .mock("POST", "/")
        .match_body(Matcher::Regex(format!(r#""method"\s*:\s*"{}""#, method)))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string())
}

async fn mock_method(server: &mut ServerGuard, method: &str, result: Value) -> Mock {
    method_mock(server, method, result).create_async().await
}

fn manager_for(url: String, chain_id: Option<u64>, hooks: NetworkHooks) -> NetworkManager {
    let mut config = ManagerConfig::default();
    let mut remote = HttpNetworkConfig::new(url);
    remote.chain_id = chain_id;
    config
        .networks
        .insert("remote".to_string(), NetworkConfig::Http(remote));
    NetworkManager::builder(config).hooks(hooks).build()
}

/// Records every request that reaches the wire.
struct RecordRequests(Arc<Mutex<Vec<JsonRpcRequest>>>);

impl Handler<RequestEvent, Result<JsonRpcResponse, Error>> for RecordRequests {
    fn handle<'a>(
        &'a self,
        event: RequestEvent,
        next: Next<'a, RequestEvent, Result<JsonRpcResponse, Error>>,
    ) -> BoxFuture<'a, Result<JsonRpcResponse, Error>> {
        Box::pin(async move {
            self.0.lock().unwrap().push(event.1.clone());
            next.run(event).await
        })
    }
}

fn recording_hooks() -> (NetworkHooks, Arc<Mutex<Vec<JsonRpcRequest>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = NetworkHooks::default();
    hooks.on_request.register(RecordRequests(sent.clone()));
    (hooks, sent)
}

fn send_transaction(tx: Value) -> RequestArguments {
    RequestArguments::new("eth_sendTransaction", vec![tx])
}

// =============================================================================
// Chain id validation
// =============================================================================

#[tokio::test]
async fn test_chain_id_mismatch() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let _chain_id = mock_method(&mut server, "eth_chainId", json!("0xa")).await;
    let block_number = method_mock(&mut server, "eth_blockNumber", json!("0x1"))
        .expect(0)
        .create_async()
        .await;

    let manager = manager_for(server.url(), Some(1), NetworkHooks::default());
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();

    let err = connection
        .request(RequestArguments::method("eth_blockNumber"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::InvalidGlobalChainId {
                configured: 1,
                reported: 10
            }
        ),
        "unexpected error: {err:?}"
    );
    block_number.assert_async().await;
}

#[tokio::test]
async fn test_chain_id_validated_once_per_connection() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let chain_id = method_mock(&mut server, "eth_chainId", json!("0x1"))
        .expect(1)
        .create_async()
        .await;
    let block_number = method_mock(&mut server, "eth_blockNumber", json!("0x10"))
        .expect(3)
        .create_async()
        .await;

    let manager = manager_for(server.url(), Some(1), NetworkHooks::default());
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();

    for _ in 0..3 {
        let block = connection
            .request(RequestArguments::method("eth_blockNumber"))
            .await
            .unwrap();
        assert_eq!(block, json!("0x10"));
    }
    chain_id.assert_async().await;
    block_number.assert_async().await;
}

#[tokio::test]
async fn test_net_version_fallback() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::Regex(r#""method"\s*:\s*"eth_chainId""#.to_string()))
        .with_status(200)
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32601, "message": "the method eth_chainId does not exist"}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _net_version = mock_method(&mut server, "net_version", json!("1")).await;
    let _block_number = mock_method(&mut server, "eth_blockNumber", json!("0x10")).await;

    let manager = manager_for(server.url(), Some(1), NetworkHooks::default());
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();
    connection
        .request(RequestArguments::method("eth_blockNumber"))
        .await
        .unwrap();
}

// =============================================================================
// Gas filling
// =============================================================================

#[tokio::test]
async fn test_gas_and_gas_price_filled() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let _estimate = mock_method(&mut server, "eth_estimateGas", json!("0x5208")).await;
    let _price = mock_method(&mut server, "eth_gasPrice", json!("0x3b9aca00")).await;
    let _send = mock_method(&mut server, "eth_sendTransaction", json!("0xabc")).await;

    let (hooks, sent) = recording_hooks();
    let manager = manager_for(server.url(), None, hooks);
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();

    let hash = connection
        .request(send_transaction(json!({"from": "0x01", "to": "0x02"})))
        .await
        .unwrap();
    assert_eq!(hash, json!("0xabc"));

    let sent = sent.lock().unwrap();
    let methods: Vec<&str> = sent.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(
        methods,
        vec!["eth_estimateGas", "eth_gasPrice", "eth_sendTransaction"]
    );
    assert_eq!(
        sent[2].params[0],
        json!({"from": "0x01", "to": "0x02", "gas": "0x5208", "gasPrice": "0x3b9aca00"})
    );
}

#[tokio::test]
async fn test_preset_gas_price_kept() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let _estimate = mock_method(&mut server, "eth_estimateGas", json!("0x5208")).await;
    let price = method_mock(&mut server, "eth_gasPrice", json!("0x1"))
        .expect(0)
        .create_async()
        .await;
    let _send = mock_method(&mut server, "eth_sendTransaction", json!("0xabc")).await;

    let (hooks, sent) = recording_hooks();
    let manager = manager_for(server.url(), None, hooks);
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();

    connection
        .request(send_transaction(json!({"gasPrice": "0x1000"})))
        .await
        .unwrap();

    let sent = sent.lock().unwrap();
    let tx = &sent.last().unwrap().params[0];
    assert_eq!(tx["gas"], json!("0x5208"));
    assert_eq!(tx["gasPrice"], json!("0x1000"));
    price.assert_async().await;
}

#[tokio::test]
async fn test_fixed_values_from_override() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let _send = mock_method(&mut server, "eth_sendTransaction", json!("0xabc")).await;

    let (hooks, sent) = recording_hooks();
    let manager = manager_for(server.url(), None, hooks);
    let connection = manager
        .connect(
            Some("remote"),
            None,
            Some(
                ConfigOverride::new()
                    .set("gas", 100_000)
                    .set("gasPrice", "0x2540be400"),
            ),
        )
        .await
        .unwrap();

    connection.request(send_transaction(json!({}))).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].params[0],
        json!({"gas": "0x186a0", "gasPrice": "0x2540be400"})
    );
}

// =============================================================================
// Hooks
// =============================================================================

struct AnswerLocally;

impl Handler<RequestEvent, Result<JsonRpcResponse, Error>> for AnswerLocally {
    fn handle<'a>(
        &'a self,
        (info, request): RequestEvent,
        _next: Next<'a, RequestEvent, Result<JsonRpcResponse, Error>>,
    ) -> BoxFuture<'a, Result<JsonRpcResponse, Error>> {
        Box::pin(async move {
            Ok(JsonRpcResponse {
                id: Some(request.id),
                payload: ResponsePayload::Success(json!(format!(
                    "{}:{}",
                    info.network_name, request.method
                ))),
            })
        })
    }
}

#[tokio::test]
async fn test_on_request_handler_can_answer() {
    init_tracing();
    let mut hooks = NetworkHooks::default();
    hooks.on_request.register(AnswerLocally);

    // Nothing listens here; the handler never calls through.
    let manager = manager_for("http://127.0.0.1:1".to_string(), None, hooks);
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();

    let result = connection
        .request(RequestArguments::method("web3_clientVersion"))
        .await
        .unwrap();
    assert_eq!(result, json!("remote:web3_clientVersion"));
}

struct CountCloses(Arc<AtomicUsize>);

impl Handler<ConnectionInfo, Result<(), Error>> for CountCloses {
    fn handle<'a>(
        &'a self,
        info: ConnectionInfo,
        next: Next<'a, ConnectionInfo, Result<(), Error>>,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
            next.run(info).await
        })
    }
}

#[tokio::test]
async fn test_close_connection_hook() {
    init_tracing();
    let closes = Arc::new(AtomicUsize::new(0));
    let mut hooks = NetworkHooks::default();
    hooks.close_connection.register(CountCloses(closes.clone()));

    let manager = manager_for("http://127.0.0.1:1".to_string(), None, hooks);
    let remote = manager.connect(Some("remote"), None, None).await.unwrap();
    let local = manager.connect_default().await.unwrap();

    remote.close().await.unwrap();
    local.close().await.unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_override_headers_sent() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("x-api-key", "secret")
        .with_status(200)
        .with_body(json!({"jsonrpc": "2.0", "id": 0, "result": "0x1"}).to_string())
        .create_async()
        .await;

    let manager = manager_for(server.url(), None, NetworkHooks::default());
    let connection = manager
        .connect(
            Some("remote"),
            None,
            Some(ConfigOverride::new().set("httpHeaders", json!({"X-Api-Key": "secret"}))),
        )
        .await
        .unwrap();

    connection
        .request(RequestArguments::method("eth_blockNumber"))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_surfaces() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let manager = manager_for(server.url(), None, NetworkHooks::default());
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();
    let err = connection
        .request(RequestArguments::method("eth_blockNumber"))
        .await
        .unwrap_err();
    match err {
        Error::Rpc(RpcError::Network { status_code, .. }) => assert_eq!(status_code, Some(500)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_batch_with_deadline() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let _chain_id = mock_method(&mut server, "eth_chainId", json!("0x1")).await;
    let _block_number = mock_method(&mut server, "eth_blockNumber", json!("0x10")).await;

    let manager = manager_for(server.url(), None, NetworkHooks::default());
    let connection = manager.connect(Some("remote"), None, None).await.unwrap();

    let results = with_deadline(
        std::time::Duration::from_secs(5),
        vec![
            (
                "chain id".to_string(),
                connection.request(RequestArguments::method("eth_chainId")),
            ),
            (
                "block".to_string(),
                connection.request(RequestArguments::method("eth_blockNumber")),
            ),
        ],
    )
    .await
    .unwrap();
    assert_eq!(results, vec![json!("0x1"), json!("0x10")]);
}
