//! Connections to local networks backed by the in-process dev chain.

use std::time::Duration;

use chain_connect::*;
use serde_json::{Value, json};

use crate::init_tracing;

const FIRST_DEV_ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const SECOND_DEV_ACCOUNT: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

async fn call(connection: &NetworkConnection, method: &str, params: Vec<Value>) -> Value {
    connection
        .request(RequestArguments::new(method, params))
        .await
        .unwrap()
}

async fn transfer(connection: &NetworkConnection, value: &str) -> Result<Value, Error> {
    connection
        .request(RequestArguments::new(
            "eth_sendTransaction",
            vec![json!({"from": FIRST_DEV_ACCOUNT, "to": SECOND_DEV_ACCOUNT, "value": value})],
        ))
        .await
}

#[tokio::test]
async fn test_transfer_on_default_network() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager.connect_default().await.unwrap();
    assert_eq!(connection.network_name(), "default");
    assert!(connection.network_config().is_local());

    let accounts = call(&connection, "eth_accounts", vec![]).await;
    assert_eq!(accounts, json!([FIRST_DEV_ACCOUNT, SECOND_DEV_ACCOUNT]));

    let hash = transfer(&connection, "0x1").await.unwrap();

    let tx = call(&connection, "eth_getTransactionByHash", vec![hash.clone()]).await;
    assert_eq!(tx["gas"], json!("0x5208"));
    assert_eq!(tx["value"], json!("0x1"));

    let receipt = call(&connection, "eth_getTransactionReceipt", vec![hash]).await;
    assert_eq!(receipt["status"], json!("0x1"));
    assert_eq!(receipt["gasUsed"], json!("0x5208"));
    assert_eq!(call(&connection, "eth_blockNumber", vec![]).await, json!("0x1"));

    connection.close().await.unwrap();
}

#[tokio::test]
async fn test_local_network_skips_gas_price_fill() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager.connect_default().await.unwrap();

    assert!(connection.modifier().gas_price_strategy().is_none());
    assert!(connection.modifier().chain_id_validator().is_none());
}

#[tokio::test]
async fn test_gas_multiplier_override() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager
        .connect(None, None, Some(ConfigOverride::new().set("gasMultiplier", 1.5)))
        .await
        .unwrap();

    let hash = transfer(&connection, "0x1").await.unwrap();
    let tx = call(&connection, "eth_getTransactionByHash", vec![hash]).await;
    // 21000 * 1.5, well under the block gas limit
    assert_eq!(tx["gas"], json!("0x7b0c"));
}

#[tokio::test]
async fn test_fixed_gas_price_override() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager
        .connect(None, None, Some(ConfigOverride::new().set("gasPrice", "0x77359400")))
        .await
        .unwrap();

    let hash = transfer(&connection, "0x0").await.unwrap();
    let tx = call(&connection, "eth_getTransactionByHash", vec![hash]).await;
    assert_eq!(tx["gasPrice"], json!("0x77359400"));
}

#[tokio::test]
async fn test_genesis_and_chain_id_overrides() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager
        .connect(
            None,
            None,
            Some(
                ConfigOverride::new().set("chainId", 1337).set(
                    "genesisAccounts",
                    json!([{
                        "privateKey": "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
                        "balance": "1000"
                    }]),
                ),
            ),
        )
        .await
        .unwrap();

    assert_eq!(call(&connection, "eth_chainId", vec![]).await, json!("0x539"));
    assert_eq!(
        call(&connection, "eth_accounts", vec![]).await,
        json!([FIRST_DEV_ACCOUNT])
    );
    assert_eq!(
        call(&connection, "eth_getBalance", vec![json!(FIRST_DEV_ACCOUNT), json!("latest")]).await,
        json!("0x3e8")
    );

    // The declared network is untouched by the override
    let plain = manager.connect_default().await.unwrap();
    assert_eq!(call(&plain, "eth_chainId", vec![]).await, json!("0x7a69"));
}

#[tokio::test]
async fn test_unsupported_method() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager.connect_default().await.unwrap();

    let err = connection
        .request(RequestArguments::method("debug_traceTransaction"))
        .await
        .unwrap_err();
    match err {
        Error::Rpc(RpcError::Rpc { code, message, .. }) => {
            assert_eq!(code, -32601);
            assert_eq!(message, "Method debug_traceTransaction is not supported");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_requests_after_close_fail() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager.connect_default().await.unwrap();
    connection.close().await.unwrap();

    let err = connection
        .request(RequestArguments::method("eth_blockNumber"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::Closed)));
}

#[tokio::test]
async fn test_requests_under_deadline() {
    init_tracing();
    let manager = NetworkManager::new(ManagerConfig::default());
    let connection = manager.connect_default().await.unwrap();

    let results = with_deadline(
        Duration::from_secs(5),
        vec![
            ("chain id".to_string(), connection.request(RequestArguments::method("eth_chainId"))),
            ("version".to_string(), connection.request(RequestArguments::method("net_version"))),
            ("block".to_string(), connection.request(RequestArguments::method("eth_blockNumber"))),
        ],
    )
    .await
    .unwrap();
    assert_eq!(results, vec![json!("0x7a69"), json!("31337"), json!("0x0")]);
}

#[tokio::test]
async fn test_manual_mining_from_user_config() {
    init_tracing();
    let user = UserConfig::from_json_str(
        r#"{
            "defaultNetwork": "manual",
            "networks": {
                "manual": { "type": "local", "automine": false }
            }
        }"#,
    )
    .unwrap();
    let manager = NetworkManager::from_user_config(user).unwrap();
    let connection = manager.connect_default().await.unwrap();
    assert_eq!(connection.network_name(), "manual");

    let hash = transfer(&connection, "0x1").await.unwrap();
    assert_eq!(
        call(&connection, "eth_getTransactionReceipt", vec![hash.clone()]).await,
        Value::Null
    );

    call(&connection, "evm_mine", vec![]).await;

    let receipt = call(&connection, "eth_getTransactionReceipt", vec![hash]).await;
    assert_eq!(receipt["status"], json!("0x1"));
    assert_eq!(receipt["blockNumber"], json!("0x1"));
}
