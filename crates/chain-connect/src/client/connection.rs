//! A live connection to one network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::info;

use crate::client::EthereumProvider;
use crate::error::Error;
use crate::modifier::RequestModifier;
use crate::types::{ChainType, JsonRpcRequest, NetworkConfig, RequestArguments};

/// Describes a connection without owning its provider.
///
/// This is what hook handlers receive; it is cheap to clone.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionInfo {
    /// Unique per manager, allocated in connect order starting at 0.
    pub id: u64,
    pub network_name: String,
    pub chain_type: ChainType,
    /// The resolved configuration, overrides included.
    pub network_config: NetworkConfig,
}

/// Shuts a connection's provider down.
pub type CloseFn = Arc<
    dyn Fn(ConnectionInfo, Arc<dyn EthereumProvider>) -> BoxFuture<'static, Result<(), Error>>
        + Send
        + Sync,
>;

/// A connection to a network, returned by
/// [`NetworkManager::connect`](crate::NetworkManager::connect).
///
/// Every request goes through the connection's [`RequestModifier`] before
/// reaching the provider.
///
/// # Example
///
/// ```rust,no_run
/// use chain_connect::*;
///
/// # async fn example() -> Result<(), Error> {
/// let manager = NetworkManager::new(ManagerConfig::default());
/// let connection = manager.connect(Some("localhost"), None, None).await?;
///
/// let block = connection
///     .request(RequestArguments::method("eth_blockNumber"))
///     .await?;
/// println!("block: {}", block);
///
/// connection.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct NetworkConnection {
    info: ConnectionInfo,
    provider: Arc<dyn EthereumProvider>,
    modifier: OnceLock<RequestModifier>,
    close_fn: CloseFn,
    next_request_id: AtomicU64,
}

impl NetworkConnection {
    pub fn new(info: ConnectionInfo, provider: Arc<dyn EthereumProvider>, close_fn: CloseFn) -> Self {
        Self {
            info,
            provider,
            modifier: OnceLock::new(),
            close_fn,
            next_request_id: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.info.id
    }

    pub fn network_name(&self) -> &str {
        &self.info.network_name
    }

    pub fn chain_type(&self) -> ChainType {
        self.info.chain_type
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.info.network_config
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// The underlying provider, bypassing the request modifier.
    pub fn provider(&self) -> &Arc<dyn EthereumProvider> {
        &self.provider
    }

    /// The request modifier, created on first use.
    pub fn modifier(&self) -> &RequestModifier {
        self.modifier.get_or_init(|| {
            RequestModifier::new(self.provider.clone(), self.info.network_config.clone())
        })
    }

    /// Send a request through the modifier and the provider.
    pub async fn request(&self, args: RequestArguments) -> Result<Value, Error> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::from_arguments(id, &args)?;
        let modified = self.modifier().apply(&request).await?;
        self.provider.request(modified.into_arguments()).await
    }

    /// Close the connection, running the `closeConnection` hooks.
    pub async fn close(&self) -> Result<(), Error> {
        info!(id = self.info.id, network = %self.info.network_name, "closing connection");
        (self.close_fn)(self.info.clone(), self.provider.clone()).await
    }
}

impl std::fmt::Debug for NetworkConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConnection")
            .field("id", &self.info.id)
            .field("network_name", &self.info.network_name)
            .field("chain_type", &self.info.chain_type)
            .field("transport", &self.info.network_config.transport())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockProvider;
    use crate::types::{HttpNetworkConfig, LocalNetworkConfig};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn info(config: NetworkConfig) -> ConnectionInfo {
        ConnectionInfo {
            id: 7,
            network_name: "test".to_string(),
            chain_type: ChainType::Generic,
            network_config: config,
        }
    }

    fn closing(counter: Arc<AtomicUsize>) -> CloseFn {
        Arc::new(
            move |_info: ConnectionInfo,
                  provider: Arc<dyn EthereumProvider>|
                  -> BoxFuture<'static, Result<(), Error>> {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    provider.close().await
                })
            },
        )
    }

    #[tokio::test]
    async fn test_request_goes_through_modifier() {
        let mock = Arc::new(
            MockProvider::new()
                .respond("eth_estimateGas", json!("0x5208"))
                .respond("eth_sendTransaction", json!("0xabc")),
        );
        let connection = NetworkConnection::new(
            info(NetworkConfig::Local(LocalNetworkConfig::default())),
            mock.clone(),
            closing(Arc::new(AtomicUsize::new(0))),
        );

        let hash = connection
            .request(RequestArguments::new(
                "eth_sendTransaction",
                vec![json!({"from": "0x01"})],
            ))
            .await
            .unwrap();
        assert_eq!(hash, json!("0xabc"));

        let sent = mock
            .requests()
            .into_iter()
            .find(|args| args.method == "eth_sendTransaction")
            .unwrap();
        assert_eq!(sent.params, Some(json!([{"from": "0x01", "gas": "0x5208"}])));
    }

    #[tokio::test]
    async fn test_invalid_params_rejected() {
        let mock = Arc::new(MockProvider::new());
        let connection = NetworkConnection::new(
            info(NetworkConfig::Local(LocalNetworkConfig::default())),
            mock.clone(),
            closing(Arc::new(AtomicUsize::new(0))),
        );
        let args = RequestArguments {
            method: "eth_call".to_string(),
            params: Some(json!({"to": "0x0"})),
        };
        assert!(connection.request(args).await.is_err());
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_close_runs_close_fn() {
        let counter = Arc::new(AtomicUsize::new(0));
        let connection = NetworkConnection::new(
            info(NetworkConfig::Http(HttpNetworkConfig::new("http://localhost:8545"))),
            Arc::new(MockProvider::new()),
            closing(counter.clone()),
        );
        connection.close().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accessors() {
        let connection = NetworkConnection::new(
            info(NetworkConfig::Http(HttpNetworkConfig::new("http://localhost:8545"))),
            Arc::new(MockProvider::new()),
            closing(Arc::new(AtomicUsize::new(0))),
        );
        assert_eq!(connection.id(), 7);
        assert_eq!(connection.network_name(), "test");
        assert_eq!(connection.chain_type(), ChainType::Generic);
        assert!(connection.network_config().is_http());
        assert!(std::ptr::eq(connection.modifier(), connection.modifier()));
        assert!(format!("{:?}", connection).contains("Http"));
    }
}
