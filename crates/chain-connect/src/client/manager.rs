//! The network manager: the single entry point for opening connections.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use tracing::debug;

use crate::client::{
    CloseFn, ConnectionInfo, EngineFactory, EthereumProvider, HttpProviderBuilder, LocalProvider,
    NetworkConnection, RequestWrapper, SendFn, default_engine_factory,
};
use crate::error::Error;
use crate::hooks::{NetworkHooks, RequestEvent};
use crate::types::{
    ChainType, ConfigOverride, JsonRpcRequest, JsonRpcResponse, ManagerConfig, NetworkConfig,
    UserConfig,
};

/// Opens connections to the configured networks.
///
/// # Example
///
/// ```rust,no_run
/// use chain_connect::*;
///
/// # async fn example() -> Result<(), Error> {
/// let config = UserConfig::from_json_str(r#"{
///     "networks": {
///         "sepolia": { "type": "http", "url": "https://rpc.sepolia.org", "chainId": 11155111 }
///     }
/// }"#)?;
/// let manager = NetworkManager::from_user_config(config)?;
///
/// // Declared network, with a per-connection override
/// let sepolia = manager
///     .connect(Some("sepolia"), None, Some(ConfigOverride::new().set("timeout", 5_000)))
///     .await?;
///
/// // The default network: an in-process development chain
/// let local = manager.connect_default().await?;
/// # Ok(())
/// # }
/// ```
pub struct NetworkManager {
    default_network: String,
    default_chain_type: ChainType,
    networks: BTreeMap<String, NetworkConfig>,
    hooks: Arc<NetworkHooks>,
    engine_factory: EngineFactory,
    next_connection_id: AtomicU64,
}

impl NetworkManager {
    /// Create a manager with no hook handlers and the default local engine.
    pub fn new(config: ManagerConfig) -> Self {
        Self::builder(config).build()
    }

    /// Resolve a user configuration and create a manager for it.
    pub fn from_user_config(config: UserConfig) -> Result<Self, Error> {
        Ok(Self::new(config.resolve()?))
    }

    pub fn builder(config: ManagerConfig) -> NetworkManagerBuilder {
        NetworkManagerBuilder::new(config)
    }

    pub fn default_network(&self) -> &str {
        &self.default_network
    }

    pub fn default_chain_type(&self) -> ChainType {
        self.default_chain_type
    }

    /// The declared configuration of a network, before overrides.
    pub fn network_config(&self, network_name: &str) -> Option<&NetworkConfig> {
        self.networks.get(network_name)
    }

    /// Names of all declared networks.
    pub fn network_names(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    /// Connect to the default network with its declared configuration.
    pub async fn connect_default(&self) -> Result<NetworkConnection, Error> {
        self.connect(None, None, None).await
    }

    /// Open a connection.
    ///
    /// - `network_name` defaults to the manager's default network.
    /// - `chain_type` defaults to the network's declared chain type, then to
    ///   the manager's default chain type.
    /// - `config_override` is shallow-merged over the declared configuration
    ///   and the result is validated.
    ///
    /// # Errors
    ///
    /// - [`Error::NetworkNotFound`] if the network is not declared
    /// - [`Error::InvalidConfigOverride`] if the override changes the network
    ///   type or the merged configuration is invalid
    /// - [`Error::InvalidChainType`] if the requested chain type conflicts
    ///   with the network's declared one
    /// - whatever the provider construction or a `newConnection` handler
    ///   returns
    pub async fn connect(
        &self,
        network_name: Option<&str>,
        chain_type: Option<ChainType>,
        config_override: Option<ConfigOverride>,
    ) -> Result<NetworkConnection, Error> {
        let network_name = network_name.unwrap_or(&self.default_network);
        let declared =
            self.networks
                .get(network_name)
                .ok_or_else(|| Error::NetworkNotFound {
                    network_name: network_name.to_string(),
                })?;

        let network_config = match &config_override {
            Some(config_override) => declared.with_override(config_override)?,
            None => declared.clone(),
        };

        let declared_chain_type = network_config.chain_type();
        let resolved_chain_type = chain_type
            .or(declared_chain_type)
            .unwrap_or(self.default_chain_type);
        if let Some(network_chain_type) = declared_chain_type
            && network_chain_type != resolved_chain_type
        {
            return Err(Error::InvalidChainType {
                network_name: network_name.to_string(),
                chain_type: resolved_chain_type,
                network_chain_type,
            });
        }

        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            id,
            network = %network_name,
            chain_type = %resolved_chain_type,
            transport = %network_config.transport(),
            "connecting"
        );

        let info = ConnectionInfo {
            id,
            network_name: network_name.to_string(),
            chain_type: resolved_chain_type,
            network_config,
        };

        let hooks = self.hooks.clone();
        let engine_factory = self.engine_factory.clone();
        self.hooks
            .new_connection
            .run(
                info,
                move |info: ConnectionInfo| -> BoxFuture<'static, Result<NetworkConnection, Error>> {
                    let result = create_connection(info, hooks.clone(), &engine_factory);
                    Box::pin(async move { result })
                },
            )
            .await
    }
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkManager")
            .field("default_network", &self.default_network)
            .field("default_chain_type", &self.default_chain_type)
            .field("networks", &self.networks.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Build the provider for `info` and wrap it in a connection.
fn create_connection(
    info: ConnectionInfo,
    hooks: Arc<NetworkHooks>,
    engine_factory: &EngineFactory,
) -> Result<NetworkConnection, Error> {
    let provider: Arc<dyn EthereumProvider> = match &info.network_config {
        NetworkConfig::Http(config) => Arc::new(
            HttpProviderBuilder::from_config(config)
                .request_wrapper(on_request_wrapper(hooks.clone(), info.clone()))
                .build()?,
        ),
        NetworkConfig::Local(config) => Arc::new(LocalProvider::from_config(config, engine_factory)?),
    };
    Ok(NetworkConnection::new(info, provider, close_routine(hooks)))
}

/// Route every outgoing HTTP request through the `onRequest` handlers.
fn on_request_wrapper(hooks: Arc<NetworkHooks>, info: ConnectionInfo) -> RequestWrapper {
    Arc::new(
        move |request: JsonRpcRequest,
              send: SendFn|
              -> BoxFuture<'static, Result<JsonRpcResponse, Error>> {
            let hooks = hooks.clone();
            let info = info.clone();
            Box::pin(async move {
                hooks
                    .on_request
                    .run(
                        (info, request),
                        move |(_, request): RequestEvent| -> BoxFuture<'static, Result<JsonRpcResponse, Error>> {
                            send(request)
                        },
                    )
                    .await
            })
        },
    )
}

/// Close the provider behind the `closeConnection` handlers.
fn close_routine(hooks: Arc<NetworkHooks>) -> CloseFn {
    Arc::new(
        move |info: ConnectionInfo,
              provider: Arc<dyn EthereumProvider>|
              -> BoxFuture<'static, Result<(), Error>> {
            let hooks = hooks.clone();
            Box::pin(async move {
                hooks
                    .close_connection
                    .run(
                        info,
                        move |_: ConnectionInfo| -> BoxFuture<'static, Result<(), Error>> {
                            let provider = provider.clone();
                            Box::pin(async move { provider.close().await })
                        },
                    )
                    .await
            })
        },
    )
}

/// Builder for [`NetworkManager`].
pub struct NetworkManagerBuilder {
    config: ManagerConfig,
    hooks: NetworkHooks,
    engine_factory: EngineFactory,
}

impl NetworkManagerBuilder {
    fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            hooks: NetworkHooks::default(),
            engine_factory: default_engine_factory(),
        }
    }

    /// Set the lifecycle hook handlers.
    pub fn hooks(mut self, hooks: NetworkHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the factory that builds engines for local networks.
    pub fn engine_factory(mut self, engine_factory: EngineFactory) -> Self {
        self.engine_factory = engine_factory;
        self
    }

    pub fn build(self) -> NetworkManager {
        NetworkManager {
            default_network: self.config.default_network,
            default_chain_type: self.config.default_chain_type,
            networks: self.config.networks,
            hooks: Arc::new(self.hooks),
            engine_factory: self.engine_factory,
            next_connection_id: AtomicU64::new(0),
        }
    }
}
