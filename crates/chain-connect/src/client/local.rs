//! Provider for an in-process chain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::client::EthereumProvider;
use crate::devchain::DevChain;
use crate::error::{Error, RpcError};
use crate::types::{LocalNetworkConfig, RequestArguments};

/// An embedded chain that answers JSON-RPC methods synchronously.
pub trait ChainEngine: Send + Sync {
    /// Handle one method call and return its result.
    fn handle(&self, method: &str, params: &[Value]) -> Result<Value, RpcError>;
}

/// Builds the engine behind a local connection from its configuration.
pub type EngineFactory =
    Arc<dyn Fn(&LocalNetworkConfig) -> Result<Arc<dyn ChainEngine>, Error> + Send + Sync>;

/// The factory used when none is configured: a fresh [`DevChain`].
pub fn default_engine_factory() -> EngineFactory {
    Arc::new(|config: &LocalNetworkConfig| -> Result<Arc<dyn ChainEngine>, Error> {
        Ok(Arc::new(DevChain::new(config)?))
    })
}

/// Provider backed by a [`ChainEngine`].
///
/// The configuration is consumed by the engine at construction time; the
/// provider itself only routes requests and tracks whether it was closed.
pub struct LocalProvider {
    engine: Arc<dyn ChainEngine>,
    closed: AtomicBool,
}

impl LocalProvider {
    pub fn new(engine: Arc<dyn ChainEngine>) -> Self {
        Self {
            engine,
            closed: AtomicBool::new(false),
        }
    }

    /// Build the engine with `factory` and wrap it.
    pub fn from_config(config: &LocalNetworkConfig, factory: &EngineFactory) -> Result<Self, Error> {
        debug!(chain_id = config.chain_id, hardfork = %config.hardfork, "creating local chain");
        Ok(Self::new(factory(config)?))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl EthereumProvider for LocalProvider {
    fn request(&self, args: RequestArguments) -> BoxFuture<'_, Result<Value, Error>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(RpcError::Closed.into());
            }
            let params = args.params_array()?;
            Ok(self.engine.handle(&args.method, &params)?)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.closed.store(true, Ordering::Release);
            Ok(())
        })
    }
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("closed", &self.is_closed())
            .finish()
    }
}
