//! Validation of the remote chain id against the configured one.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::client::EthereumProvider;
use crate::error::Error;
use crate::types::{RequestArguments, parse_u64_value};

/// Checks that the node behind a connection serves the configured chain.
///
/// The reported chain id is fetched once and memoized. Concurrent callers
/// share a single in-flight fetch; a failed fetch is not memoized, so the
/// next call tries again.
pub struct ChainIdValidator {
    provider: Arc<dyn EthereumProvider>,
    configured: u64,
    reported: OnceCell<u64>,
}

impl ChainIdValidator {
    pub fn new(provider: Arc<dyn EthereumProvider>, configured: u64) -> Self {
        Self {
            provider,
            configured,
            reported: OnceCell::new(),
        }
    }

    /// The chain id from the network configuration.
    pub fn configured(&self) -> u64 {
        self.configured
    }

    /// The chain id reported by the node, if already fetched.
    pub fn reported(&self) -> Option<u64> {
        self.reported.get().copied()
    }

    /// Fail with [`Error::InvalidGlobalChainId`] unless the node reports the
    /// configured chain id.
    pub async fn validate(&self) -> Result<(), Error> {
        let reported = *self
            .reported
            .get_or_try_init(|| self.fetch_chain_id())
            .await?;

        if reported != self.configured {
            return Err(Error::InvalidGlobalChainId {
                configured: self.configured,
                reported,
            });
        }
        Ok(())
    }

    async fn fetch_chain_id(&self) -> Result<u64, Error> {
        match self.request_u64("eth_chainId").await {
            Ok(chain_id) => {
                debug!(chain_id, "fetched chain id");
                Ok(chain_id)
            }
            Err(e) => {
                warn!(error = %e, "eth_chainId failed, falling back to net_version");
                let chain_id = self.request_u64("net_version").await?;
                debug!(chain_id, "fetched chain id from net_version");
                Ok(chain_id)
            }
        }
    }

    async fn request_u64(&self, method: &str) -> Result<u64, Error> {
        let value = self.provider.request(RequestArguments::method(method)).await?;
        Ok(parse_u64_value(&value)?)
    }
}
