//! Request rewriting applied to every call made through a connection.
//!
//! [`RequestModifier::apply`] runs three stages in order:
//!
//! 1. Gas: fill `gas` on `eth_sendTransaction` ([`GasStrategy`])
//! 2. Gas price: fill `gasPrice` on `eth_sendTransaction`
//!    ([`GasPriceStrategy`]); skipped for automatic pricing on local networks
//! 3. Chain id: for HTTP networks with a configured `chainId`, check the
//!    node's chain id ([`ChainIdValidator`]); never for `eth_chainId` or
//!    `net_version` themselves
//!
//! Strategies are created on first use and then kept for the lifetime of the
//! connection.

mod chain_id;
mod gas;

use std::sync::{Arc, OnceLock};

use crate::client::EthereumProvider;
use crate::error::Error;
use crate::types::{GasValue, JsonRpcRequest, NetworkConfig, TransportType};

pub use chain_id::ChainIdValidator;
pub use gas::{
    AutomaticGas, AutomaticGasPrice, FixedGas, FixedGasPrice, GasPriceStrategy, GasStrategy,
    PRICING_FIELDS,
};

const SEND_TRANSACTION: &str = "eth_sendTransaction";

/// Per-connection request pipeline.
pub struct RequestModifier {
    provider: Arc<dyn EthereumProvider>,
    config: NetworkConfig,
    gas: OnceLock<GasStrategy>,
    gas_price: OnceLock<Option<GasPriceStrategy>>,
    chain_id: OnceLock<Option<ChainIdValidator>>,
}

impl RequestModifier {
    /// Create a modifier that issues its auxiliary calls through `provider`.
    pub fn new(provider: Arc<dyn EthereumProvider>, config: NetworkConfig) -> Self {
        Self {
            provider,
            config,
            gas: OnceLock::new(),
            gas_price: OnceLock::new(),
            chain_id: OnceLock::new(),
        }
    }

    /// Return a rewritten copy of `request`. The input is left untouched.
    pub async fn apply(&self, request: &JsonRpcRequest) -> Result<JsonRpcRequest, Error> {
        let mut modified = request.clone();

        if modified.method == SEND_TRANSACTION {
            self.gas_strategy().apply(&mut modified).await?;
            if let Some(strategy) = self.gas_price_strategy() {
                strategy.apply(&mut modified).await?;
            }
        }

        if !matches!(modified.method.as_str(), "eth_chainId" | "net_version")
            && let Some(validator) = self.chain_id_validator()
        {
            validator.validate().await?;
        }

        Ok(modified)
    }

    pub fn gas_strategy(&self) -> &GasStrategy {
        self.gas.get_or_init(|| match self.config.gas() {
            GasValue::Auto => GasStrategy::Automatic(AutomaticGas::new(
                self.provider.clone(),
                self.config.gas_multiplier(),
            )),
            GasValue::Fixed(gas) => GasStrategy::Fixed(FixedGas::new(gas)),
        })
    }

    /// `None` when gas prices are left to the local chain.
    pub fn gas_price_strategy(&self) -> Option<&GasPriceStrategy> {
        self.gas_price
            .get_or_init(|| match (self.config.gas_price(), self.config.transport()) {
                (GasValue::Auto, TransportType::Local) => None,
                (GasValue::Auto, TransportType::Http) => Some(GasPriceStrategy::Automatic(
                    AutomaticGasPrice::new(self.provider.clone()),
                )),
                (GasValue::Fixed(price), _) => {
                    Some(GasPriceStrategy::Fixed(FixedGasPrice::new(price)))
                }
            })
            .as_ref()
    }

    /// `None` unless this is an HTTP network with a configured chain id.
    pub fn chain_id_validator(&self) -> Option<&ChainIdValidator> {
        self.chain_id
            .get_or_init(|| match &self.config {
                NetworkConfig::Http(http) => http
                    .chain_id
                    .map(|chain_id| ChainIdValidator::new(self.provider.clone(), chain_id)),
                NetworkConfig::Local(_) => None,
            })
            .as_ref()
    }
}
