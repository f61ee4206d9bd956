//! Gas and gas-price filling for outgoing transactions.
//!
//! Every strategy is a no-op when the transaction already carries the field
//! it would fill. Filled values are written as minimal `0x` quantities.

use std::sync::Arc;

use alloy_primitives::U256;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::client::EthereumProvider;
use crate::error::{Error, RpcError};
use crate::types::{JsonRpcRequest, RequestArguments, parse_integer_value, to_quantity};

/// Fields that mean the caller already chose a pricing model.
pub const PRICING_FIELDS: [&str; 3] = ["gasPrice", "maxFeePerGas", "maxPriorityFeePerGas"];

// ============================================================================
// Gas
// ============================================================================

/// Fills `gas` from the node's estimate.
///
/// With a multiplier other than 1, the estimate is scaled (rounded down) and
/// capped at the gas limit of the latest block.
pub struct AutomaticGas {
    provider: Arc<dyn EthereumProvider>,
    gas_multiplier: f64,
}

impl AutomaticGas {
    pub fn new(provider: Arc<dyn EthereumProvider>, gas_multiplier: f64) -> Self {
        Self {
            provider,
            gas_multiplier,
        }
    }

    pub async fn apply(&self, request: &mut JsonRpcRequest) -> Result<(), Error> {
        let Some(tx) = request.transaction_mut() else {
            return Ok(());
        };
        if tx.contains_key("gas") {
            return Ok(());
        }

        let gas = self.estimate(Value::Object(tx.clone())).await?;
        debug!(gas = %gas, "filled gas from estimate");
        tx.insert("gas".to_string(), json!(to_quantity(gas)));
        Ok(())
    }

    async fn estimate(&self, tx: Value) -> Result<U256, Error> {
        let estimate = self
            .provider
            .request(RequestArguments::new("eth_estimateGas", vec![tx]))
            .await?;
        let estimate = parse_integer_value(&estimate)?;

        if self.gas_multiplier == 1.0 {
            return Ok(estimate);
        }

        let estimate = u64::try_from(estimate)
            .map_err(|_| RpcError::InvalidQuantity(to_quantity(estimate)))?;
        let scaled = U256::from((estimate as f64 * self.gas_multiplier).floor() as u64);

        let block = self
            .provider
            .request(RequestArguments::new(
                "eth_getBlockByNumber",
                vec![json!("latest"), json!(false)],
            ))
            .await?;
        let block_gas_limit = block
            .get("gasLimit")
            .ok_or_else(|| {
                RpcError::InvalidResponse("Latest block has no gasLimit".to_string())
            })
            .and_then(parse_integer_value)?;

        Ok(scaled.min(block_gas_limit))
    }
}

/// Fills `gas` with a configured value.
pub struct FixedGas {
    gas: String,
}

impl FixedGas {
    pub fn new(gas: U256) -> Self {
        Self {
            gas: to_quantity(gas),
        }
    }

    pub fn apply(&self, request: &mut JsonRpcRequest) {
        if let Some(tx) = request.transaction_mut() {
            tx.entry("gas").or_insert_with(|| json!(self.gas));
        }
    }
}

/// How `gas` is filled for a connection.
pub enum GasStrategy {
    Automatic(AutomaticGas),
    Fixed(FixedGas),
}

impl GasStrategy {
    pub async fn apply(&self, request: &mut JsonRpcRequest) -> Result<(), Error> {
        match self {
            GasStrategy::Automatic(strategy) => strategy.apply(request).await,
            GasStrategy::Fixed(strategy) => {
                strategy.apply(request);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Gas price
// ============================================================================

fn has_pricing(tx: &Map<String, Value>) -> bool {
    PRICING_FIELDS.iter().any(|field| tx.contains_key(*field))
}

/// Fills `gasPrice` from `eth_gasPrice`.
pub struct AutomaticGasPrice {
    provider: Arc<dyn EthereumProvider>,
}

impl AutomaticGasPrice {
    pub fn new(provider: Arc<dyn EthereumProvider>) -> Self {
        Self { provider }
    }

    pub async fn apply(&self, request: &mut JsonRpcRequest) -> Result<(), Error> {
        let Some(tx) = request.transaction_mut() else {
            return Ok(());
        };
        if has_pricing(tx) {
            return Ok(());
        }

        let price = self
            .provider
            .request(RequestArguments::method("eth_gasPrice"))
            .await?;
        let price = parse_integer_value(&price)?;
        debug!(gas_price = %price, "filled gas price");
        tx.insert("gasPrice".to_string(), json!(to_quantity(price)));
        Ok(())
    }
}

/// Fills `gasPrice` with a configured value.
pub struct FixedGasPrice {
    gas_price: String,
}

impl FixedGasPrice {
    pub fn new(gas_price: U256) -> Self {
        Self {
            gas_price: to_quantity(gas_price),
        }
    }

    pub fn apply(&self, request: &mut JsonRpcRequest) {
        if let Some(tx) = request.transaction_mut()
            && !has_pricing(tx)
        {
            tx.insert("gasPrice".to_string(), json!(self.gas_price));
        }
    }
}

/// How `gasPrice` is filled for a connection.
pub enum GasPriceStrategy {
    Automatic(AutomaticGasPrice),
    Fixed(FixedGasPrice),
}

impl GasPriceStrategy {
    pub async fn apply(&self, request: &mut JsonRpcRequest) -> Result<(), Error> {
        match self {
            GasPriceStrategy::Automatic(strategy) => strategy.apply(request).await,
            GasPriceStrategy::Fixed(strategy) => {
                strategy.apply(request);
                Ok(())
            }
        }
    }
}
