//! Network configuration.
//!
//! A [`NetworkConfig`] is either an HTTP endpoint or a locally embedded chain.
//! Declared configurations come from a [`UserConfig`], which fills defaults
//! and adds the built-in `localhost` and `default` networks when resolved
//! into a [`ManagerConfig`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::quantity::{GasValue, u256_serde};
use super::schema::validate_network_config;
use crate::error::{Error, ValidationIssue};

/// Name of the built-in local network, also the default network.
pub const DEFAULT_NETWORK_NAME: &str = "default";

/// Name of the built-in HTTP network pointing at a node on this machine.
pub const LOCALHOST_NETWORK_NAME: &str = "localhost";

/// URL used for `localhost` unless the user overrides it.
pub const LOCALHOST_URL: &str = "http://localhost:8545";

/// Environment variable overriding the default network name.
pub const NETWORK_ENV_VAR: &str = "CHAIN_CONNECT_NETWORK";

// ============================================================================
// ChainType
// ============================================================================

/// The flavour of chain a connection talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// Ethereum mainnet-like L1.
    L1,
    /// OP-stack chains.
    Optimism,
    /// Unknown or generic EVM chain.
    #[default]
    Generic,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::L1 => "l1",
            ChainType::Optimism => "optimism",
            ChainType::Generic => "generic",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l1" => Ok(ChainType::L1),
            "optimism" => Ok(ChainType::Optimism),
            "generic" => Ok(ChainType::Generic),
            other => Err(Error::Config(format!("Unknown chain type '{other}'"))),
        }
    }
}

// ============================================================================
// Network configs
// ============================================================================

/// Transport kind of a network configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportType {
    Http,
    Local,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Http => "http",
            TransportType::Local => "local",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved network configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NetworkConfig {
    Http(HttpNetworkConfig),
    Local(LocalNetworkConfig),
}

/// Configuration of a remote node reached over HTTP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpNetworkConfig {
    pub url: String,
    /// Expected chain id; validated against the node on first use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<ChainType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub http_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub gas: GasValue,
    #[serde(default)]
    pub gas_price: GasValue,
    #[serde(default = "default_gas_multiplier")]
    pub gas_multiplier: f64,
}

impl HttpNetworkConfig {
    /// A config for `url` with every other field defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            chain_id: None,
            chain_type: None,
            from: None,
            timeout: default_timeout(),
            http_headers: BTreeMap::new(),
            gas: GasValue::Auto,
            gas_price: GasValue::Auto,
            gas_multiplier: default_gas_multiplier(),
        }
    }
}

/// Interval mining: a fixed period or a random period within a range, in
/// milliseconds. Zero disables it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntervalMining {
    Fixed(u64),
    Range([u64; 2]),
}

impl Default for IntervalMining {
    fn default() -> Self {
        IntervalMining::Fixed(0)
    }
}

/// Ordering of pending transactions in the local mempool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MempoolOrder {
    #[default]
    Fifo,
    Priority,
}

/// An account funded at genesis on the local chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisAccount {
    /// 0x-prefixed secp256k1 private key.
    pub private_key: String,
    #[serde(with = "u256_serde")]
    pub balance: U256,
}

/// Configuration of the locally embedded chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNetworkConfig {
    #[serde(default = "default_local_chain_id")]
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<ChainType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Defaults to the chain id when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<u64>,
    #[serde(default = "default_hardfork")]
    pub hardfork: String,
    #[serde(default = "default_block_gas_limit")]
    pub block_gas_limit: u64,
    #[serde(default, with = "u256_serde")]
    pub min_gas_price: U256,
    #[serde(default = "default_true")]
    pub automine: bool,
    #[serde(default)]
    pub interval_mining: IntervalMining,
    #[serde(default)]
    pub mempool_order: MempoolOrder,
    #[serde(default)]
    pub genesis_accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub gas: GasValue,
    #[serde(default)]
    pub gas_price: GasValue,
    #[serde(default = "default_gas_multiplier")]
    pub gas_multiplier: f64,
    #[serde(default)]
    pub allow_unlimited_contract_size: bool,
    #[serde(default = "default_true")]
    pub throw_on_transaction_failures: bool,
    #[serde(default = "default_true")]
    pub throw_on_call_failures: bool,
    #[serde(default)]
    pub allow_blocks_with_same_timestamp: bool,
    #[serde(default)]
    pub enable_transient_storage: bool,
    #[serde(default)]
    pub enable_rip7212: bool,
}

impl LocalNetworkConfig {
    /// The network id, falling back to the chain id.
    pub fn network_id(&self) -> u64 {
        self.network_id.unwrap_or(self.chain_id)
    }
}

impl Default for LocalNetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: default_local_chain_id(),
            chain_type: None,
            from: None,
            network_id: None,
            hardfork: default_hardfork(),
            block_gas_limit: default_block_gas_limit(),
            min_gas_price: U256::ZERO,
            automine: true,
            interval_mining: IntervalMining::default(),
            mempool_order: MempoolOrder::default(),
            genesis_accounts: Vec::new(),
            gas: GasValue::Auto,
            gas_price: GasValue::Auto,
            gas_multiplier: default_gas_multiplier(),
            allow_unlimited_contract_size: false,
            throw_on_transaction_failures: true,
            throw_on_call_failures: true,
            allow_blocks_with_same_timestamp: false,
            enable_transient_storage: false,
            enable_rip7212: false,
        }
    }
}

fn default_timeout() -> u64 {
    20_000
}

fn default_gas_multiplier() -> f64 {
    1.0
}

fn default_local_chain_id() -> u64 {
    31337
}

fn default_hardfork() -> String {
    "cancun".to_string()
}

fn default_block_gas_limit() -> u64 {
    12_500_000
}

fn default_true() -> bool {
    true
}

impl NetworkConfig {
    pub fn transport(&self) -> TransportType {
        match self {
            NetworkConfig::Http(_) => TransportType::Http,
            NetworkConfig::Local(_) => TransportType::Local,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, NetworkConfig::Http(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, NetworkConfig::Local(_))
    }

    /// Configured chain id. Always present for local networks.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            NetworkConfig::Http(c) => c.chain_id,
            NetworkConfig::Local(c) => Some(c.chain_id),
        }
    }

    pub fn chain_type(&self) -> Option<ChainType> {
        match self {
            NetworkConfig::Http(c) => c.chain_type,
            NetworkConfig::Local(c) => c.chain_type,
        }
    }

    pub fn gas(&self) -> GasValue {
        match self {
            NetworkConfig::Http(c) => c.gas,
            NetworkConfig::Local(c) => c.gas,
        }
    }

    pub fn gas_price(&self) -> GasValue {
        match self {
            NetworkConfig::Http(c) => c.gas_price,
            NetworkConfig::Local(c) => c.gas_price,
        }
    }

    pub fn gas_multiplier(&self) -> f64 {
        match self {
            NetworkConfig::Http(c) => c.gas_multiplier,
            NetworkConfig::Local(c) => c.gas_multiplier,
        }
    }

    /// Apply a partial override on top of this config.
    ///
    /// The override may not change the transport type. Each key replaces the
    /// declared value wholesale; nested records and arrays are not merged.
    /// The merged result is validated against the schema of its transport.
    pub fn with_override(&self, config_override: &ConfigOverride) -> Result<NetworkConfig, Error> {
        if let Some(tag) = config_override.get("type")
            && tag.as_str() != Some(self.transport().as_str())
        {
            return Err(Error::config_override("The type of the network cannot be changed."));
        }

        let mut merged = match serde_json::to_value(self)? {
            Value::Object(object) => object,
            _ => return Err(Error::Config("network config must serialize to an object".into())),
        };
        for (key, value) in config_override.iter() {
            merged.insert(key.clone(), value.clone());
        }
        let merged = Value::Object(merged);

        let errors = validate_network_config(&merged);
        if !errors.is_empty() {
            return Err(Error::InvalidConfigOverride { errors });
        }

        serde_json::from_value(merged).map_err(|e| Error::InvalidConfigOverride {
            errors: vec![ValidationIssue::new(Vec::new(), e.to_string())],
        })
    }
}

impl From<HttpNetworkConfig> for NetworkConfig {
    fn from(config: HttpNetworkConfig) -> Self {
        NetworkConfig::Http(config)
    }
}

impl From<LocalNetworkConfig> for NetworkConfig {
    fn from(config: LocalNetworkConfig) -> Self {
        NetworkConfig::Local(config)
    }
}

// ============================================================================
// ConfigOverride
// ============================================================================

/// A partial network configuration applied on top of a declared one at
/// connect time. Keys use the same camelCase names as the config itself.
///
/// # Example
///
/// ```
/// use chain_connect::ConfigOverride;
///
/// let config_override = ConfigOverride::new()
///     .set("timeout", 5_000)
///     .set("gasPrice", "0x3b9aca00");
/// assert_eq!(config_override.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigOverride(Map<String, Value>);

impl ConfigOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Build an override from a JSON object.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(object) => Ok(Self(object)),
            _ => Err(Error::config_override("Expected an object")),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ConfigOverride {
    fn from(object: Map<String, Value>) -> Self {
        Self(object)
    }
}

// ============================================================================
// Manager configuration
// ============================================================================

/// Resolved configuration consumed by the network manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    pub default_network: String,
    pub default_chain_type: ChainType,
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for ManagerConfig {
    /// Only the built-in networks.
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            LOCALHOST_NETWORK_NAME.to_string(),
            NetworkConfig::Http(HttpNetworkConfig::new(LOCALHOST_URL)),
        );
        networks.insert(DEFAULT_NETWORK_NAME.to_string(), builtin_local_network());
        Self {
            default_network: DEFAULT_NETWORK_NAME.to_string(),
            default_chain_type: ChainType::default(),
            networks,
        }
    }
}

fn builtin_local_network() -> NetworkConfig {
    NetworkConfig::Local(LocalNetworkConfig {
        chain_type: Some(ChainType::L1),
        ..LocalNetworkConfig::default()
    })
}

/// User-facing configuration, before defaults are applied.
///
/// Networks are kept as raw JSON so that unknown transport types and schema
/// violations can be reported with the offending network's name.
///
/// # Example
///
/// ```
/// use chain_connect::UserConfig;
/// use serde_json::json;
///
/// let user: UserConfig = serde_json::from_value(json!({
///     "defaultNetwork": "sepolia",
///     "networks": {
///         "sepolia": { "type": "http", "url": "https://rpc.sepolia.org", "chainId": 11155111 }
///     }
/// })).unwrap();
///
/// let config = user.resolve().unwrap();
/// assert_eq!(config.default_network, "sepolia");
/// assert!(config.networks.contains_key("localhost"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_chain_type: Option<ChainType>,
    #[serde(default)]
    pub networks: BTreeMap<String, Value>,
}

impl UserConfig {
    /// Parse a user config from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply environment overrides.
    ///
    /// Reads `CHAIN_CONNECT_NETWORK` (optional): replaces the default network.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(network) = std::env::var(NETWORK_ENV_VAR)
            && !network.is_empty()
        {
            self.default_network = Some(network);
        }
        self
    }

    /// Validate every network, fill defaults, and add the built-in networks.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidNetworkType`] if a network's `type` is neither
    ///   `"http"` nor `"local"`
    /// - [`Error::InvalidNetworkConfig`] if a network fails schema validation
    pub fn resolve(self) -> Result<ManagerConfig, Error> {
        let mut user_networks = self.networks;

        // `localhost` keeps the user's fields but is always an HTTP network.
        let mut localhost = match user_networks.remove(LOCALHOST_NETWORK_NAME) {
            Some(Value::Object(object)) => object,
            _ => Map::new(),
        };
        localhost
            .entry("url")
            .or_insert_with(|| Value::String(LOCALHOST_URL.to_string()));
        localhost.insert("type".to_string(), Value::String("http".to_string()));
        user_networks.insert(LOCALHOST_NETWORK_NAME.to_string(), Value::Object(localhost));

        let mut networks = BTreeMap::new();
        for (network_name, raw) in user_networks {
            let network_type = raw.get("type").cloned().unwrap_or(Value::Null);
            if network_type != "http" && network_type != "local" {
                return Err(Error::InvalidNetworkType {
                    network_name,
                    network_type: match network_type {
                        Value::String(s) => s,
                        other => other.to_string(),
                    },
                });
            }

            let errors = validate_network_config(&raw);
            if !errors.is_empty() {
                return Err(Error::InvalidNetworkConfig {
                    network_name,
                    errors,
                });
            }

            let config: NetworkConfig =
                serde_json::from_value(raw).map_err(|e| Error::InvalidNetworkConfig {
                    network_name: network_name.clone(),
                    errors: vec![ValidationIssue::new(Vec::new(), e.to_string())],
                })?;
            networks.insert(network_name, config);
        }

        networks
            .entry(DEFAULT_NETWORK_NAME.to_string())
            .or_insert_with(builtin_local_network);

        Ok(ManagerConfig {
            default_network: self
                .default_network
                .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string()),
            default_chain_type: self.default_chain_type.unwrap_or_default(),
            networks,
        })
    }
}
