//! A small in-process development chain.
//!
//! [`DevChain`] is the engine behind `local` networks unless another
//! [`EngineFactory`](crate::EngineFactory) is configured. It tracks balances
//! and nonces of the funded accounts and mines value transfers into blocks.
//! No EVM bytecode executes: contract creations and calls only pay their
//! intrinsic gas.
//!
//! # Example
//!
//! ```rust
//! use chain_connect::{ChainEngine, DevChain, LocalNetworkConfig};
//!
//! let chain = DevChain::new(&LocalNetworkConfig::default()).unwrap();
//! let chain_id = chain.handle("eth_chainId", &[]).unwrap();
//! assert_eq!(chain_id, "0x7a69");
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, U256};
use k256::ecdsa::SigningKey;
use serde_json::{Map, Value, json};
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::client::ChainEngine;
use crate::error::{Error, RpcError};
use crate::types::{
    GenesisAccount, LocalNetworkConfig, MempoolOrder, parse_integer_value, parse_u64_quantity,
    to_quantity, u64_to_quantity,
};

// ─── Error codes ───
const INVALID_INPUT: i64 = -32000;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

// ─── Gas schedule ───
const TX_GAS: u64 = 21_000;
const TX_CREATE_GAS: u64 = 32_000;
const TX_DATA_ZERO_GAS: u64 = 4;
const TX_DATA_NON_ZERO_GAS: u64 = 16;
const MAX_INITCODE_SIZE: usize = 49_152;
const ONE_GWEI: u64 = 1_000_000_000;

const CLIENT_VERSION: &str = concat!("chain-connect-devchain/", env!("CARGO_PKG_VERSION"));

/// Private keys funded when a local network declares no genesis accounts.
pub const DEFAULT_DEV_KEYS: [&str; 2] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
];

/// 10000 ETH in wei.
const DEFAULT_DEV_BALANCE: u128 = 10_000_000_000_000_000_000_000;

/// Derive the address controlled by a hex-encoded secp256k1 private key.
pub fn address_from_private_key(private_key: &str) -> Result<Address, Error> {
    let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
    let bytes = hex::decode(digits)
        .map_err(|e| Error::Config(format!("Invalid private key encoding: {}", e)))?;
    let signing_key = SigningKey::from_slice(&bytes)
        .map_err(|_| Error::Config("Invalid secp256k1 private key".to_string()))?;

    let point = signing_key.verifying_key().to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Gas charged before any execution: the base cost plus calldata.
pub fn intrinsic_gas(input: &[u8], is_create: bool) -> u64 {
    let data: u64 = input
        .iter()
        .map(|&b| {
            if b == 0 {
                TX_DATA_ZERO_GAS
            } else {
                TX_DATA_NON_ZERO_GAS
            }
        })
        .sum();
    let create = if is_create { TX_CREATE_GAS } else { 0 };
    TX_GAS + data + create
}

fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn keccak_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn invalid_params(message: impl Into<String>) -> RpcError {
    RpcError::rpc(INVALID_PARAMS, message)
}

fn invalid_input(message: impl Into<String>) -> RpcError {
    RpcError::rpc(INVALID_INPUT, message)
}

// ============================================================================
// Chain state
// ============================================================================

#[derive(Debug, Default, Clone)]
struct Account {
    balance: U256,
    nonce: u64,
}

#[derive(Debug, Clone)]
struct Block {
    number: u64,
    timestamp: u64,
    gas_used: u64,
    transactions: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredTransaction {
    hash: String,
    from: Address,
    to: Option<Address>,
    value: U256,
    gas: u64,
    gas_price: U256,
    nonce: u64,
    input: Vec<u8>,
    gas_used: u64,
    block_number: Option<u64>,
    /// `None` while pending.
    success: Option<bool>,
}

#[derive(Debug)]
struct ChainState {
    accounts: HashMap<Address, Account>,
    blocks: Vec<Block>,
    pending: Vec<String>,
    transactions: HashMap<String, StoredTransaction>,
}

impl ChainState {
    fn head(&self) -> &Block {
        // The genesis block is created with the state and never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Mine every pending transaction into a new block.
    fn mine(&mut self, order: MempoolOrder, allow_same_timestamp: bool) -> u64 {
        let parent = self.head();
        let number = parent.number + 1;
        let timestamp = next_timestamp(parent.timestamp, allow_same_timestamp);

        let mut pending = std::mem::take(&mut self.pending);
        if order == MempoolOrder::Priority {
            // Stable sort: FIFO among equal prices.
            pending.sort_by(|a, b| {
                let price = |hash: &String| self.transactions.get(hash).map(|tx| tx.gas_price);
                price(b).cmp(&price(a))
            });
        }

        let mut gas_used = 0;
        for hash in &pending {
            gas_used += self.execute(hash, number);
        }

        self.blocks.push(Block {
            number,
            timestamp,
            gas_used,
            transactions: pending,
        });
        number
    }

    /// Apply a transaction's fee and value transfer. Returns the gas used.
    fn execute(&mut self, hash: &str, block_number: u64) -> u64 {
        let Some(tx) = self.transactions.get_mut(hash) else {
            return 0;
        };

        let fee = U256::from(tx.gas_used).saturating_mul(tx.gas_price);
        let sender = self.accounts.entry(tx.from).or_default();
        let remaining = sender.balance.saturating_sub(fee);
        let success = remaining >= tx.value;
        sender.balance = if success {
            remaining - tx.value
        } else {
            remaining
        };

        if success && let Some(to) = tx.to {
            let recipient = self.accounts.entry(to).or_default();
            recipient.balance = recipient.balance.saturating_add(tx.value);
        }

        tx.block_number = Some(block_number);
        tx.success = Some(success);
        tx.gas_used
    }
}

fn next_timestamp(parent: u64, allow_same_timestamp: bool) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    if allow_same_timestamp {
        now.max(parent)
    } else {
        now.max(parent + 1)
    }
}

// ============================================================================
// DevChain
// ============================================================================

/// The default [`ChainEngine`].
pub struct DevChain {
    config: LocalNetworkConfig,
    addresses: Vec<Address>,
    state: Mutex<ChainState>,
}

impl DevChain {
    /// Create a chain with the configured genesis accounts funded.
    pub fn new(config: &LocalNetworkConfig) -> Result<Self, Error> {
        let genesis: Vec<GenesisAccount> = if config.genesis_accounts.is_empty() {
            DEFAULT_DEV_KEYS
                .iter()
                .map(|key| GenesisAccount {
                    private_key: key.to_string(),
                    balance: U256::from(DEFAULT_DEV_BALANCE),
                })
                .collect()
        } else {
            config.genesis_accounts.clone()
        };

        let mut addresses = Vec::with_capacity(genesis.len());
        let mut accounts = HashMap::new();
        for (index, account) in genesis.iter().enumerate() {
            let address = address_from_private_key(&account.private_key).map_err(|e| {
                Error::Config(format!("Genesis account {}: {}", index, e))
            })?;
            addresses.push(address);
            accounts.insert(
                address,
                Account {
                    balance: account.balance,
                    nonce: 0,
                },
            );
        }

        debug!(
            chain_id = config.chain_id,
            accounts = addresses.len(),
            automine = config.automine,
            "starting development chain"
        );

        let genesis_block = Block {
            number: 0,
            timestamp: next_timestamp(0, true),
            gas_used: 0,
            transactions: Vec::new(),
        };

        Ok(Self {
            config: config.clone(),
            addresses,
            state: Mutex::new(ChainState {
                accounts,
                blocks: vec![genesis_block],
                pending: Vec::new(),
                transactions: HashMap::new(),
            }),
        })
    }

    /// Addresses of the funded accounts, in configuration order.
    pub fn accounts(&self) -> &[Address] {
        &self.addresses
    }

    /// Current balance of `address`.
    pub fn balance(&self, address: &Address) -> U256 {
        self.state()
            .accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    /// Number of the latest mined block.
    pub fn block_number(&self) -> u64 {
        self.state().head().number
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gas_price(&self) -> U256 {
        self.config.min_gas_price.max(U256::from(ONE_GWEI))
    }

    fn block_hash(&self, number: u64) -> String {
        keccak_hex(&[
            &self.config.chain_id.to_be_bytes(),
            &number.to_be_bytes(),
        ])
    }

    fn block_json(&self, state: &ChainState, block: &Block, full: bool) -> Value {
        let transactions: Vec<Value> = block
            .transactions
            .iter()
            .map(|hash| match (full, state.transactions.get(hash)) {
                (true, Some(tx)) => self.transaction_json(tx),
                _ => json!(hash),
            })
            .collect();
        let parent_hash = match block.number {
            0 => format!("0x{}", "0".repeat(64)),
            n => self.block_hash(n - 1),
        };

        json!({
            "number": u64_to_quantity(block.number),
            "hash": self.block_hash(block.number),
            "parentHash": parent_hash,
            "timestamp": u64_to_quantity(block.timestamp),
            "gasLimit": u64_to_quantity(self.config.block_gas_limit),
            "gasUsed": u64_to_quantity(block.gas_used),
            "transactions": transactions,
        })
    }

    fn transaction_json(&self, tx: &StoredTransaction) -> Value {
        json!({
            "hash": tx.hash,
            "nonce": u64_to_quantity(tx.nonce),
            "from": format_address(&tx.from),
            "to": tx.to.as_ref().map(format_address),
            "value": to_quantity(tx.value),
            "gas": u64_to_quantity(tx.gas),
            "gasPrice": to_quantity(tx.gas_price),
            "input": format!("0x{}", hex::encode(&tx.input)),
            "chainId": u64_to_quantity(self.config.chain_id),
            "blockNumber": tx.block_number.map(u64_to_quantity),
            "blockHash": tx.block_number.map(|n| self.block_hash(n)),
        })
    }

    fn receipt_json(&self, tx: &StoredTransaction) -> Value {
        let (Some(number), Some(success)) = (tx.block_number, tx.success) else {
            return Value::Null;
        };
        json!({
            "transactionHash": tx.hash,
            "blockNumber": u64_to_quantity(number),
            "blockHash": self.block_hash(number),
            "from": format_address(&tx.from),
            "to": tx.to.as_ref().map(format_address),
            "gasUsed": u64_to_quantity(tx.gas_used),
            "effectiveGasPrice": to_quantity(tx.gas_price),
            "status": if success { "0x1" } else { "0x0" },
        })
    }

    // ─── Method handlers ───

    fn get_block_by_number(&self, params: &[Value]) -> Result<Value, RpcError> {
        let tag = param(params, 0, "blockNumber")?;
        let full = params.get(1).and_then(Value::as_bool).unwrap_or(false);

        let state = self.state();
        let number = match tag.as_str() {
            Some("latest" | "pending" | "safe" | "finalized") => state.head().number,
            Some("earliest") => 0,
            Some(quantity) => {
                parse_u64_quantity(quantity).map_err(|e| invalid_params(e.to_string()))?
            }
            None => return Err(invalid_params(format!("invalid block tag: {}", tag))),
        };

        Ok(state
            .blocks
            .get(number as usize)
            .map(|block| self.block_json(&state, block, full))
            .unwrap_or(Value::Null))
    }

    fn estimate_gas(&self, params: &[Value]) -> Result<Value, RpcError> {
        let tx = transaction_param(params)?;
        let input = tx_input(tx)?;
        let is_create = tx_to(tx)?.is_none();
        Ok(json!(u64_to_quantity(intrinsic_gas(&input, is_create))))
    }

    fn get_balance(&self, params: &[Value]) -> Result<Value, RpcError> {
        let address = parse_address(param(params, 0, "address")?)?;
        Ok(json!(to_quantity(self.balance(&address))))
    }

    fn get_transaction_count(&self, params: &[Value]) -> Result<Value, RpcError> {
        let address = parse_address(param(params, 0, "address")?)?;
        let nonce = self
            .state()
            .accounts
            .get(&address)
            .map(|a| a.nonce)
            .unwrap_or_default();
        Ok(json!(u64_to_quantity(nonce)))
    }

    fn get_transaction(&self, params: &[Value], receipt: bool) -> Result<Value, RpcError> {
        let hash = param(params, 0, "transactionHash")?
            .as_str()
            .ok_or_else(|| invalid_params("transaction hash must be a string"))?
            .to_lowercase();
        let state = self.state();
        Ok(match state.transactions.get(&hash) {
            Some(tx) if receipt => self.receipt_json(tx),
            Some(tx) => self.transaction_json(tx),
            None => Value::Null,
        })
    }

    fn send_transaction(&self, params: &[Value]) -> Result<Value, RpcError> {
        let tx = transaction_param(params)?;
        let from = parse_address(
            tx.get("from")
                .ok_or_else(|| invalid_params("missing `from` in transaction"))?,
        )?;
        let to = tx_to(tx)?;
        let input = tx_input(tx)?;
        let value = tx_quantity(tx, "value")?.unwrap_or_default();
        let gas = match tx_quantity(tx, "gas")? {
            Some(gas) => u64::try_from(gas).map_err(|_| invalid_params("gas does not fit in 64 bits"))?,
            None => self.config.block_gas_limit,
        };
        let gas_price = match tx_quantity(tx, "gasPrice")? {
            Some(price) => price,
            None => tx_quantity(tx, "maxFeePerGas")?.unwrap_or_else(|| self.gas_price()),
        };

        if !self.addresses.contains(&from) {
            return Err(invalid_input(format!("Unknown account {}", format_address(&from))));
        }
        let mut state = self.state();
        let sender = state.accounts.get(&from).cloned().unwrap_or_default();

        if gas > self.config.block_gas_limit {
            return Err(invalid_input(format!(
                "Transaction gas limit is {} and exceeds block gas limit of {}",
                gas, self.config.block_gas_limit
            )));
        }
        let intrinsic = intrinsic_gas(&input, to.is_none());
        if gas < intrinsic {
            return Err(invalid_input(format!(
                "Transaction requires at least {} gas but got {}",
                intrinsic, gas
            )));
        }
        if to.is_none()
            && input.len() > MAX_INITCODE_SIZE
            && !self.config.allow_unlimited_contract_size
        {
            return Err(invalid_input(format!(
                "Transaction initcode size {} exceeds the limit of {}",
                input.len(),
                MAX_INITCODE_SIZE
            )));
        }
        if gas_price < self.config.min_gas_price {
            return Err(invalid_input(format!(
                "Transaction gas price is {} which is below the minimum of {}",
                gas_price, self.config.min_gas_price
            )));
        }
        let upfront = U256::from(gas)
            .checked_mul(gas_price)
            .ok_or_else(|| invalid_input("gas * gasPrice overflows"))?;
        if sender.balance < upfront {
            return Err(invalid_input(format!(
                "Sender doesn't have enough funds to send tx. The max upfront cost is: {} and the sender's balance is: {}.",
                upfront, sender.balance
            )));
        }

        let nonce = sender.nonce;
        if let Some(account) = state.accounts.get_mut(&from) {
            account.nonce += 1;
        }
        let hash = keccak_hex(&[
            &self.config.chain_id.to_be_bytes(),
            from.as_slice(),
            &nonce.to_be_bytes(),
        ]);

        state.transactions.insert(
            hash.clone(),
            StoredTransaction {
                hash: hash.clone(),
                from,
                to,
                value,
                gas,
                gas_price,
                nonce,
                input,
                gas_used: intrinsic,
                block_number: None,
                success: None,
            },
        );
        state.pending.push(hash.clone());
        debug!(%hash, from = %format_address(&from), nonce, "accepted transaction");

        if self.config.automine {
            let number = state.mine(
                self.config.mempool_order,
                self.config.allow_blocks_with_same_timestamp,
            );
            debug!(block = number, "mined block");

            let failed = state
                .transactions
                .get(&hash)
                .is_some_and(|tx| tx.success == Some(false));
            if failed && self.config.throw_on_transaction_failures {
                return Err(RpcError::Rpc {
                    code: INTERNAL_ERROR,
                    message: "Transaction reverted: sender doesn't have enough funds for value transfer"
                        .to_string(),
                    data: Some(json!({ "txHash": hash })),
                });
            }
        }

        Ok(json!(hash))
    }

    fn mine(&self) -> Result<Value, RpcError> {
        let mut state = self.state();
        let number = state.mine(
            self.config.mempool_order,
            self.config.allow_blocks_with_same_timestamp,
        );
        debug!(block = number, "mined block");
        Ok(json!("0x0"))
    }
}

impl ChainEngine for DevChain {
    fn handle(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        match method {
            "eth_chainId" => Ok(json!(u64_to_quantity(self.config.chain_id))),
            "net_version" => Ok(json!(self.config.network_id().to_string())),
            "web3_clientVersion" => Ok(json!(CLIENT_VERSION)),
            "eth_accounts" => Ok(json!(
                self.addresses.iter().map(format_address).collect::<Vec<_>>()
            )),
            "eth_blockNumber" => Ok(json!(u64_to_quantity(self.block_number()))),
            "eth_getBlockByNumber" => self.get_block_by_number(params),
            "eth_gasPrice" => Ok(json!(to_quantity(self.gas_price()))),
            "eth_estimateGas" => self.estimate_gas(params),
            "eth_getBalance" => self.get_balance(params),
            "eth_getTransactionCount" => self.get_transaction_count(params),
            "eth_sendTransaction" => self.send_transaction(params),
            "eth_getTransactionByHash" => self.get_transaction(params, false),
            "eth_getTransactionReceipt" => self.get_transaction(params, true),
            "evm_mine" => self.mine(),
            _ => Err(RpcError::rpc(
                RpcError::METHOD_NOT_FOUND,
                format!("Method {} is not supported", method),
            )),
        }
    }
}

impl std::fmt::Debug for DevChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevChain")
            .field("chain_id", &self.config.chain_id)
            .field("accounts", &self.addresses.len())
            .finish()
    }
}

// ============================================================================
// Parameter helpers
// ============================================================================

fn param<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a Value, RpcError> {
    params
        .get(index)
        .ok_or_else(|| invalid_params(format!("missing value for required argument `{}`", name)))
}

fn transaction_param(params: &[Value]) -> Result<&Map<String, Value>, RpcError> {
    param(params, 0, "transaction")?
        .as_object()
        .ok_or_else(|| invalid_params("transaction must be an object"))
}

fn parse_address(value: &Value) -> Result<Address, RpcError> {
    value
        .as_str()
        .and_then(|s| s.parse::<Address>().ok())
        .ok_or_else(|| invalid_params(format!("invalid address: {}", value)))
}

fn tx_to(tx: &Map<String, Value>) -> Result<Option<Address>, RpcError> {
    match tx.get("to") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_address(value).map(Some),
    }
}

fn tx_input(tx: &Map<String, Value>) -> Result<Vec<u8>, RpcError> {
    let Some(data) = tx.get("input").or_else(|| tx.get("data")) else {
        return Ok(Vec::new());
    };
    let text = data
        .as_str()
        .ok_or_else(|| invalid_params("transaction data must be a hex string"))?;
    hex::decode(text.strip_prefix("0x").unwrap_or(text))
        .map_err(|e| invalid_params(format!("invalid transaction data: {}", e)))
}

fn tx_quantity(tx: &Map<String, Value>, field: &str) -> Result<Option<U256>, RpcError> {
    match tx.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_integer_value(value)
            .map(Some)
            .map_err(|e| invalid_params(format!("invalid `{}`: {}", field, e))),
    }
}
