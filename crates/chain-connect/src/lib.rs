//! Network connections for EVM chains.
//!
//! **chain-connect** opens connections to named networks, either remote
//! nodes over HTTP or an in-process development chain, and enriches every
//! outgoing JSON-RPC request on the way: missing `gas` and `gasPrice` are
//! filled in, and the node's chain id is checked against the configured one.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chain_connect::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chain_connect::Error> {
//!     let manager = NetworkManager::new(ManagerConfig::default());
//!
//!     // The default network is a local development chain
//!     let connection = manager.connect_default().await?;
//!
//!     let accounts = connection.request(RequestArguments::method("eth_accounts")).await?;
//!     let from = accounts[0].clone();
//!
//!     // `gas` is estimated and filled in before the request is sent
//!     let hash = connection
//!         .request(RequestArguments::new(
//!             "eth_sendTransaction",
//!             vec![json!({ "from": from, "to": from, "value": "0x1" })],
//!         ))
//!         .await?;
//!     println!("sent: {}", hash);
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Request pipeline
//!
//! [`NetworkConnection::request`] passes each call through the connection's
//! [`RequestModifier`]:
//!
//! 1. **Gas**: `eth_sendTransaction` without `gas` gets the node's estimate
//!    (or the configured fixed value)
//! 2. **Gas price**: without any pricing field, `gasPrice` comes from
//!    `eth_gasPrice` (or the configured fixed value)
//! 3. **Chain id**: HTTP networks with a configured `chainId` are checked
//!    once per connection
//!
//! # Lifecycle hooks
//!
//! [`NetworkHooks`] wraps connection creation, every HTTP request and
//! connection shutdown with ordered [`hooks::Handler`] chains.
//!
//! # Core Types
//!
//! - [`NetworkConfig`] - `http` or `local` network configuration
//! - [`GasValue`] - `auto` or a fixed amount
//! - [`JsonRpcRequest`], [`JsonRpcResponse`] - strict JSON-RPC 2.0 envelopes
//! - [`U256`], [`Address`] - Ethereum primitives (from `alloy-primitives`)

pub mod client;
pub mod devchain;
pub mod error;
pub mod hooks;
pub mod modifier;
pub mod types;

// Re-export commonly used types at crate root
pub use alloy_primitives::{Address, U256};
pub use error::{Error, RpcError, ValidationIssue};
pub use types::*;

// Re-export client types
pub use client::{
    ChainEngine, CloseFn, ConnectionInfo, EngineFactory, EthereumProvider, HttpProvider,
    HttpProviderBuilder, LocalProvider, NetworkConnection, NetworkManager, NetworkManagerBuilder,
    RequestWrapper, SendFn, default_engine_factory, with_deadline,
};

pub use devchain::DevChain;
pub use hooks::{HandlerChain, NetworkHooks};
pub use modifier::{ChainIdValidator, GasPriceStrategy, GasStrategy, RequestModifier};
