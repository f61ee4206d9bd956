//! Client module: providers, connections and the network manager.
//!
//! - [`NetworkManager`] - Resolves a network, applies overrides and opens
//!   connections
//! - [`NetworkConnection`] - A live connection; requests pass through its
//!   [`RequestModifier`](crate::RequestModifier)
//! - [`EthereumProvider`] - The transport contract
//!
//! # Providers
//!
//! | Provider | Network type |
//! |----------|--------------|
//! | [`HttpProvider`] | `http`: a remote node, one POST per request |
//! | [`LocalProvider`] | `local`: an in-process [`ChainEngine`], [`DevChain`](crate::DevChain) by default |

mod connection;
mod deadline;
mod http;
mod local;
mod manager;
mod provider;

#[cfg(test)]
pub(crate) mod mock;

pub use connection::{CloseFn, ConnectionInfo, NetworkConnection};
pub use deadline::with_deadline;
pub use http::{HttpProvider, HttpProviderBuilder, RequestWrapper, SendFn};
pub use local::{ChainEngine, EngineFactory, LocalProvider, default_engine_factory};
pub use manager::{NetworkManager, NetworkManagerBuilder};
pub use provider::EthereumProvider;
