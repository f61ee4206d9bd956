//! Error types for chain-connect.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error) - Main error type, returned by most operations
//!   - [`RpcError`] - Transport and JSON-RPC errors (HTTP failures, malformed
//!     responses, node-reported errors)
//!   - [`ValidationIssue`] - A single schema violation, carried by the
//!     configuration errors
//!
//! # Error Handling Examples
//!
//! ```rust,no_run
//! use chain_connect::*;
//!
//! # async fn example(manager: NetworkManager) -> Result<(), Error> {
//! match manager.connect(Some("sepolia"), None, None).await {
//!     Ok(connection) => println!("connected: #{}", connection.id()),
//!     Err(Error::NetworkNotFound { network_name }) => {
//!         println!("Network {} is not declared", network_name);
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

use thiserror::Error;

use crate::types::ChainType;

/// A single structural validation failure, qualified by the field path
/// where it occurred (e.g. `httpHeaders.X-Api-Key`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: Vec<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Dotted path, e.g. `genesisAccounts.0.balance`.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "* Error in {}: {}", self.dotted_path(), self.message)
    }
}

/// Renders a list of issues one per line, tab-indented.
fn render_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("\t{issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// RPC Errors
// ============================================================================

/// Transport and JSON-RPC errors.
#[derive(Debug, Error)]
pub enum RpcError {
    // ─── Network/Transport ───
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid JSON-RPC response received: {response}")]
    InvalidJsonResponse { response: String },

    #[error("Invalid request arguments: only array parameters are supported")]
    InvalidRequestParams,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Provider is closed")]
    Closed,

    // ─── Node-reported error ───
    #[error("RPC error: {message} (code: {code})")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl RpcError {
    /// JSON-RPC "method not found".
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Create a network error.
    pub fn network(message: impl Into<String>, status_code: Option<u16>) -> Self {
        RpcError::Network {
            message: message.into(),
            status_code,
        }
    }

    /// Create a node-reported error without data.
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        RpcError::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Returns true if the node rejected the method as unknown.
    pub fn is_method_not_supported(&self) -> bool {
        matches!(self, RpcError::Rpc { code, .. } if *code == Self::METHOD_NOT_FOUND)
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Main error type for chain-connect operations.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Connection resolution ───
    #[error("The network config '{network_name}' doesn't exist")]
    NetworkNotFound { network_name: String },

    #[error("Invalid network type '{network_type}' for network '{network_name}'. Expected 'http' or 'local'")]
    InvalidNetworkType {
        network_name: String,
        network_type: String,
    },

    #[error("Invalid config for network '{network_name}':\n{}", render_issues(.errors))]
    InvalidNetworkConfig {
        network_name: String,
        errors: Vec<ValidationIssue>,
    },

    #[error("Invalid network config override:\n{}", render_issues(.errors))]
    InvalidConfigOverride { errors: Vec<ValidationIssue> },

    #[error("The network '{network_name}' is configured with chain type '{network_chain_type}', but '{chain_type}' was requested")]
    InvalidChainType {
        network_name: String,
        chain_type: ChainType,
        network_chain_type: ChainType,
    },

    // ─── Request pipeline ───
    #[error("The configured chain id ({configured}) doesn't match the chain id reported by the network ({reported})")]
    InvalidGlobalChainId { configured: u64, reported: u64 },

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Timed out waiting for: {}", .pending.join(", "))]
    Timeout { pending: Vec<String> },

    // ─── Configuration ───
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ─── Serialization ───
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an override rejected with a single root-level message.
    pub(crate) fn config_override(message: impl Into<String>) -> Self {
        Error::InvalidConfigOverride {
            errors: vec![ValidationIssue::new(Vec::new(), message)],
        }
    }
}
