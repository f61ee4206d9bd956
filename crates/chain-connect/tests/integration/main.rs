//! Integration tests for chain-connect.
//!
//! HTTP networks are served by mockito; local networks run the built-in
//! development chain. No external node is needed.
//!
//! Run with: `cargo test --test integration`
//! Set `RUST_LOG=chain_connect=debug` to see the library's logs.

mod http_connection;
mod local_connection;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
