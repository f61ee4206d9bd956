//! The provider abstraction shared by every transport.

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Error;
use crate::types::RequestArguments;

/// An EIP-1193 style provider: a single `request` entry point plus shutdown.
///
/// Implemented by [`HttpProvider`](crate::HttpProvider) for remote nodes and
/// by [`LocalProvider`](crate::LocalProvider) for in-process chains. The
/// [`RequestModifier`](crate::RequestModifier) also issues its auxiliary
/// calls (gas estimation, chain id lookup) through this trait, so test
/// doubles only need to implement these two methods.
pub trait EthereumProvider: Send + Sync {
    /// Send a request and return the `result` value of the response.
    fn request(&self, args: RequestArguments) -> BoxFuture<'_, Result<Value, Error>>;

    /// Release the provider's resources. Requests made afterwards may fail.
    fn close(&self) -> BoxFuture<'_, Result<(), Error>>;
}
