//! Handler chains for connection lifecycle events.
//!
//! A [`HandlerChain`] is an ordered list of handlers plus a terminal default
//! behavior supplied at run time. Each handler receives the event arguments
//! and a [`Next`] continuation; calling `next.run(args)` hands control to the
//! following handler, and after the last one to the default behavior. A
//! handler may transform the arguments, transform the result, or skip `next`
//! entirely and answer on its own.
//!
//! Handlers run in registration order: the first registered handler is the
//! outermost one.
//!
//! # Example
//!
//! ```rust
//! use chain_connect::hooks::{BoxFuture, Handler, Next};
//! use chain_connect::{ConnectionInfo, Error, JsonRpcRequest, JsonRpcResponse, NetworkHooks};
//!
//! struct LogRequests;
//!
//! impl Handler<(ConnectionInfo, JsonRpcRequest), Result<JsonRpcResponse, Error>> for LogRequests {
//!     fn handle<'a>(
//!         &'a self,
//!         args: (ConnectionInfo, JsonRpcRequest),
//!         next: Next<'a, (ConnectionInfo, JsonRpcRequest), Result<JsonRpcResponse, Error>>,
//!     ) -> BoxFuture<'a, Result<JsonRpcResponse, Error>> {
//!         Box::pin(async move {
//!             println!("#{} -> {}", args.0.id, args.1.method);
//!             next.run(args).await
//!         })
//!     }
//! }
//!
//! let mut hooks = NetworkHooks::default();
//! hooks.on_request.register(LogRequests);
//! ```

use std::fmt;
use std::sync::Arc;

pub use futures::future::BoxFuture;

use crate::client::{ConnectionInfo, NetworkConnection};
use crate::error::Error;
use crate::types::{JsonRpcRequest, JsonRpcResponse};

/// One link of a handler chain.
pub trait Handler<A, R>: Send + Sync {
    /// Handle the event, optionally delegating to `next`.
    fn handle<'a>(&'a self, args: A, next: Next<'a, A, R>) -> BoxFuture<'a, R>;
}

/// Continuation handed to a handler: the rest of the chain.
pub struct Next<'a, A, R> {
    handlers: &'a [Arc<dyn Handler<A, R>>],
    default: &'a (dyn Fn(A) -> BoxFuture<'static, R> + Send + Sync),
}

impl<'a, A, R> Next<'a, A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Run the remaining handlers, then the default behavior.
    pub fn run(self, args: A) -> BoxFuture<'a, R> {
        match self.handlers.split_first() {
            Some((handler, rest)) => handler.handle(
                args,
                Next {
                    handlers: rest,
                    default: self.default,
                },
            ),
            None => (self.default)(args),
        }
    }
}

/// An ordered list of handlers for one event.
pub struct HandlerChain<A, R> {
    handlers: Vec<Arc<dyn Handler<A, R>>>,
}

impl<A, R> Default for HandlerChain<A, R> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<A, R> fmt::Debug for HandlerChain<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<A, R> HandlerChain<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Append a handler; it runs after every handler registered before it.
    pub fn register(&mut self, handler: impl Handler<A, R> + 'static) {
        self.handlers.push(Arc::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain with `default` as the terminal behavior.
    pub async fn run<F>(&self, args: A, default: F) -> R
    where
        F: Fn(A) -> BoxFuture<'static, R> + Send + Sync,
    {
        let next = Next {
            handlers: &self.handlers,
            default: &default,
        };
        next.run(args).await
    }
}

/// Arguments of `onRequest`: the connection making the call and the
/// outgoing request.
pub type RequestEvent = (ConnectionInfo, JsonRpcRequest);

/// The three network lifecycle events.
#[derive(Debug, Default)]
pub struct NetworkHooks {
    /// Wraps connection construction. The default builds the connection.
    pub new_connection: HandlerChain<ConnectionInfo, Result<NetworkConnection, Error>>,
    /// Wraps every HTTP request right before it goes over the wire. The
    /// default sends it.
    pub on_request: HandlerChain<RequestEvent, Result<JsonRpcResponse, Error>>,
    /// Wraps provider shutdown. The default closes the provider.
    pub close_connection: HandlerChain<ConnectionInfo, Result<(), Error>>,
}
