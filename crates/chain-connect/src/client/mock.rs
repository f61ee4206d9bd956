//! Scripted provider used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::client::EthereumProvider;
use crate::error::{Error, RpcError};
use crate::types::RequestArguments;

/// Answers each method with a fixed result or error and records every call.
/// Methods without a script fail with "method not found".
#[derive(Default)]
pub(crate) struct MockProvider {
    replies: Mutex<HashMap<String, Result<Value, (i64, String)>>>,
    calls: Mutex<Vec<RequestArguments>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, method: &str, result: Value) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), Ok(result));
        self
    }

    pub(crate) fn fail(self, method: &str, code: i64, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), Err((code, message.to_string())));
        self
    }

    /// Sleep before answering, so concurrent callers overlap.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made to `method`.
    pub(crate) fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|args| args.method == method)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub(crate) fn requests(&self) -> Vec<RequestArguments> {
        self.calls.lock().unwrap().clone()
    }
}

impl EthereumProvider for MockProvider {
    fn request(&self, args: RequestArguments) -> BoxFuture<'_, Result<Value, Error>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(args.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self.replies.lock().unwrap().get(&args.method).cloned();
            match reply {
                Some(Ok(value)) => Ok(value),
                Some(Err((code, message))) => Err(RpcError::rpc(code, message).into()),
                None => Err(RpcError::rpc(RpcError::METHOD_NOT_FOUND, "Method not found").into()),
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }
}
