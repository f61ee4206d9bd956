//! JSON-RPC provider for remote nodes reached over HTTP.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::client::EthereumProvider;
use crate::error::{Error, RpcError};
use crate::types::{
    HttpNetworkConfig, JsonRpcRequest, JsonRpcResponse, JsonRpcResponseBody, RequestArguments,
    parse_json_rpc_response,
};

/// Sends one request over the wire and returns the validated response.
pub type SendFn =
    Arc<dyn Fn(JsonRpcRequest) -> BoxFuture<'static, Result<JsonRpcResponse, Error>> + Send + Sync>;

/// Intercepts each outgoing request right before it is sent.
///
/// The wrapper receives the request and the default send continuation. It
/// may inspect or rewrite the request, call `send` (or not), and transform
/// the response.
pub type RequestWrapper = Arc<
    dyn Fn(JsonRpcRequest, SendFn) -> BoxFuture<'static, Result<JsonRpcResponse, Error>>
        + Send
        + Sync,
>;

/// The wire half of the provider: one POST per request.
struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, Error> {
        debug!(url = %self.url, method = %request.method, id = ?request.id, "sending request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(RpcError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(RpcError::from)?;

        if !status.is_success() {
            return Err(
                RpcError::network(format!("HTTP {}: {}", status, body), Some(status.as_u16()))
                    .into(),
            );
        }

        match parse_json_rpc_response(&body)? {
            JsonRpcResponseBody::Single(response) => Ok(response),
            JsonRpcResponseBody::Batch(_) => Err(RpcError::InvalidResponse(
                "Expected a single response, got a batch".to_string(),
            )
            .into()),
        }
    }
}

/// Provider for a remote node.
///
/// No retries are attempted: transport failures, non-2xx statuses and
/// malformed bodies surface to the caller as they happen.
pub struct HttpProvider {
    url: String,
    send: SendFn,
    wrapper: Option<RequestWrapper>,
    request_id: AtomicU64,
}

impl HttpProvider {
    /// Start building a provider for `url`.
    pub fn builder(url: impl Into<String>) -> HttpProviderBuilder {
        HttpProviderBuilder::new(url)
    }

    /// Build a provider straight from a network configuration.
    pub fn from_config(config: &HttpNetworkConfig) -> Result<Self, Error> {
        HttpProviderBuilder::from_config(config).build()
    }

    /// Get the node URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a prepared request through the wrapper, if any.
    pub fn send_request(
        &self,
        request: JsonRpcRequest,
    ) -> BoxFuture<'static, Result<JsonRpcResponse, Error>> {
        match &self.wrapper {
            Some(wrapper) => wrapper(request, self.send.clone()),
            None => (self.send)(request),
        }
    }
}

impl EthereumProvider for HttpProvider {
    fn request(&self, args: RequestArguments) -> BoxFuture<'_, Result<Value, Error>> {
        Box::pin(async move {
            let id = self.request_id.fetch_add(1, Ordering::Relaxed);
            let request = JsonRpcRequest::from_arguments(id, &args)?;
            let response = self.send_request(request).await?;
            Ok(response.into_result()?)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), Error>> {
        // Pooled connections are released when the client is dropped.
        Box::pin(async { Ok(()) })
    }
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("url", &self.url)
            .field("wrapped", &self.wrapper.is_some())
            .finish()
    }
}

/// Builder for [`HttpProvider`].
pub struct HttpProviderBuilder {
    url: String,
    timeout: Duration,
    headers: BTreeMap<String, String>,
    wrapper: Option<RequestWrapper>,
}

impl HttpProviderBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_millis(20_000),
            headers: BTreeMap::new(),
            wrapper: None,
        }
    }

    /// Start from a network configuration's URL, timeout and headers.
    pub fn from_config(config: &HttpNetworkConfig) -> Self {
        Self {
            url: config.url.clone(),
            timeout: Duration::from_millis(config.timeout),
            headers: config.http_headers.clone(),
            wrapper: None,
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Install a wrapper around every outgoing request.
    pub fn request_wrapper(mut self, wrapper: RequestWrapper) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    /// Build the provider.
    pub fn build(self) -> Result<HttpProvider, Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(RpcError::from)?;

        debug!(url = %self.url, timeout_ms = self.timeout.as_millis() as u64, "built HTTP provider");

        let transport = Arc::new(HttpTransport {
            url: self.url.clone(),
            client,
        });
        let send: SendFn = Arc::new(
            move |request: JsonRpcRequest| -> BoxFuture<'static, Result<JsonRpcResponse, Error>> {
                let transport = transport.clone();
                Box::pin(async move { transport.send(request).await })
            },
        );

        Ok(HttpProvider {
            url: self.url,
            send,
            wrapper: self.wrapper,
            request_id: AtomicU64::new(0),
        })
    }
}
