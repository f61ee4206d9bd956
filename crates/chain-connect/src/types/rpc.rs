//! JSON-RPC 2.0 request and response envelopes.
//!
//! See <https://www.jsonrpc.org/specification>.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::RpcError;

/// Arguments of a provider request: a method name and optional parameters.
///
/// `params` may be a JSON array or a JSON object; only arrays survive the
/// conversion into a [`JsonRpcRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestArguments {
    /// Arguments with positional parameters.
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params: Some(Value::Array(params)),
        }
    }

    /// Arguments without parameters.
    pub fn method(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: None,
        }
    }

    /// The parameters normalized to an array.
    ///
    /// Absent parameters become an empty array; anything other than an array
    /// is rejected with [`RpcError::InvalidRequestParams`].
    pub fn params_array(&self) -> Result<Vec<Value>, RpcError> {
        request_params(self.params.as_ref())
    }
}

/// Normalize request parameters to an array.
pub fn request_params(params: Option<&Value>) -> Result<Vec<Value>, RpcError> {
    match params {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(RpcError::InvalidRequestParams),
    }
}

/// JSON-RPC request id: a number or a string.
///
/// Numbers are kept as sent, so negative and fractional ids survive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id.into())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

/// A JSON-RPC 2.0 request object, with `params` always an array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    /// Build a request, normalizing the parameters.
    pub fn new(
        id: impl Into<RequestId>,
        method: impl Into<String>,
        params: Option<&Value>,
    ) -> Result<Self, RpcError> {
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.into(),
            params: request_params(params)?,
        })
    }

    /// Build a request from provider arguments.
    pub fn from_arguments(
        id: impl Into<RequestId>,
        args: &RequestArguments,
    ) -> Result<Self, RpcError> {
        Self::new(id, args.method.clone(), args.params.as_ref())
    }

    /// Strip the envelope back to provider arguments.
    pub fn into_arguments(self) -> RequestArguments {
        RequestArguments::new(self.method, self.params)
    }

    /// The transaction object of an `eth_sendTransaction`-style request,
    /// if its first parameter is an object.
    pub fn transaction_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.params.first_mut().and_then(Value::as_object_mut)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// The `error` member of a failed response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outcome carried by a response.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponsePayload {
    Success(Value),
    Failure(JsonRpcErrorObject),
}

/// A validated JSON-RPC 2.0 response.
///
/// When a payload carries an `error` member, it is classified as a failure
/// even if a `result` member is also present.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonRpcResponse {
    /// `None` when the server answered with `"id": null`.
    pub id: Option<RequestId>,
    pub payload: ResponsePayload,
}

impl JsonRpcResponse {
    /// Returns true if this response carries an error.
    pub fn is_failure(&self) -> bool {
        matches!(self.payload, ResponsePayload::Failure(_))
    }

    /// Turn the response into its result, mapping a failure to
    /// [`RpcError::Rpc`].
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.payload {
            ResponsePayload::Success(value) => Ok(value),
            ResponsePayload::Failure(error) => Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            }),
        }
    }

    /// Validate a decoded JSON value as a response.
    ///
    /// Returns `None` if the value is not a well-formed JSON-RPC 2.0
    /// response.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        if object.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return None;
        }

        let id = match object.get("id")? {
            Value::Null => None,
            Value::Number(n) => Some(RequestId::Number(n.clone())),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => return None,
        };

        if let Some(error) = object.get("error") {
            let error = error.as_object()?;
            let code = error_code(error.get("code")?)?;
            let message = error.get("message")?.as_str()?.to_string();
            return Some(Self {
                id,
                payload: ResponsePayload::Failure(JsonRpcErrorObject {
                    code,
                    message,
                    data: error.get("data").cloned(),
                }),
            });
        }

        let result = object.get("result")?.clone();
        Some(Self {
            id,
            payload: ResponsePayload::Success(result),
        })
    }
}

/// Any JSON number is a valid error code; integral floats like `-32000.0`
/// are read as integers.
fn error_code(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(code) = number.as_i64() {
        return Some(code);
    }
    let code = number.as_f64()?;
    (code.fract() == 0.0 && code >= i64::MIN as f64 && code <= i64::MAX as f64)
        .then_some(code as i64)
}

/// A response body: a single response or a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum JsonRpcResponseBody {
    Single(JsonRpcResponse),
    Batch(Vec<JsonRpcResponse>),
}

/// Parse and validate a response body.
///
/// Anything that is not valid JSON, or is not a response (or array of
/// responses) per JSON-RPC 2.0, fails with
/// [`RpcError::InvalidJsonResponse`] carrying the raw text.
pub fn parse_json_rpc_response(text: &str) -> Result<JsonRpcResponseBody, RpcError> {
    let invalid = || RpcError::InvalidJsonResponse {
        response: text.to_string(),
    };

    let json: Value = serde_json::from_str(text).map_err(|_| invalid())?;

    match &json {
        Value::Array(items) => items
            .iter()
            .map(JsonRpcResponse::from_value)
            .collect::<Option<Vec<_>>>()
            .map(JsonRpcResponseBody::Batch)
            .ok_or_else(invalid),
        other => JsonRpcResponse::from_value(other)
            .map(JsonRpcResponseBody::Single)
            .ok_or_else(invalid),
    }
}
