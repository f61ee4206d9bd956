//! Core types: network configuration, JSON-RPC envelopes and quantities.

mod config;
mod quantity;
mod rpc;
pub mod schema;

pub use config::{
    ChainType, ConfigOverride, DEFAULT_NETWORK_NAME, GenesisAccount, HttpNetworkConfig,
    IntervalMining, LOCALHOST_NETWORK_NAME, LOCALHOST_URL, LocalNetworkConfig, ManagerConfig,
    MempoolOrder, NETWORK_ENV_VAR, NetworkConfig, TransportType, UserConfig,
};
pub use quantity::{
    GasValue, parse_integer_value, parse_quantity, parse_u64_quantity, parse_u64_value,
    to_quantity, u64_to_quantity, u256_serde,
};
pub use rpc::{
    JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, JsonRpcResponseBody, RequestArguments,
    RequestId, ResponsePayload, parse_json_rpc_response, request_params,
};
