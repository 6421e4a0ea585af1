use crate::error::RequestError;
use serde::{Deserialize, Serialize};

/// JSON-RPC request sent to the wallet endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,

    /// Name of the RPC method to call (e.g., "eth_sendTransaction").
    pub method: String,

    #[serde(default)]
    pub params: serde_json::Value,

    pub id: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: serde_json::Value::from(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,

    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// Only the fake wallets in tests answer JSON-RPC.
#[cfg(test)]
impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: serde_json::Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// The request as carried by the link, before any shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequestSpec {
    pub method: String,
    pub raw_params: Option<serde_json::Value>,
    pub chain_id: u64,
}

/// Ordered JSON-RPC params ready for the wallet, or the reason execution is blocked.
pub type NormalizedRequest = Result<Vec<serde_json::Value>, RequestError>;

/// Outcome of one execution, fed to the redirect builder.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectPayload {
    Result(serde_json::Value),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    String,
    Json,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::String => "string",
            ResultType::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub name: String,
    pub url: String,
}
