use thiserror::Error;

/// Reasons a link request is refused before anything reaches the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("missing chainId")]
    MissingChainId,

    #[error("invalid chainId (expected a positive integer)")]
    InvalidChainId,

    #[error("unsupported chainId {0}")]
    UnsupportedChainId(u64),

    #[error("missing method")]
    MissingMethod,

    #[error("missing or invalid params (expected JSON)")]
    MissingParams,

    #[error("`params` must be a JSON object or JSON array.")]
    ParamsNotObjectOrArray,

    #[error("{method} needs an address (connect a wallet or pass `params.address`)")]
    MissingAddress { method: &'static str },

    #[error("personal_sign needs `params.message` (or `params.data`) as a string")]
    MessageNotString,

    #[error("eth_signTypedData_v4 needs `params.typedData` (or `params.data`)")]
    MissingTypedData,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("invalid redirect url: {0}")]
    InvalidUrl(String),

    #[error("unsupported redirect protocol: {0}")]
    UnsupportedProtocol(String),
}

/// Failures talking to the wallet endpoint.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("failed to parse response: {0}")]
    Decode(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected {method} result: {value}")]
    UnexpectedResult {
        method: &'static str,
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
