use thiserror::Error;

/// Node RPC error code for a height beyond the node's tip.
pub const RPC_OUT_OF_RANGE: i32 = -8;

/// Node RPC error code for an unknown block hash or txid.
pub const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;

/// Errors that can occur when talking to the blockchain node.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection to the node.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP-level error occurred (non-2xx status code).
    ///
    /// First field is the HTTP status code, second is the error message.
    #[error("HTTP error: {0}")]
    HttpError(u16, String),

    /// JSON-RPC error returned by the node.
    ///
    /// First field is the RPC error code, second is the error message.
    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    /// Network-level error from the underlying HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response from the node could not be parsed or was malformed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Maximum concurrent requests limit has been reached.
    #[error("Concurrency limit reached: {0}")]
    ConcurrencyLimit(String),
}

impl UpstreamError {
    /// Returns `true` for RPC errors meaning "no such block or transaction".
    ///
    /// The node client maps these to `Ok(None)`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RpcError(code, _) if *code == RPC_OUT_OF_RANGE || *code == RPC_INVALID_ADDRESS_OR_KEY)
    }

    /// Returns `true` if this error is transient and the call may succeed next tick.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout |
            Self::Network(_) |
            Self::ConnectionFailed(_) |
            Self::ConcurrencyLimit(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            _ => false,
        }
    }
}
