use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("JSON-RPC `{method}` transport error: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("JSON-RPC `{method}` returned error {code}: {message}")]
    Response {
        method: String,
        code: i64,
        message: String,
    },
    #[error("JSON-RPC `{method}` returned a malformed response: {reason}")]
    Malformed { method: String, reason: String },
    #[error("invalid RPC url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("provider request failed: {0}")]
    Provider(String),
}

impl RpcError {
    pub(crate) fn malformed(method: &str, reason: impl Into<String>) -> Self {
        RpcError::Malformed {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
