use thiserror::Error;

use super::ProbeViolations;
use crate::network::RpcError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load relayer SDK from {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error(
        "relayer SDK script has been successfully loaded from {url}, however, the relayerSDK binding is invalid: {violations}"
    )]
    InvalidAfterLoad {
        url: String,
        violations: ProbeViolations,
    },
    #[error("relayerSDK binding is invalid: {0}")]
    InvalidBinding(ProbeViolations),
}

/// SDK 自身调用（`initSDK` / `createInstance`）抛出的错误。
#[derive(Debug, Error)]
pub enum SdkCallError {
    #[error("{0}")]
    Message(String),
    #[error("invalid instance config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl SdkCallError {
    pub fn message(message: impl Into<String>) -> Self {
        SdkCallError::Message(message.into())
    }
}
