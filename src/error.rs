use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cache::StorageError;
use crate::network::RpcError;
use crate::relayer::{LoadError, SdkCallError};

/// 实例创建流程对外暴露的统一错误类型，每个变体都带有稳定的机器可读代码。
#[derive(Debug, Error)]
pub enum FhevmError {
    #[error("FHEVM operation was cancelled")]
    Aborted,
    #[error("relayer SDK is not available: {0}")]
    RelayerUnavailable(String),
    #[error("relayer SDK failed to load: {0}")]
    RelayerLoad(#[source] LoadError),
    #[error("relayer SDK initSDK failed")]
    RelayerInitFailed,
    #[error("invalid ACL address: {0}")]
    InvalidAclAddress(String),
    #[error("unable to resolve chain id: {0}")]
    ChainId(#[source] RpcError),
    #[error("the URL {url} is not a Web3 node or is not reachable, please check the endpoint")]
    Web3ClientVersion {
        url: String,
        #[source]
        source: RpcError,
    },
    #[error("the URL {url} is not a FHEVM Hardhat node or is not reachable, please check the endpoint")]
    RelayerMetadata {
        url: String,
        #[source]
        source: RpcError,
    },
    #[error("relayer SDK call `{call}` failed: {source}")]
    Sdk {
        call: &'static str,
        #[source]
        source: SdkCallError,
    },
    #[error("public key storage error: {0}")]
    Storage(#[from] StorageError),
}

impl FhevmError {
    pub fn code(&self) -> &'static str {
        match self {
            FhevmError::Aborted => "ABORTED",
            FhevmError::RelayerUnavailable(_) => "RELAYER_UNAVAILABLE",
            FhevmError::RelayerLoad(_) => "RELAYER_LOAD_FAILED",
            FhevmError::RelayerInitFailed => "RELAYER_INIT_FAILED",
            FhevmError::InvalidAclAddress(_) => "INVALID_ACL_ADDRESS",
            FhevmError::ChainId(_) => "CHAIN_ID_ERROR",
            FhevmError::Web3ClientVersion { .. } => "WEB3_CLIENTVERSION_ERROR",
            FhevmError::RelayerMetadata { .. } => "FHEVM_RELAYER_METADATA_ERROR",
            FhevmError::Sdk { .. } => "RELAYER_SDK_ERROR",
            FhevmError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// 取消不属于领域错误，调用方据此区分「被新请求顶替」与真正的失败。
    pub fn is_aborted(&self) -> bool {
        matches!(self, FhevmError::Aborted)
    }
}

impl From<LoadError> for FhevmError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::InvalidAfterLoad { .. } | LoadError::InvalidBinding(_) => {
                FhevmError::RelayerUnavailable(err.to_string())
            }
            LoadError::Transport { .. } => FhevmError::RelayerLoad(err),
        }
    }
}

pub type FhevmResult<T> = Result<T, FhevmError>;

pub fn ensure_not_aborted(token: &CancellationToken) -> FhevmResult<()> {
    if token.is_cancelled() {
        return Err(FhevmError::Aborted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relayer::ProbeViolations;

    #[test]
    fn load_errors_map_to_distinct_codes() {
        let transport: FhevmError = LoadError::Transport {
            url: "https://cdn.example/sdk.js".into(),
            reason: "connection refused".into(),
        }
        .into();
        assert_eq!(transport.code(), "RELAYER_LOAD_FAILED");

        let invalid: FhevmError = LoadError::InvalidAfterLoad {
            url: "https://cdn.example/sdk.js".into(),
            violations: ProbeViolations::default(),
        }
        .into();
        assert_eq!(invalid.code(), "RELAYER_UNAVAILABLE");
        assert!(!invalid.is_aborted());
    }

    #[test]
    fn cancelled_token_yields_aborted() {
        let token = CancellationToken::new();
        assert!(ensure_not_aborted(&token).is_ok());
        token.cancel();
        let err = ensure_not_aborted(&token).expect_err("aborted");
        assert!(err.is_aborted());
        assert_eq!(err.code(), "ABORTED");
    }
}
