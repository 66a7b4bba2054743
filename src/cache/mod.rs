use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use thiserror::Error;

pub mod bytes;
mod memory;
mod persistent;
mod types;

pub use memory::InMemoryStorage;
pub use persistent::{PARAMS_STORE, PUBLIC_KEY_STORE, PersistentStorage};
pub use types::{
    PUBLIC_PARAMS_BITS, PublicKeyEntry, PublicParamsEntry, StorageReadResult, StoredPublicKey,
    StoredPublicParams,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("value must be convertible to a byte array: {0}")]
    InvalidBytes(String),
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode stored record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 公钥缓存后端抽象：按 ACL 地址读写公钥与公共参数，支持插拔式实现。
///
/// `set` 对两份载荷分别生效，传入 `None` 的一项保持原值不变。
#[async_trait]
pub trait PublicKeyStorage: Send + Sync + 'static {
    async fn get(&self, acl_address: &str) -> Result<StorageReadResult, StorageError>;

    async fn set(
        &self,
        acl_address: &str,
        public_key: Option<StoredPublicKey>,
        public_params: Option<StoredPublicParams>,
    ) -> Result<(), StorageError>;
}

/// 地址大小写不敏感，统一转成小写作为存储键。
pub(crate) fn storage_key(acl_address: &str) -> String {
    acl_address.trim().to_ascii_lowercase()
}

static DEFAULT_STORAGE: Lazy<Arc<InMemoryStorage>> = Lazy::new(|| Arc::new(InMemoryStorage::new()));

/// 进程级默认缓存，供不关心后端选择的调用方直接使用。
pub fn default_storage() -> Arc<dyn PublicKeyStorage> {
    DEFAULT_STORAGE.clone()
}

pub async fn public_key_storage_get(acl_address: &str) -> Result<StorageReadResult, StorageError> {
    DEFAULT_STORAGE.get(acl_address).await
}

pub async fn public_key_storage_set(
    acl_address: &str,
    public_key: Option<StoredPublicKey>,
    public_params: Option<StoredPublicParams>,
) -> Result<(), StorageError> {
    DEFAULT_STORAGE
        .set(acl_address, public_key, public_params)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn default_storage_is_shared() {
        let acl = "0x00000000000000000000000000000000000000d5";
        public_key_storage_set(acl, Some(StoredPublicKey::new("shared", vec![9u8])), None)
            .await
            .expect("set");

        let via_handle = default_storage().get(acl).await.expect("get");
        assert_eq!(via_handle.public_key.expect("key").id, "shared");
        assert!(
            public_key_storage_get(acl)
                .await
                .expect("get")
                .public_params
                .is_none()
        );
    }
}
