use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    PublicKeyStorage, StorageError, StorageReadResult, StoredPublicKey, StoredPublicParams,
    storage_key,
};

/// 进程生命周期内有效的内存缓存，公钥与公共参数分两张表独立存放。
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    public_keys: DashMap<String, StoredPublicKey>,
    public_params: DashMap<String, StoredPublicParams>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.public_keys.len().max(self.public_params.len())
    }

    pub fn is_empty(&self) -> bool {
        self.public_keys.is_empty() && self.public_params.is_empty()
    }

    pub(crate) fn read(&self, acl_address: &str) -> StorageReadResult {
        let key = storage_key(acl_address);
        let public_key = self.public_keys.get(&key).map(|entry| entry.value().clone());
        let public_params = self
            .public_params
            .get(&key)
            .map(|entry| entry.value().clone());
        StorageReadResult::from_stored(public_key, public_params)
    }

    pub(crate) fn write(
        &self,
        acl_address: &str,
        public_key: Option<StoredPublicKey>,
        public_params: Option<StoredPublicParams>,
    ) {
        let key = storage_key(acl_address);
        if let Some(public_key) = public_key {
            self.public_keys.insert(key.clone(), public_key);
        }
        if let Some(public_params) = public_params {
            self.public_params.insert(key, public_params);
        }
    }
}

#[async_trait]
impl PublicKeyStorage for InMemoryStorage {
    async fn get(&self, acl_address: &str) -> Result<StorageReadResult, StorageError> {
        Ok(self.read(acl_address))
    }

    async fn set(
        &self,
        acl_address: &str,
        public_key: Option<StoredPublicKey>,
        public_params: Option<StoredPublicParams>,
    ) -> Result<(), StorageError> {
        self.write(acl_address, public_key, public_params);
        Ok(())
    }
}
