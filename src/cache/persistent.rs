use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    InMemoryStorage, PublicKeyStorage, StorageError, StorageReadResult, StoredPublicKey,
    StoredPublicParams, storage_key,
};

pub const PUBLIC_KEY_STORE: &str = "publicKeyStore";
pub const PARAMS_STORE: &str = "paramsStore";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord<T> {
    acl: String,
    value: T,
}

/// 落盘的公钥缓存：根目录下 `publicKeyStore/`、`paramsStore/` 两个集合，
/// 每条记录是以小写 ACL 地址命名的 JSON 文件。
///
/// 目录不可用时透明回退到内存缓存；损坏的记录按未命中处理。
pub struct PersistentStorage {
    root: Option<PathBuf>,
    fallback: InMemoryStorage,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PersistentStorage {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        match prepare_root(&root) {
            Ok(()) => {
                info!(
                    target: "fhevm::storage",
                    path = %root.display(),
                    "已启用持久化公钥缓存"
                );
                Self::with_root(Some(root))
            }
            Err(err) => {
                warn!(
                    target: "fhevm::storage",
                    path = %root.display(),
                    error = %err,
                    "持久化目录不可用，回退到内存缓存"
                );
                Self::with_root(None)
            }
        }
    }

    fn with_root(root: Option<PathBuf>) -> Self {
        Self {
            root,
            fallback: InMemoryStorage::new(),
            locks: DashMap::new(),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// 没有其他写入方持有时移除该键的锁，`locks` 只保留正在写入的键。
    fn release_lock(&self, key: &str) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn prepare_root(root: &Path) -> io::Result<()> {
    for store in [PUBLIC_KEY_STORE, PARAMS_STORE] {
        std::fs::create_dir_all(root.join(store))?;
    }
    // 只读挂载等情况下目录存在但不可写，提前探测一次。
    tempfile::NamedTempFile::new_in(root)?;
    Ok(())
}

fn validated_key(acl_address: &str) -> Result<String, StorageError> {
    let key = storage_key(acl_address);
    let valid = key
        .strip_prefix("0x")
        .is_some_and(|body| !body.is_empty() && body.bytes().all(|b| b.is_ascii_hexdigit()));
    if valid {
        Ok(key)
    } else {
        Err(StorageError::InvalidKey(acl_address.to_string()))
    }
}

fn record_path(root: &Path, store: &str, key: &str) -> PathBuf {
    root.join(store).join(format!("{key}.json"))
}

async fn read_record<T>(path: &Path, key: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(
                target: "fhevm::storage",
                path = %path.display(),
                error = %err,
                "读取缓存记录失败，按未命中处理"
            );
            return None;
        }
    };

    match serde_json::from_slice::<StoredRecord<T>>(&raw) {
        Ok(record) if storage_key(&record.acl) == key => Some(record.value),
        Ok(record) => {
            warn!(
                target: "fhevm::storage",
                path = %path.display(),
                expected = key,
                found = %record.acl,
                "缓存记录 ACL 与文件名不一致，忽略"
            );
            None
        }
        Err(err) => {
            warn!(
                target: "fhevm::storage",
                path = %path.display(),
                error = %err,
                "忽略损坏的缓存记录"
            );
            None
        }
    }
}

async fn write_record<T>(path: PathBuf, key: &str, value: T) -> Result<(), StorageError>
where
    T: Serialize,
{
    let payload = serde_json::to_vec(&StoredRecord {
        acl: key.to_string(),
        value,
    })?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let target = path.clone();
    let outcome = tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .unwrap_or_else(|join_err| Err(io::Error::other(join_err)));

    outcome.map_err(|source| StorageError::Io { path, source })
}

#[async_trait]
impl PublicKeyStorage for PersistentStorage {
    async fn get(&self, acl_address: &str) -> Result<StorageReadResult, StorageError> {
        let Some(root) = self.root.as_deref() else {
            return self.fallback.get(acl_address).await;
        };
        let Ok(key) = validated_key(acl_address) else {
            debug!(target: "fhevm::storage", acl_address, "非法缓存键，按未命中处理");
            return Ok(StorageReadResult::default());
        };

        let public_key: Option<StoredPublicKey> =
            read_record(&record_path(root, PUBLIC_KEY_STORE, &key), &key).await;
        let public_params: Option<StoredPublicParams> =
            read_record(&record_path(root, PARAMS_STORE, &key), &key).await;

        Ok(StorageReadResult::from_stored(public_key, public_params))
    }

    async fn set(
        &self,
        acl_address: &str,
        public_key: Option<StoredPublicKey>,
        public_params: Option<StoredPublicParams>,
    ) -> Result<(), StorageError> {
        let Some(root) = self.root.as_deref() else {
            return self.fallback.set(acl_address, public_key, public_params).await;
        };
        let key = validated_key(acl_address)?;

        let lock = self.key_lock(&key);
        let outcome = async {
            let _guard = lock.lock().await;
            if let Some(public_key) = public_key {
                write_record(record_path(root, PUBLIC_KEY_STORE, &key), &key, public_key).await?;
            }
            if let Some(public_params) = public_params {
                write_record(record_path(root, PARAMS_STORE, &key), &key, public_params).await?;
            }
            Ok::<(), StorageError>(())
        }
        .await;

        drop(lock);
        self.release_lock(&key);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::*;

    const ACL: &str = "0x0000000000000000000000000000000000000001";

    fn key_record(id: &str, data: &[u8]) -> StoredPublicKey {
        StoredPublicKey::new(id, data.to_vec())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fresh_store_misses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PersistentStorage::open(dir.path());
        assert!(storage.is_durable());

        let result = storage.get(ACL).await.expect("get");
        assert!(result.public_key.is_none());
        assert!(result.public_params.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn key_locks_are_released_after_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PersistentStorage::open(dir.path());
        let other = "0x0000000000000000000000000000000000000002";

        let (first, second, third) = tokio::join!(
            storage.set(ACL, Some(key_record("pk-a", &[1])), None),
            storage.set(
                ACL,
                None,
                Some(StoredPublicParams::new("pp-a", vec![2u8]))
            ),
            storage.set(other, Some(key_record("pk-b", &[3])), None),
        );
        first.expect("first");
        second.expect("second");
        third.expect("third");

        assert!(storage.locks.is_empty());
        let result = storage.get(ACL).await.expect("get");
        assert_eq!(result.public_key.expect("key").id, "pk-a");
        assert!(result.public_params.is_some());

        let err = storage
            .set("0xnot-hex", Some(key_record("pk-c", &[4])), None)
            .await
            .expect_err("invalid key");
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(storage.locks.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let storage = PersistentStorage::open(dir.path());
            storage
                .set(
                    ACL,
                    Some(key_record("pk-id", &[1, 2, 3, 4])),
                    Some(StoredPublicParams::new("pp-id", vec![5u8, 6, 7, 8])),
                )
                .await
                .expect("set");
        }

        let reopened = PersistentStorage::open(dir.path());
        let result = reopened.get(ACL).await.expect("get");
        let key = result.public_key.expect("key");
        assert_eq!(key.id, "pk-id");
        assert_eq!(key.data, Bytes::from_static(&[1, 2, 3, 4]));
        assert_eq!(
            result.public_params.expect("params").bits_2048.public_params_id,
            "pp-id"
        );
        assert!(
            dir.path()
                .join(PUBLIC_KEY_STORE)
                .join(format!("{ACL}.json"))
                .exists()
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn partial_update_keeps_other_collection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PersistentStorage::open(dir.path());
        storage
            .set(
                ACL,
                Some(key_record("pk-1", &[1])),
                Some(StoredPublicParams::new("pp-1", vec![2u8])),
            )
            .await
            .expect("seed");
        storage
            .set(ACL, None, Some(StoredPublicParams::new("pp-2", vec![3u8])))
            .await
            .expect("params only");

        let result = storage.get(ACL).await.expect("get");
        assert_eq!(result.public_key.expect("key").id, "pk-1");
        assert_eq!(
            result.public_params.expect("params").bits_2048.public_params_id,
            "pp-2"
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn corrupted_record_reads_as_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PersistentStorage::open(dir.path());
        storage
            .set(
                ACL,
                Some(key_record("pk", &[1])),
                Some(StoredPublicParams::new("pp", vec![2u8])),
            )
            .await
            .expect("seed");

        let key_path = dir.path().join(PUBLIC_KEY_STORE).join(format!("{ACL}.json"));
        std::fs::write(&key_path, b"{not json").expect("corrupt");
        let params_path = dir.path().join(PARAMS_STORE).join(format!("{ACL}.json"));
        std::fs::write(
            &params_path,
            json!({"acl": ACL, "value": {"publicParamsId": "pp", "publicParams": "AQI="}})
                .to_string(),
        )
        .expect("corrupt params");

        let result = storage.get(ACL).await.expect("get");
        assert!(result.public_key.is_none());
        assert!(result.public_params.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn accepts_buffer_shaped_payloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PersistentStorage::open(dir.path());
        let key_path = dir.path().join(PUBLIC_KEY_STORE).join(format!("{ACL}.json"));
        std::fs::write(
            &key_path,
            json!({
                "acl": ACL,
                "value": {
                    "publicKeyId": "pk-id",
                    "publicKey": {"type": "Buffer", "data": [1, 2, 3, 4]}
                }
            })
            .to_string(),
        )
        .expect("write record");

        let result = storage.get(ACL).await.expect("get");
        assert_eq!(
            result.public_key.expect("key").data,
            Bytes::from_static(&[1, 2, 3, 4])
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn falls_back_to_memory_when_root_unusable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").expect("blocker file");

        let storage = PersistentStorage::open(&blocker);
        assert!(!storage.is_durable());

        storage
            .set(ACL, Some(key_record("pk-mem", &[7])), None)
            .await
            .expect("set via fallback");
        let result = storage.get(ACL).await.expect("get via fallback");
        assert_eq!(result.public_key.expect("key").id, "pk-mem");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = PersistentStorage::open(dir.path());
        let err = storage
            .set("../escape", Some(key_record("pk", &[1])), None)
            .await
            .expect_err("invalid key");
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(storage.get("../escape").await.expect("get").is_empty());
    }
}
