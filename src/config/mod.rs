use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::network::MockChains;
use crate::relayer::SDK_CDN_URL;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_sdk_url() -> String {
    SDK_CDN_URL.to_string()
}

pub(crate) fn default_rpc_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_storage_path() -> PathBuf {
    PathBuf::from(".fhevm/cache")
}

/// TOML 表的键只能是字符串，这里把 `"31337" = "http://..."` 还原成链 id。
pub(crate) fn deserialize_mock_chains<'de, D>(deserializer: D) -> Result<MockChains, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, String>>::deserialize(deserializer)?;
    let mut chains = MockChains::new();
    for (key, url) in raw.unwrap_or_default() {
        let chain_id = key
            .trim()
            .parse::<u64>()
            .map_err(|_| D::Error::custom(format!("invalid chain id `{key}` in mock_chains")))?;
        let url = url.trim();
        if url.is_empty() {
            return Err(D::Error::custom(format!(
                "mock chain {chain_id} has an empty RPC URL"
            )));
        }
        chains.insert(chain_id, url.to_string());
    }
    Ok(chains)
}

pub(crate) fn serialize_mock_chains<S>(chains: &MockChains, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    chains
        .iter()
        .map(|(chain_id, url)| (chain_id.to_string(), url.as_str()))
        .collect::<BTreeMap<_, _>>()
        .serialize(serializer)
}
