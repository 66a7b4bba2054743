use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 目前唯一使用的公共参数规格。
pub const PUBLIC_PARAMS_BITS: u32 = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPublicKey {
    pub public_key_id: String,
    #[serde(with = "super::bytes")]
    pub public_key: Bytes,
}

impl StoredPublicKey {
    pub fn new(id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            public_key_id: id.into(),
            public_key: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPublicParams {
    pub public_params_id: String,
    #[serde(with = "super::bytes")]
    pub public_params: Bytes,
}

impl StoredPublicParams {
    pub fn new(id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            public_params_id: id.into(),
            public_params: data.into(),
        }
    }
}

/// 读取结果中的公钥条目，形如 `{ id, data }`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    pub id: String,
    #[serde(with = "super::bytes")]
    pub data: Bytes,
}

/// 读取结果中的公共参数条目，按参数规格 `"2048"` 分组。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParamsEntry {
    #[serde(rename = "2048")]
    pub bits_2048: StoredPublicParams,
}

/// 公钥与公共参数各自独立命中或缺失。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReadResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyEntry>,
    pub public_params: Option<PublicParamsEntry>,
}

impl StorageReadResult {
    /// 公钥仅在 id 非空时视为命中，公共参数只要存在即命中。
    pub fn from_stored(
        public_key: Option<StoredPublicKey>,
        public_params: Option<StoredPublicParams>,
    ) -> Self {
        let public_key = public_key
            .filter(|stored| !stored.public_key_id.is_empty())
            .map(|stored| PublicKeyEntry {
                id: stored.public_key_id,
                data: stored.public_key,
            });
        let public_params = public_params.map(|stored| PublicParamsEntry { bits_2048: stored });
        Self {
            public_key,
            public_params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.public_key.is_none() && self.public_params.is_none()
    }
}
