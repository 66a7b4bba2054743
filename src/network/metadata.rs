use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::Eip1193Provider;
use crate::error::{FhevmError, FhevmResult};

pub const HARDHAT_NODE_MARKER: &str = "hardhat";
pub const WEB3_CLIENT_VERSION_METHOD: &str = "web3_clientVersion";
pub const RELAYER_METADATA_METHOD: &str = "fhevm_relayer_metadata";

/// 本地开发节点暴露的部署元数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerMetadata {
    #[serde(rename = "ACLAddress")]
    pub acl_address: String,
    #[serde(rename = "InputVerifierAddress")]
    pub input_verifier_address: String,
    #[serde(rename = "KMSVerifierAddress")]
    pub kms_verifier_address: String,
}

pub async fn get_web3_client_version(transport: &dyn Eip1193Provider) -> FhevmResult<Value> {
    transport
        .request(WEB3_CLIENT_VERSION_METHOD, json!([]))
        .await
        .map_err(|source| FhevmError::Web3ClientVersion {
            url: transport.endpoint().to_string(),
            source,
        })
}

pub async fn fetch_fhevm_relayer_metadata(transport: &dyn Eip1193Provider) -> FhevmResult<Value> {
    transport
        .request(RELAYER_METADATA_METHOD, json!([]))
        .await
        .map_err(|source| FhevmError::RelayerMetadata {
            url: transport.endpoint().to_string(),
            source,
        })
}

/// 探测目标是否为带 FHEVM 插件的 Hardhat 节点。
///
/// 大多数网络都不是 mock 网络，因此任何一步失败（请求出错、标识不含
/// `hardhat`、字段缺失或格式不对）都返回 `None`，从不向上抛错。
pub async fn try_fetch_hardhat_node_relayer_metadata(
    transport: &dyn Eip1193Provider,
) -> Option<RelayerMetadata> {
    let endpoint = transport.endpoint();

    let version = match get_web3_client_version(transport).await {
        Ok(version) => version,
        Err(err) => {
            debug!(target: "fhevm::network", endpoint, error = %err, "节点标识查询失败，按非 mock 节点处理");
            return None;
        }
    };

    let is_hardhat = version
        .as_str()
        .is_some_and(|text| text.to_ascii_lowercase().contains(HARDHAT_NODE_MARKER));
    if !is_hardhat {
        debug!(target: "fhevm::network", endpoint, version = %version, "节点标识不含 hardhat 标记");
        return None;
    }

    let metadata = match fetch_fhevm_relayer_metadata(transport).await {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!(target: "fhevm::network", endpoint, error = %err, "获取 relayer 元数据失败");
            return None;
        }
    };

    let parsed = validate_metadata(&metadata);
    if parsed.is_none() {
        debug!(target: "fhevm::network", endpoint, metadata = %metadata, "relayer 元数据结构不合法");
    }
    parsed
}

fn validate_metadata(value: &Value) -> Option<RelayerMetadata> {
    let object = value.as_object()?;
    let field = |name: &str| -> Option<String> {
        object
            .get(name)
            .and_then(Value::as_str)
            .filter(|address| address.starts_with("0x"))
            .map(str::to_string)
    };

    Some(RelayerMetadata {
        acl_address: field("ACLAddress")?,
        input_verifier_address: field("InputVerifierAddress")?,
        kms_verifier_address: field("KMSVerifierAddress")?,
    })
}
