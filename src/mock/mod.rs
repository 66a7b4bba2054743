//! 本地开发链使用的 mock 实例，静态链接，不经过 relayer SDK。

use serde::Serialize;
use tracing::info;

use crate::address::is_hex_address;
use crate::error::{FhevmError, FhevmResult};
use crate::network::RelayerMetadata;

/// mock 网关链 id。
pub const MOCK_GATEWAY_CHAIN_ID: u64 = 55_815;
pub const MOCK_DECRYPTION_VERIFYING_CONTRACT: &str = "0x5ffdaAB0373E62E2ea2944776209aEf29E631A64";
pub const MOCK_INPUT_VERIFICATION_CONTRACT: &str = "0x812b06e1CDCE800494b79fFE4f925A504a9A9810";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCreateParams {
    pub rpc_url: String,
    pub chain_id: u64,
    pub metadata: RelayerMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockInstanceConfig {
    pub acl_contract_address: String,
    pub input_verifier_contract_address: String,
    pub kms_contract_address: String,
    pub verifying_contract_address_decryption: String,
    pub verifying_contract_address_input_verification: String,
    pub chain_id: u64,
    pub gateway_chain_id: u64,
}

impl MockInstanceConfig {
    pub fn from_metadata(chain_id: u64, metadata: &RelayerMetadata) -> Self {
        Self {
            acl_contract_address: metadata.acl_address.clone(),
            input_verifier_contract_address: metadata.input_verifier_address.clone(),
            kms_contract_address: metadata.kms_verifier_address.clone(),
            verifying_contract_address_decryption: MOCK_DECRYPTION_VERIFYING_CONTRACT.to_string(),
            verifying_contract_address_input_verification: MOCK_INPUT_VERIFICATION_CONTRACT
                .to_string(),
            chain_id,
            gateway_chain_id: MOCK_GATEWAY_CHAIN_ID,
        }
    }
}

/// mock 实例：只携带连接信息与合约地址，不持有公钥材料。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockFhevmInstance {
    rpc_url: String,
    config: MockInstanceConfig,
    metadata: RelayerMetadata,
}

impl MockFhevmInstance {
    pub fn create(params: MockCreateParams) -> FhevmResult<Self> {
        if !is_hex_address(&params.metadata.acl_address) {
            return Err(FhevmError::InvalidAclAddress(params.metadata.acl_address));
        }
        let config = MockInstanceConfig::from_metadata(params.chain_id, &params.metadata);
        info!(
            target: "fhevm::client",
            chain_id = params.chain_id,
            rpc_url = %params.rpc_url,
            acl = %config.acl_contract_address,
            "已创建 mock FHEVM 实例"
        );
        Ok(Self {
            rpc_url: params.rpc_url,
            config,
            metadata: params.metadata,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn config(&self) -> &MockInstanceConfig {
        &self.config
    }

    pub fn metadata(&self) -> &RelayerMetadata {
        &self.metadata
    }
}
