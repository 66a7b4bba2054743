use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SdkCallError;
use crate::cache::{PublicKeyEntry, PublicParamsEntry, StoredPublicKey, StoredPublicParams};
use crate::network::ProviderInput;

/// 透传给 `initSDK` 的初始化参数，本层不解释其含义。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSdkOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfhe_params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_params: Option<Value>,
}

impl InitSdkOptions {
    pub fn with_threads(thread: u32) -> Self {
        Self {
            thread: Some(thread),
            ..Self::default()
        }
    }
}

/// SDK 自带的默认网络配置（`SepoliaConfig`），字段集合由 SDK 决定。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkConfig(Map<String, Value>);

impl NetworkConfig {
    pub const ACL_CONTRACT_ADDRESS: &'static str = "aclContractAddress";

    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn acl_contract_address(&self) -> Option<&str> {
        self.0.get(Self::ACL_CONTRACT_ADDRESS).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// 交给 `createInstance` 的最终配置：默认网络配置 + 调用方的网络入口 + 缓存命中的公钥材料。
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub defaults: NetworkConfig,
    pub network: ProviderInput,
    pub public_key: Option<PublicKeyEntry>,
    pub public_params: Option<PublicParamsEntry>,
}

impl InstanceConfig {
    pub fn acl_contract_address(&self) -> Option<&str> {
        self.defaults.acl_contract_address()
    }
}

/// `createInstance` 返回的实例中本层关心的部分。
pub trait RelayerInstance: Send + Sync {
    fn get_public_key(&self) -> Option<StoredPublicKey>;

    fn get_public_params(&self, bits: u32) -> Option<StoredPublicParams>;
}

pub type InitSdkFn = Arc<
    dyn Fn(Option<InitSdkOptions>) -> BoxFuture<'static, Result<bool, SdkCallError>> + Send + Sync,
>;

pub type CreateInstanceFn = Arc<
    dyn Fn(InstanceConfig) -> BoxFuture<'static, Result<Arc<dyn RelayerInstance>, SdkCallError>>
        + Send
        + Sync,
>;

/// 运行时 `relayerSDK` 绑定的原始形态，字段未经校验。
///
/// 通过 [`probe_bindings`](super::probe_bindings) 校验后才能得到可用的 [`RelayerSdk`](super::RelayerSdk)。
#[derive(Clone, Default)]
pub struct SdkBindings {
    pub init_sdk: Option<InitSdkFn>,
    pub create_instance: Option<CreateInstanceFn>,
    pub sepolia_config: Option<Value>,
    pub initialized: Option<Value>,
}

impl SdkBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init_sdk<F, Fut>(mut self, init_sdk: F) -> Self
    where
        F: Fn(Option<InitSdkOptions>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, SdkCallError>> + Send + 'static,
    {
        let init_sdk: InitSdkFn = Arc::new(move |options| init_sdk(options).boxed());
        self.init_sdk = Some(init_sdk);
        self
    }

    pub fn with_create_instance<F, Fut>(mut self, create_instance: F) -> Self
    where
        F: Fn(InstanceConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn RelayerInstance>, SdkCallError>> + Send + 'static,
    {
        let create_instance: CreateInstanceFn =
            Arc::new(move |config| create_instance(config).boxed());
        self.create_instance = Some(create_instance);
        self
    }

    pub fn with_sepolia_config(mut self, config: Value) -> Self {
        self.sepolia_config = Some(config);
        self
    }

    pub fn with_initialized(mut self, initialized: Value) -> Self {
        self.initialized = Some(initialized);
        self
    }
}

impl fmt::Debug for SdkBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkBindings")
            .field("init_sdk", &self.init_sdk.is_some())
            .field("create_instance", &self.create_instance.is_some())
            .field("sepolia_config", &self.sepolia_config)
            .field("initialized", &self.initialized)
            .finish()
    }
}
