use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{InMemoryStorage, PersistentStorage, PublicKeyStorage};
use crate::client::FhevmClient;
use crate::network::{
    HttpTransportFactory, MockChains, TransportPool, build_http_client, merged_mock_chains,
};
use crate::relayer::{InitSdkOptions, RelayerSdkLoader, ScriptHost, SdkRuntime, StaticScriptHost};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FhevmConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub relayer: RelayerSettings,
    #[serde(default)]
    pub rpc: RpcSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_logging_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// 命令行未指定 `--rpc-url` 时使用的节点地址。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// 额外的本地开发链，键为链 id；会与内置的 31337 合并。
    #[serde(
        default,
        deserialize_with = "super::deserialize_mock_chains",
        serialize_with = "super::serialize_mock_chains"
    )]
    pub mock_chains: MockChains,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerSettings {
    #[serde(default = "super::default_sdk_url")]
    pub sdk_url: String,
    /// 注入脚本时是否真正拉取 `sdk_url`。
    #[serde(default)]
    pub fetch_script: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<u32>,
}

impl Default for RelayerSettings {
    fn default() -> Self {
        Self {
            sdk_url: super::default_sdk_url(),
            fetch_script: false,
            thread_count: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    #[serde(default = "super::default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            timeout_ms: super::default_rpc_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Persistent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "super::default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: super::default_storage_path(),
        }
    }
}

impl FhevmConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.timeout_ms)
    }

    pub fn mock_chains(&self) -> MockChains {
        merged_mock_chains(Some(&self.network.mock_chains))
    }

    pub fn init_options(&self) -> Option<InitSdkOptions> {
        self.relayer.thread_count.map(InitSdkOptions::with_threads)
    }

    pub fn build_storage(&self) -> Arc<dyn PublicKeyStorage> {
        match self.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryStorage::new()),
            StorageBackend::Persistent => Arc::new(PersistentStorage::open(self.storage.path.clone())),
        }
    }

    pub fn build_script_host(&self) -> StaticScriptHost {
        if self.relayer.fetch_script {
            StaticScriptHost::with_fetch(build_http_client(self.rpc_timeout()))
        } else {
            StaticScriptHost::new()
        }
    }

    /// 按配置装配客户端；传入的脚本宿主用于预先注册 SDK 模块。
    pub fn build_client_with_host(&self, host: Arc<dyn ScriptHost>) -> FhevmClient {
        let runtime = SdkRuntime::new(host, RelayerSdkLoader::new(self.relayer.sdk_url.clone()));
        FhevmClient::builder()
            .storage(self.build_storage())
            .runtime(Arc::new(runtime))
            .transports(TransportPool::new(HttpTransportFactory::new(
                self.rpc_timeout(),
            )))
            .build()
    }

    pub fn build_client(&self) -> FhevmClient {
        self.build_client_with_host(Arc::new(self.build_script_host()))
    }
}
