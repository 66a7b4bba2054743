//! 实例创建流程的编排：网络解析、mock 分支、SDK 就绪、公钥缓存与实例构造。

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::address::is_hex_address;
use crate::cache::{PUBLIC_PARAMS_BITS, PublicKeyStorage, default_storage};
use crate::error::{FhevmError, FhevmResult, ensure_not_aborted};
use crate::mock::{MockCreateParams, MockFhevmInstance};
use crate::monitoring::events;
use crate::network::{
    HttpTransportFactory, MockChains, ProviderInput, ResolvedNetwork, TransportFactory,
    TransportPool, resolve_network, try_fetch_hardhat_node_relayer_metadata,
};
use crate::relayer::{
    InitSdkOptions, InstanceConfig, NetworkConfig, RelayerInstance, RelayerSdkLoader, ScriptHost,
    SdkRuntime, StaticScriptHost,
};
use crate::status::{ProvisioningStatus, StatusListener, notify};

mod instance;


pub use instance::FhevmInstance;

/// 构造 mock 实例的入口，默认为 [`MockFhevmInstance::create`]。
pub type MockFactory =
    Arc<dyn Fn(MockCreateParams) -> FhevmResult<MockFhevmInstance> + Send + Sync>;

static DEFAULT_CLIENT: Lazy<FhevmClient> = Lazy::new(|| FhevmClient::builder().build());

/// 单次创建请求的参数。
#[derive(Clone)]
pub struct CreateInstanceParams {
    pub provider: ProviderInput,
    pub token: CancellationToken,
    pub mock_chains: Option<MockChains>,
    pub on_status: Option<StatusListener>,
    pub init_options: Option<InitSdkOptions>,
}

impl CreateInstanceParams {
    pub fn new(provider: impl Into<ProviderInput>) -> Self {
        Self {
            provider: provider.into(),
            token: CancellationToken::new(),
            mock_chains: None,
            on_status: None,
            init_options: None,
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_mock_chains(mut self, mock_chains: MockChains) -> Self {
        self.mock_chains = Some(mock_chains);
        self
    }

    pub fn with_init_options(mut self, options: InitSdkOptions) -> Self {
        self.init_options = Some(options);
        self
    }

    pub fn on_status<F>(mut self, listener: F) -> Self
    where
        F: Fn(ProvisioningStatus) + Send + Sync + 'static,
    {
        self.on_status = Some(Arc::new(listener));
        self
    }

    pub fn with_listener(mut self, listener: Option<StatusListener>) -> Self {
        self.on_status = listener;
        self
    }
}

impl fmt::Debug for CreateInstanceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateInstanceParams")
            .field("provider", &self.provider)
            .field("cancelled", &self.token.is_cancelled())
            .field("mock_chains", &self.mock_chains)
            .field("on_status", &self.on_status.is_some())
            .field("init_options", &self.init_options)
            .finish()
    }
}

#[derive(Default)]
pub struct FhevmClientBuilder {
    storage: Option<Arc<dyn PublicKeyStorage>>,
    runtime: Option<Arc<SdkRuntime>>,
    host: Option<Arc<dyn ScriptHost>>,
    loader: Option<RelayerSdkLoader>,
    transports: Option<Arc<dyn TransportFactory>>,
    mock_factory: Option<MockFactory>,
}

impl FhevmClientBuilder {
    pub fn storage(mut self, storage: Arc<dyn PublicKeyStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// 共享已有的 SDK 运行时；设置后 `script_host`/`loader` 不再生效。
    pub fn runtime(mut self, runtime: Arc<SdkRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn loader(mut self, loader: RelayerSdkLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn transports<F>(mut self, factory: F) -> Self
    where
        F: TransportFactory,
    {
        self.transports = Some(Arc::new(factory));
        self
    }

    pub fn mock_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(MockCreateParams) -> FhevmResult<MockFhevmInstance> + Send + Sync + 'static,
    {
        self.mock_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> FhevmClient {
        let runtime = match (self.runtime, self.host, self.loader) {
            (Some(runtime), _, _) => runtime,
            (None, None, None) => SdkRuntime::global(),
            (None, host, loader) => Arc::new(SdkRuntime::new(
                host.unwrap_or_else(|| Arc::new(StaticScriptHost::new()) as Arc<dyn ScriptHost>),
                loader.unwrap_or_default(),
            )),
        };

        FhevmClient {
            storage: self.storage.unwrap_or_else(default_storage),
            runtime,
            transports: self.transports.unwrap_or_else(|| {
                Arc::new(TransportPool::new(HttpTransportFactory::default()))
                    as Arc<dyn TransportFactory>
            }),
            mock_factory: self
                .mock_factory
                .unwrap_or_else(|| Arc::new(MockFhevmInstance::create) as MockFactory),
        }
    }
}

/// 实例创建的编排器。依赖全部注入，多个客户端可以共享同一个 [`SdkRuntime`]。
pub struct FhevmClient {
    storage: Arc<dyn PublicKeyStorage>,
    runtime: Arc<SdkRuntime>,
    transports: Arc<dyn TransportFactory>,
    mock_factory: MockFactory,
}

impl FhevmClient {
    pub fn builder() -> FhevmClientBuilder {
        FhevmClientBuilder::default()
    }

    pub fn storage(&self) -> &Arc<dyn PublicKeyStorage> {
        &self.storage
    }

    pub fn runtime(&self) -> &Arc<SdkRuntime> {
        &self.runtime
    }

    pub fn transports(&self) -> &Arc<dyn TransportFactory> {
        &self.transports
    }

    /// 按顺序执行完整的创建流程，每个挂起点之后都检查一次取消。
    ///
    /// 取消是协作式的：已经发出的调用会执行完毕，之后返回 [`FhevmError::Aborted`]；
    /// 已写入的缓存不会回滚。
    pub async fn create_instance(
        &self,
        params: CreateInstanceParams,
    ) -> FhevmResult<FhevmInstance> {
        let started = Instant::now();
        let outcome = self.provision(&params).await;
        match &outcome {
            Ok(instance) => events::instance_created(instance.kind(), started.elapsed()),
            Err(err) => events::provisioning_failed(err.code(), started.elapsed()),
        }
        outcome
    }

    async fn provision(&self, params: &CreateInstanceParams) -> FhevmResult<FhevmInstance> {
        let token = &params.token;
        let listener = params.on_status.as_ref();
        ensure_not_aborted(token)?;

        let resolved = resolve_network(
            &params.provider,
            params.mock_chains.as_ref(),
            self.transports.as_ref(),
        )
        .await?;
        ensure_not_aborted(token)?;
        events::network_resolved(&resolved);

        if let Some(instance) = self.try_create_mock_instance(&resolved, token, listener).await? {
            return Ok(instance);
        }

        let sdk = self.runtime.ensure_available(token, listener).await?;
        self.runtime
            .ensure_initialized(params.init_options.clone(), token, listener)
            .await?;

        let defaults = sdk.default_config().clone();
        let acl_address = validated_acl_address(&defaults)?;

        let cached = self.storage.get(&acl_address).await?;
        ensure_not_aborted(token)?;
        events::cache_lookup(
            &acl_address,
            cached.public_key.is_some(),
            cached.public_params.is_some(),
        );

        notify(listener, ProvisioningStatus::Creating);
        let config = InstanceConfig {
            defaults,
            network: params.provider.clone(),
            public_key: cached.public_key,
            public_params: cached.public_params,
        };
        let instance = sdk
            .create_instance(config)
            .await
            .map_err(|source| FhevmError::Sdk {
                call: "createInstance",
                source,
            })?;
        ensure_not_aborted(token)?;

        self.write_back(&acl_address, instance.as_ref()).await;
        ensure_not_aborted(token)?;

        info!(target: "fhevm::client", acl_address = %acl_address, "relayer 实例已就绪");
        Ok(FhevmInstance::Relayer(instance))
    }

    async fn try_create_mock_instance(
        &self,
        resolved: &ResolvedNetwork,
        token: &CancellationToken,
        listener: Option<&StatusListener>,
    ) -> FhevmResult<Option<FhevmInstance>> {
        let ResolvedNetwork::Mock { chain_id, rpc_url } = resolved else {
            return Ok(None);
        };

        let transport = match self.transports.connect(rpc_url) {
            Ok(transport) => transport,
            Err(err) => {
                events::mock_metadata_unavailable(*chain_id, rpc_url, &err.to_string());
                return Ok(None);
            }
        };
        let metadata = try_fetch_hardhat_node_relayer_metadata(transport.as_ref()).await;
        ensure_not_aborted(token)?;

        let Some(metadata) = metadata else {
            events::mock_metadata_unavailable(*chain_id, rpc_url, "not a FHEVM hardhat node");
            return Ok(None);
        };

        notify(listener, ProvisioningStatus::Creating);
        let instance = (self.mock_factory)(MockCreateParams {
            rpc_url: rpc_url.clone(),
            chain_id: *chain_id,
            metadata,
        })?;
        ensure_not_aborted(token)?;

        Ok(Some(FhevmInstance::Mock(Arc::new(instance))))
    }

    async fn write_back(&self, acl_address: &str, instance: &dyn RelayerInstance) {
        let public_key = instance.get_public_key();
        let public_params = instance.get_public_params(PUBLIC_PARAMS_BITS);
        debug!(
            target: "fhevm::client",
            acl_address,
            has_key = public_key.is_some(),
            has_params = public_params.is_some(),
            "回写公钥缓存"
        );
        if let Err(err) = self.storage.set(acl_address, public_key, public_params).await {
            events::cache_write_failed(acl_address, &err);
        }
    }
}

impl fmt::Debug for FhevmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FhevmClient")
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

fn validated_acl_address(config: &NetworkConfig) -> FhevmResult<String> {
    match config.acl_contract_address() {
        Some(address) if is_hex_address(address) => Ok(address.to_string()),
        _ => {
            let raw = config
                .get(NetworkConfig::ACL_CONTRACT_ADDRESS)
                .map_or_else(|| "undefined".to_string(), Value::to_string);
            Err(FhevmError::InvalidAclAddress(raw))
        }
    }
}

/// 使用进程级默认客户端创建实例。
pub async fn create_fhevm_instance(params: CreateInstanceParams) -> FhevmResult<FhevmInstance> {
    DEFAULT_CLIENT.create_instance(params).await
}
