use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    InitSdkOptions, RelayerSdk, RelayerSdkLoader, ScriptHost, StaticScriptHost, probe_bindings,
};
use crate::error::{FhevmError, FhevmResult, ensure_not_aborted};
use crate::monitoring::events;
use crate::status::{ProvisioningStatus, StatusListener, notify};

const FLAG_UNSET: u8 = 0;
const FLAG_TRUE: u8 = 1;
const FLAG_FALSE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Unset,
    Initialized,
    Failed,
}

impl InitState {
    fn from_flag(flag: u8) -> Self {
        match flag {
            FLAG_TRUE => InitState::Initialized,
            FLAG_FALSE => InitState::Failed,
            _ => InitState::Unset,
        }
    }
}

static GLOBAL_HOST: Lazy<Arc<StaticScriptHost>> =
    Lazy::new(|| Arc::new(StaticScriptHost::new()));

static GLOBAL_RUNTIME: Lazy<Arc<SdkRuntime>> = Lazy::new(|| {
    Arc::new(SdkRuntime::new(GLOBAL_HOST.clone(), RelayerSdkLoader::default()))
});

/// 同一运行时内所有创建请求共享的 SDK 状态：宿主、已采纳的绑定与初始化标记。
///
/// 初始化是单飞的：第一个调用方持锁执行 `initSDK`，并发进入的调用方
/// 等锁后重新读取标记，已成功则直接跳过。
pub struct SdkRuntime {
    host: Arc<dyn ScriptHost>,
    loader: RelayerSdkLoader,
    sdk: RwLock<Option<RelayerSdk>>,
    initialized: AtomicU8,
    init_lock: Mutex<()>,
}

impl SdkRuntime {
    pub fn new(host: Arc<dyn ScriptHost>, loader: RelayerSdkLoader) -> Self {
        Self {
            host,
            loader,
            sdk: RwLock::new(None),
            initialized: AtomicU8::new(FLAG_UNSET),
            init_lock: Mutex::new(()),
        }
    }

    /// 进程级共享实例，供不需要自行注入运行时的调用方使用。
    pub fn global() -> Arc<SdkRuntime> {
        GLOBAL_RUNTIME.clone()
    }

    /// 进程级运行时背后的脚本宿主，用于注册 SDK 模块或直接安装绑定。
    pub fn global_host() -> Arc<StaticScriptHost> {
        GLOBAL_HOST.clone()
    }

    pub fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.host
    }

    pub fn loader(&self) -> &RelayerSdkLoader {
        &self.loader
    }

    pub fn init_state(&self) -> InitState {
        InitState::from_flag(self.initialized.load(Ordering::Acquire))
    }

    /// 当前可用的 SDK 句柄；首次看到合法绑定时采纳它，并用绑定上的
    /// `__initialized__` 初始化标记。
    pub fn sdk(&self) -> Option<RelayerSdk> {
        if let Some(sdk) = self.sdk.read().clone() {
            return Some(sdk);
        }

        let sdk = probe_bindings(self.host.relayer_sdk().as_ref())
            .into_result()
            .ok()?;
        let mut slot = self.sdk.write();
        if let Some(existing) = slot.as_ref() {
            return Some(existing.clone());
        }
        if let Some(flag) = sdk.initialized() {
            self.store_flag(flag);
        }
        *slot = Some(sdk.clone());
        Some(sdk)
    }

    fn store_flag(&self, initialized: bool) {
        let flag = if initialized { FLAG_TRUE } else { FLAG_FALSE };
        self.initialized.store(flag, Ordering::Release);
    }

    pub async fn ensure_available(
        &self,
        token: &CancellationToken,
        listener: Option<&StatusListener>,
    ) -> FhevmResult<RelayerSdk> {
        if let Some(sdk) = self.sdk() {
            return Ok(sdk);
        }

        notify(listener, ProvisioningStatus::SdkLoading);
        let started = Instant::now();
        let loaded = self.loader.load(self.host.as_ref()).await;
        events::sdk_load_finished(self.loader.sdk_url(), loaded.is_ok(), started.elapsed());
        loaded?;
        ensure_not_aborted(token)?;
        notify(listener, ProvisioningStatus::SdkLoaded);

        self.sdk().ok_or_else(|| {
            FhevmError::RelayerUnavailable(
                "relayerSDK binding is not available after loading".into(),
            )
        })
    }

    pub async fn ensure_initialized(
        &self,
        options: Option<InitSdkOptions>,
        token: &CancellationToken,
        listener: Option<&StatusListener>,
    ) -> FhevmResult<()> {
        let sdk = self.sdk().ok_or_else(|| {
            FhevmError::RelayerUnavailable("relayerSDK binding is not available".into())
        })?;
        if self.init_state() == InitState::Initialized {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if self.init_state() == InitState::Initialized {
            debug!(target: "fhevm::relayer", "并发请求已完成 SDK 初始化，跳过");
            return Ok(());
        }

        notify(listener, ProvisioningStatus::SdkInitializing);
        let started = Instant::now();
        let outcome = sdk.init_sdk(options).await;
        ensure_not_aborted(token)?;

        let initialized = outcome.map_err(|source| FhevmError::Sdk {
            call: "initSDK",
            source,
        })?;
        self.store_flag(initialized);
        events::sdk_initialized(initialized, started.elapsed());
        if !initialized {
            return Err(FhevmError::RelayerInitFailed);
        }

        notify(listener, ProvisioningStatus::SdkInitialized);
        Ok(())
    }
}

impl fmt::Debug for SdkRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkRuntime")
            .field("loader", &self.loader)
            .field("adopted", &self.sdk.read().is_some())
            .field("init_state", &self.init_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    use super::*;
    use crate::relayer::{RelayerInstance, SDK_CDN_URL, SdkBindings, SdkCallError};

    fn bindings(calls: Arc<AtomicUsize>, result: bool, delay: Duration) -> SdkBindings {
        SdkBindings::new()
            .with_init_sdk(move |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    Ok(result)
                }
            })
            .with_create_instance(|_| async {
                Err::<Arc<dyn RelayerInstance>, _>(SdkCallError::message("unused"))
            })
            .with_sepolia_config(json!({
                "aclContractAddress": "0x687820221192C5B662b25367F70076A37bc79b6c"
            }))
    }

    fn runtime_with(bindings: SdkBindings) -> SdkRuntime {
        let host = StaticScriptHost::new();
        host.install_binding(bindings);
        SdkRuntime::new(Arc::new(host), RelayerSdkLoader::default())
    }

    fn recorder() -> (StatusListener, Arc<SyncMutex<Vec<ProvisioningStatus>>>) {
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: StatusListener = Arc::new(move |status| sink.lock().push(status));
        (listener, seen)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn initializes_exactly_once_in_sequence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with(bindings(calls.clone(), true, Duration::ZERO));
        let token = CancellationToken::new();

        runtime.ensure_initialized(None, &token, None).await.expect("first");
        runtime.ensure_initialized(None, &token, None).await.expect("second");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.init_state(), InitState::Initialized);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn overlapping_callers_share_one_initialization() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runtime = Arc::new(runtime_with(bindings(
            calls.clone(),
            true,
            Duration::from_millis(20),
        )));
        let token = CancellationToken::new();

        let (first, second) = tokio::join!(
            runtime.ensure_initialized(None, &token, None),
            runtime.ensure_initialized(None, &token, None),
        );
        first.expect("first");
        second.expect("second");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn falsy_result_fails_and_allows_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with(bindings(calls.clone(), false, Duration::ZERO));
        let token = CancellationToken::new();
        let (listener, seen) = recorder();

        let err = runtime
            .ensure_initialized(None, &token, Some(&listener))
            .await
            .expect_err("init returns false");
        assert_eq!(err.code(), "RELAYER_INIT_FAILED");
        assert_eq!(runtime.init_state(), InitState::Failed);
        assert_eq!(*seen.lock(), vec![ProvisioningStatus::SdkInitializing]);

        let _ = runtime.ensure_initialized(None, &token, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn seeded_flag_skips_initializer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with(
            bindings(calls.clone(), true, Duration::ZERO).with_initialized(json!(true)),
        );
        let (listener, seen) = recorder();

        runtime
            .ensure_initialized(None, &CancellationToken::new(), Some(&listener))
            .await
            .expect("already initialized");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancellation_during_init_leaves_flag_unset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runtime = runtime_with(bindings(calls.clone(), true, Duration::ZERO));
        let token = CancellationToken::new();
        token.cancel();

        let err = runtime
            .ensure_initialized(None, &token, None)
            .await
            .expect_err("aborted");
        assert!(err.is_aborted());
        assert_eq!(runtime.init_state(), InitState::Unset);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn loads_on_demand_and_emits_load_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let host = StaticScriptHost::new();
        host.register_module(SDK_CDN_URL, move || {
            bindings(calls.clone(), true, Duration::ZERO)
        });
        let runtime = SdkRuntime::new(Arc::new(host), RelayerSdkLoader::default());
        let (listener, seen) = recorder();

        runtime
            .ensure_available(&CancellationToken::new(), Some(&listener))
            .await
            .expect("available");
        assert_eq!(
            *seen.lock(),
            vec![ProvisioningStatus::SdkLoading, ProvisioningStatus::SdkLoaded]
        );

        runtime
            .ensure_available(&CancellationToken::new(), Some(&listener))
            .await
            .expect("still available");
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unavailable_without_module() {
        let runtime = SdkRuntime::new(
            Arc::new(StaticScriptHost::new()),
            RelayerSdkLoader::default(),
        );
        let err = runtime
            .ensure_available(&CancellationToken::new(), None)
            .await
            .expect_err("nothing to load");
        assert_eq!(err.code(), "RELAYER_UNAVAILABLE");
    }
}
