//! 面向上层界面的响应式封装：参数变化时取消进行中的请求，只保留最新一次的结果。

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{CreateInstanceParams, FhevmClient, FhevmInstance};
use crate::error::FhevmError;
use crate::network::{MockChains, ProviderInput};
use crate::relayer::InitSdkOptions;
use crate::status::StatusListener;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub instance: Option<FhevmInstance>,
    pub error: Option<Arc<FhevmError>>,
}

impl SessionState {
    fn loading() -> Self {
        Self {
            status: SessionStatus::Loading,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct SessionParams {
    pub provider: Option<ProviderInput>,
    pub enabled: bool,
    pub mock_chains: Option<MockChains>,
    pub init_options: Option<InitSdkOptions>,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            provider: None,
            enabled: true,
            mock_chains: None,
            init_options: None,
        }
    }
}

impl SessionParams {
    pub fn new(provider: impl Into<ProviderInput>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
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
}

impl fmt::Debug for SessionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionParams")
            .field("provider", &self.provider)
            .field("enabled", &self.enabled)
            .field("mock_chains", &self.mock_chains)
            .field("init_options", &self.init_options)
            .finish()
    }
}

#[derive(Default)]
struct SessionInner {
    params: Option<SessionParams>,
    current: Option<CancellationToken>,
    generation: u64,
}

/// 每次参数变化都会顶替进行中的请求；被顶替请求的结果直接丢弃。
///
/// `set_params` / `refresh` 需要在 tokio 运行时中调用。
pub struct FhevmSession {
    client: Arc<FhevmClient>,
    state: Arc<watch::Sender<SessionState>>,
    inner: Arc<Mutex<SessionInner>>,
    root: CancellationToken,
    on_status: Option<StatusListener>,
}

impl FhevmSession {
    pub fn new(client: Arc<FhevmClient>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            client,
            state: Arc::new(state),
            inner: Arc::new(Mutex::new(SessionInner::default())),
            root: CancellationToken::new(),
            on_status: None,
        }
    }

    pub fn with_status_listener(mut self, listener: StatusListener) -> Self {
        self.on_status = Some(listener);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn set_params(&self, params: SessionParams) {
        let mut inner = self.inner.lock();
        self.restart(&mut inner, params);
    }

    /// 清空当前结果，并用上一次的参数重新创建。
    pub fn refresh(&self) {
        let mut inner = self.inner.lock();
        match inner.params.clone() {
            Some(params) => self.restart(&mut inner, params),
            None => {
                self.state.send_replace(SessionState::default());
            }
        }
    }

    /// 等待当前请求结束（状态离开 `Loading`）。
    pub async fn settled(&self) -> SessionState {
        let mut receiver = self.subscribe();
        let outcome = receiver
            .wait_for(|state| state.status != SessionStatus::Loading)
            .await
            .map(|state| state.clone());
        outcome.unwrap_or_else(|_| self.state())
    }

    fn restart(&self, inner: &mut SessionInner, params: SessionParams) {
        if let Some(previous) = inner.current.take() {
            previous.cancel();
        }
        inner.generation += 1;
        inner.params = Some(params.clone());

        let provider = match params.provider {
            Some(provider) if params.enabled => provider,
            _ => {
                debug!(
                    target: "fhevm::session",
                    enabled = params.enabled,
                    "会话未启用或缺少 provider，回到 idle"
                );
                self.state.send_replace(SessionState::default());
                return;
            }
        };

        let token = self.root.child_token();
        inner.current = Some(token.clone());
        self.state.send_replace(SessionState::loading());

        let generation = inner.generation;
        let request = CreateInstanceParams {
            provider,
            token: token.clone(),
            mock_chains: params.mock_chains,
            on_status: self.on_status.clone(),
            init_options: params.init_options,
        };
        let client = self.client.clone();
        let state = self.state.clone();
        let shared = self.inner.clone();

        tokio::spawn(async move {
            let outcome = client.create_instance(request).await;

            let guard = shared.lock();
            if token.is_cancelled() || guard.generation != generation {
                debug!(target: "fhevm::session", generation, "请求已被顶替，丢弃结果");
                return;
            }
            let next = match outcome {
                Ok(instance) => SessionState {
                    status: SessionStatus::Ready,
                    instance: Some(instance),
                    error: None,
                },
                Err(err) => SessionState {
                    status: SessionStatus::Error,
                    instance: None,
                    error: Some(Arc::new(err)),
                },
            };
            state.send_replace(next);
            drop(guard);
        });
    }
}

impl Drop for FhevmSession {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
