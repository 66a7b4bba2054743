use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{LoadError, ScriptHost, SdkBindings};

/// 静态链接的 SDK 模块：脚本「执行」时产出一份绑定。
pub type SdkModule = Arc<dyn Fn() -> SdkBindings + Send + Sync>;

/// 进程内的脚本宿主。
///
/// 脚本地址对应的模块在编译期注册，注入脚本即执行对应模块并写入全局绑定。
/// 配置了 HTTP 客户端时会先真实拉取一次脚本内容，使传输层错误可以被观察到。
#[derive(Default)]
pub struct StaticScriptHost {
    scripts: DashSet<String>,
    modules: DashMap<String, SdkModule>,
    binding: RwLock<Option<SdkBindings>>,
    fetcher: Option<reqwest::Client>,
}

impl StaticScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch(client: reqwest::Client) -> Self {
        Self {
            fetcher: Some(client),
            ..Self::default()
        }
    }

    pub fn register_module<F>(&self, src: impl Into<String>, module: F)
    where
        F: Fn() -> SdkBindings + Send + Sync + 'static,
    {
        self.modules.insert(src.into(), Arc::new(module));
    }

    /// 直接安装全局绑定，相当于宿主页面预先放好了 `relayerSDK`。
    pub fn install_binding(&self, bindings: SdkBindings) {
        *self.binding.write() = Some(bindings);
    }

    pub fn clear_binding(&self) {
        self.binding.write().take();
    }

    /// 登记一个已存在的脚本标签（不触发加载）。
    pub fn add_script_tag(&self, src: impl Into<String>) {
        self.scripts.insert(src.into());
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    async fn fetch(&self, client: &reqwest::Client, src: &str) -> Result<(), LoadError> {
        let transport = |reason: String| LoadError::Transport {
            url: src.to_string(),
            reason,
        };
        let response = client
            .get(src)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| transport(err.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|err| transport(err.to_string()))?;
        debug!(target: "fhevm::relayer", url = src, bytes = body.len(), "脚本内容已拉取");
        Ok(())
    }
}

#[async_trait]
impl ScriptHost for StaticScriptHost {
    fn relayer_sdk(&self) -> Option<SdkBindings> {
        self.binding.read().clone()
    }

    fn has_script(&self, src: &str) -> bool {
        self.scripts.contains(src)
    }

    async fn inject_script(&self, src: &str) -> Result<(), LoadError> {
        self.scripts.insert(src.to_string());

        if let Some(client) = &self.fetcher {
            if let Err(err) = self.fetch(client, src).await {
                self.scripts.remove(src);
                warn!(target: "fhevm::relayer", url = src, error = %err, "脚本加载失败");
                return Err(err);
            }
        }

        let module = self.modules.get(src).map(|entry| entry.value().clone());
        match module {
            Some(module) => {
                self.install_binding(module());
                debug!(target: "fhevm::relayer", url = src, "模块已执行，relayerSDK 绑定就绪");
            }
            None => {
                debug!(target: "fhevm::relayer", url = src, "该脚本没有静态链接的模块");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StaticScriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticScriptHost")
            .field("scripts", &self.scripts.len())
            .field("modules", &self.modules.len())
            .field("bound", &self.binding.read().is_some())
            .field("fetch", &self.fetcher.is_some())
            .finish()
    }
}
