use async_trait::async_trait;
use tracing::{debug, info};

use super::{LoadError, RelayerSdk, SdkBindings, SdkProbe, probe_bindings};

pub const SDK_CDN_URL: &str = "https://cdn.zama.ai/relayer-sdk-js/0.2.0/relayer-sdk-js.umd.cjs";

/// SDK 所在的运行时宿主：一份脚本标签「文档」加上全局 `relayerSDK` 绑定。
#[async_trait]
pub trait ScriptHost: Send + Sync + 'static {
    /// 当前全局绑定的快照，未加载时为 `None`。
    fn relayer_sdk(&self) -> Option<SdkBindings>;

    fn has_script(&self, src: &str) -> bool;

    /// 注入并等待脚本加载完成；只有传输层失败才返回错误。
    async fn inject_script(&self, src: &str) -> Result<(), LoadError>;
}

/// 幂等的脚本加载器：已存在合法绑定或同源脚本标签时不会重复拉取。
#[derive(Debug, Clone)]
pub struct RelayerSdkLoader {
    sdk_url: String,
}

impl Default for RelayerSdkLoader {
    fn default() -> Self {
        Self::new(SDK_CDN_URL)
    }
}

impl RelayerSdkLoader {
    pub fn new(sdk_url: impl Into<String>) -> Self {
        Self {
            sdk_url: sdk_url.into(),
        }
    }

    pub fn sdk_url(&self) -> &str {
        &self.sdk_url
    }

    pub fn is_loaded(&self, host: &dyn ScriptHost) -> bool {
        probe_bindings(host.relayer_sdk().as_ref()).is_valid()
    }

    /// 脚本标签已存在但绑定尚未就绪时不会等待进行中的加载，直接按绑定无效返回；
    /// 与另一次仍在拉取脚本的加载重叠的调用方因此会得到 [`LoadError::InvalidBinding`]。
    pub async fn load(&self, host: &dyn ScriptHost) -> Result<RelayerSdk, LoadError> {
        if let Some(bindings) = host.relayer_sdk() {
            debug!(target: "fhevm::relayer", "relayerSDK 绑定已存在，跳过加载");
            return probe_bindings(Some(&bindings))
                .into_result()
                .map_err(LoadError::InvalidBinding);
        }

        if host.has_script(&self.sdk_url) {
            debug!(target: "fhevm::relayer", url = %self.sdk_url, "脚本标签已存在，不再重复拉取");
            return probe_bindings(host.relayer_sdk().as_ref())
                .into_result()
                .map_err(LoadError::InvalidBinding);
        }

        info!(target: "fhevm::relayer", url = %self.sdk_url, "注入 relayer SDK 脚本");
        host.inject_script(&self.sdk_url).await?;

        match probe_bindings(host.relayer_sdk().as_ref()) {
            SdkProbe::Valid(sdk) => Ok(sdk),
            SdkProbe::Invalid(violations) => Err(LoadError::InvalidAfterLoad {
                url: self.sdk_url.clone(),
                violations,
            }),
        }
    }
}
