use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// 创建实例过程中按固定顺序推送的进度事件；mock 路径只会推送 `Creating`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningStatus {
    SdkLoading,
    SdkLoaded,
    SdkInitializing,
    SdkInitialized,
    Creating,
}

impl ProvisioningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningStatus::SdkLoading => "sdk-loading",
            ProvisioningStatus::SdkLoaded => "sdk-loaded",
            ProvisioningStatus::SdkInitializing => "sdk-initializing",
            ProvisioningStatus::SdkInitialized => "sdk-initialized",
            ProvisioningStatus::Creating => "creating",
        }
    }
}

impl fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type StatusListener = Arc<dyn Fn(ProvisioningStatus) + Send + Sync>;

pub(crate) fn notify(listener: Option<&StatusListener>, status: ProvisioningStatus) {
    tracing::debug!(target: "fhevm::client", status = %status, "推送创建进度");
    if let Some(listener) = listener {
        listener(status);
    }
}
