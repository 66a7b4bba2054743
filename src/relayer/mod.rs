//! relayer SDK 的可用性状态机：按需加载、结构校验、单次初始化。

mod error;
mod host;
mod loader;
mod probe;
mod runtime;
mod types;

pub use error::{LoadError, SdkCallError};
pub use host::{SdkModule, StaticScriptHost};
pub use loader::{RelayerSdkLoader, SDK_CDN_URL, ScriptHost};
pub use probe::{ProbeViolation, ProbeViolations, RelayerSdk, SdkProbe, probe_bindings};
pub use runtime::{InitState, SdkRuntime};
pub use types::{
    CreateInstanceFn, InitSdkFn, InitSdkOptions, InstanceConfig, NetworkConfig, RelayerInstance,
    SdkBindings,
};
