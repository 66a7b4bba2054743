//! FHEVM 实例创建：解析目标网络，本地开发链走 mock 实例，其余网络按需加载
//! relayer SDK、初始化并构造实例，同时维护按 ACL 地址分组的公钥缓存。

pub mod address;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod monitoring;
pub mod network;
pub mod relayer;
pub mod session;
pub mod status;

pub use cache::{PublicKeyStorage, StorageError, StorageReadResult};
pub use client::{
    CreateInstanceParams, FhevmClient, FhevmClientBuilder, FhevmInstance, create_fhevm_instance,
};
pub use error::{FhevmError, FhevmResult};
pub use network::{Eip1193Provider, MockChains, ProviderInput, ResolvedNetwork};
pub use session::{FhevmSession, SessionParams, SessionState, SessionStatus};
pub use status::{ProvisioningStatus, StatusListener};
