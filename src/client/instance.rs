use std::fmt;
use std::sync::Arc;

use crate::cache::{StoredPublicKey, StoredPublicParams};
use crate::mock::MockFhevmInstance;
use crate::relayer::RelayerInstance;

/// 一次创建流程的产物：真实网络走 relayer SDK，本地开发链走 mock。
#[derive(Clone)]
pub enum FhevmInstance {
    Relayer(Arc<dyn RelayerInstance>),
    Mock(Arc<MockFhevmInstance>),
}

impl FhevmInstance {
    pub fn kind(&self) -> &'static str {
        match self {
            FhevmInstance::Relayer(_) => "relayer",
            FhevmInstance::Mock(_) => "mock",
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, FhevmInstance::Mock(_))
    }

    pub fn as_mock(&self) -> Option<&MockFhevmInstance> {
        match self {
            FhevmInstance::Mock(instance) => Some(instance),
            FhevmInstance::Relayer(_) => None,
        }
    }

    pub fn as_relayer(&self) -> Option<&Arc<dyn RelayerInstance>> {
        match self {
            FhevmInstance::Relayer(instance) => Some(instance),
            FhevmInstance::Mock(_) => None,
        }
    }

    pub fn public_key(&self) -> Option<StoredPublicKey> {
        self.as_relayer()
            .and_then(|instance| instance.get_public_key())
    }

    pub fn public_params(&self, bits: u32) -> Option<StoredPublicParams> {
        self.as_relayer()
            .and_then(|instance| instance.get_public_params(bits))
    }
}

impl fmt::Debug for FhevmInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhevmInstance::Relayer(_) => f.debug_tuple("Relayer").finish_non_exhaustive(),
            FhevmInstance::Mock(instance) => f.debug_tuple("Mock").field(instance).finish(),
        }
    }
}
