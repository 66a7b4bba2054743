use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::RpcResult;

/// 钱包风格的请求接口：与 EIP-1193 `request({ method, params })` 语义一致。
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> RpcResult<Value>;

    /// 用于日志与错误信息的端点描述。
    fn endpoint(&self) -> &str {
        "eip1193"
    }
}

/// 调用方传入的链接入点：裸 RPC URL 或可发请求的 provider 对象。
#[derive(Clone)]
pub enum ProviderInput {
    Url(String),
    Provider(Arc<dyn Eip1193Provider>),
}

impl ProviderInput {
    pub fn url(&self) -> Option<&str> {
        match self {
            ProviderInput::Url(url) => Some(url.as_str()),
            ProviderInput::Provider(_) => None,
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            ProviderInput::Url(url) => url.as_str(),
            ProviderInput::Provider(provider) => provider.endpoint(),
        }
    }
}

impl fmt::Debug for ProviderInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderInput::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ProviderInput::Provider(provider) => f
                .debug_tuple("Provider")
                .field(&provider.endpoint())
                .finish(),
        }
    }
}

impl From<&str> for ProviderInput {
    fn from(value: &str) -> Self {
        ProviderInput::Url(value.to_string())
    }
}

impl From<String> for ProviderInput {
    fn from(value: String) -> Self {
        ProviderInput::Url(value)
    }
}

impl From<Arc<dyn Eip1193Provider>> for ProviderInput {
    fn from(value: Arc<dyn Eip1193Provider>) -> Self {
        ProviderInput::Provider(value)
    }
}

/// 根据 RPC URL 构造传输层；闭包可直接作为工厂使用，便于测试注入。
pub trait TransportFactory: Send + Sync + 'static {
    fn connect(&self, rpc_url: &str) -> RpcResult<Arc<dyn Eip1193Provider>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&str) -> RpcResult<Arc<dyn Eip1193Provider>> + Send + Sync + 'static,
{
    fn connect(&self, rpc_url: &str) -> RpcResult<Arc<dyn Eip1193Provider>> {
        (self)(rpc_url)
    }
}
