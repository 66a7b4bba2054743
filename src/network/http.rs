use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use url::Url;

use super::{Eip1193Provider, RpcError, RpcResult, TransportFactory};

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| build_http_client(DEFAULT_RPC_TIMEOUT));

/// 构造带超时的客户端；构造失败时退回默认客户端并告警，此时超时设置不生效。
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|err| {
            warn!(
                target: "fhevm::network",
                timeout_ms = timeout.as_millis() as u64,
                error = %err,
                "HTTP 客户端构造失败，回退到默认客户端（超时设置失效）"
            );
            reqwest::Client::new()
        })
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// 基于 reqwest 的 JSON-RPC 2.0 传输，单次请求对应一次 POST。
#[derive(Clone, Debug)]
pub struct HttpRpcTransport {
    url: Url,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpRpcTransport {
    pub fn new(rpc_url: &str) -> RpcResult<Self> {
        Self::with_client(rpc_url, HTTP_CLIENT.clone())
    }

    pub fn with_client(rpc_url: &str, client: reqwest::Client) -> RpcResult<Self> {
        let url = Url::parse(rpc_url).map_err(|err| RpcError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RpcError::InvalidUrl {
                url: rpc_url.to_string(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        Ok(Self {
            endpoint: rpc_url.to_string(),
            url,
            client,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Eip1193Provider for HttpRpcTransport {
    async fn request(&self, method: &str, params: Value) -> RpcResult<Value> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let transport_err = |source: reqwest::Error| RpcError::Transport {
            method: method.to_string(),
            source,
        };

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(transport_err)?
            .error_for_status()
            .map_err(transport_err)?;

        let raw = response.json::<Value>().await.map_err(transport_err)?;

        if let Some(error) = raw.get("error").filter(|value| !value.is_null()) {
            return Err(match serde_json::from_value::<RpcErrorObject>(error.clone()) {
                Ok(object) => RpcError::Response {
                    method: method.to_string(),
                    code: object.code,
                    message: object.message,
                },
                Err(err) => RpcError::malformed(method, format!("unparseable error object: {err}")),
            });
        }

        raw.get("result")
            .cloned()
            .ok_or_else(|| RpcError::malformed(method, "response entry missing result"))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// 默认工厂：为每个 URL 构造 HTTP 传输，共享同一个 reqwest 连接池。
#[derive(Clone, Debug)]
pub struct HttpTransportFactory {
    client: reqwest::Client,
}

impl HttpTransportFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_http_client(timeout),
        }
    }
}

impl Default for HttpTransportFactory {
    fn default() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
        }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn connect(&self, rpc_url: &str) -> RpcResult<Arc<dyn Eip1193Provider>> {
        let transport = HttpRpcTransport::with_client(rpc_url, self.client.clone())?;
        Ok(Arc::new(transport))
    }
}
