use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ProviderInput, RpcError, TransportFactory};
use crate::error::{FhevmError, FhevmResult};

pub const DEFAULT_MOCK_CHAIN_ID: u64 = 31_337;
pub const DEFAULT_MOCK_RPC_URL: &str = "http://localhost:8545";

/// chain id → 本地开发节点 RPC URL。
pub type MockChains = BTreeMap<u64, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ResolvedNetwork {
    Mock {
        chain_id: u64,
        rpc_url: String,
    },
    Rpc {
        chain_id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        rpc_url: Option<String>,
    },
}

impl ResolvedNetwork {
    pub fn chain_id(&self) -> u64 {
        match self {
            ResolvedNetwork::Mock { chain_id, .. } | ResolvedNetwork::Rpc { chain_id, .. } => {
                *chain_id
            }
        }
    }

    pub fn rpc_url(&self) -> Option<&str> {
        match self {
            ResolvedNetwork::Mock { rpc_url, .. } => Some(rpc_url.as_str()),
            ResolvedNetwork::Rpc { rpc_url, .. } => rpc_url.as_deref(),
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, ResolvedNetwork::Mock { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedNetwork::Mock { .. } => "mock",
            ResolvedNetwork::Rpc { .. } => "rpc",
        }
    }
}

/// 内置 `{31337: localhost}` 与调用方表合并，同一 chain id 以调用方为准。
pub fn merged_mock_chains(overrides: Option<&MockChains>) -> MockChains {
    let mut merged = MockChains::new();
    merged.insert(DEFAULT_MOCK_CHAIN_ID, DEFAULT_MOCK_RPC_URL.to_string());
    if let Some(overrides) = overrides {
        for (chain_id, url) in overrides {
            merged.insert(*chain_id, url.clone());
        }
    }
    merged
}

/// 纯分类逻辑：命中 mock 表即为 mock，显式传入的 URL 优先于表项；
/// 否则为 rpc，且只在调用方传入裸 URL 时附带 URL。
pub fn classify_network(
    chain_id: u64,
    explicit_url: Option<&str>,
    mock_chains: Option<&MockChains>,
) -> ResolvedNetwork {
    let lookup = merged_mock_chains(mock_chains);
    match lookup.get(&chain_id) {
        Some(table_url) => ResolvedNetwork::Mock {
            chain_id,
            rpc_url: explicit_url
                .map(str::to_string)
                .unwrap_or_else(|| table_url.clone()),
        },
        None => ResolvedNetwork::Rpc {
            chain_id,
            rpc_url: explicit_url.map(str::to_string),
        },
    }
}

pub async fn get_chain_id(
    provider: &ProviderInput,
    transports: &dyn TransportFactory,
) -> FhevmResult<u64> {
    let raw = match provider {
        ProviderInput::Url(url) => {
            let transport = transports.connect(url).map_err(FhevmError::ChainId)?;
            transport.request("eth_chainId", json!([])).await
        }
        ProviderInput::Provider(provider) => provider.request("eth_chainId", json!([])).await,
    }
    .map_err(FhevmError::ChainId)?;

    parse_chain_id(&raw).map_err(FhevmError::ChainId)
}

pub async fn resolve_network(
    provider: &ProviderInput,
    mock_chains: Option<&MockChains>,
    transports: &dyn TransportFactory,
) -> FhevmResult<ResolvedNetwork> {
    let chain_id = get_chain_id(provider, transports).await?;
    let resolved = classify_network(chain_id, provider.url(), mock_chains);
    debug!(
        target: "fhevm::network",
        chain_id,
        kind = resolved.kind(),
        rpc_url = ?resolved.rpc_url(),
        "已解析目标网络"
    );
    Ok(resolved)
}

pub(crate) fn parse_chain_id(value: &Value) -> Result<u64, RpcError> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            let parsed = match trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
            {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => trimmed.parse::<u64>(),
            };
            parsed.map_err(|err| RpcError::malformed("eth_chainId", format!("`{text}`: {err}")))
        }
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| RpcError::malformed("eth_chainId", format!("`{number}` is not a u64"))),
        other => Err(RpcError::malformed(
            "eth_chainId",
            format!("unexpected result type: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::network::{Eip1193Provider, HttpTransportFactory, RpcResult};

    struct ChainProvider(Value);

    #[async_trait]
    impl Eip1193Provider for ChainProvider {
        async fn request(&self, method: &str, _params: Value) -> RpcResult<Value> {
            assert_eq!(method, "eth_chainId");
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Eip1193Provider for FailingProvider {
        async fn request(&self, _method: &str, _params: Value) -> RpcResult<Value> {
            Err(RpcError::Provider("wallet locked".into()))
        }
    }

    fn provider(result: Value) -> ProviderInput {
        ProviderInput::Provider(Arc::new(ChainProvider(result)))
    }

    #[test]
    fn default_mock_chain_is_classified_mock() {
        let resolved = classify_network(31_337, None, None);
        assert_eq!(
            resolved,
            ResolvedNetwork::Mock {
                chain_id: 31_337,
                rpc_url: DEFAULT_MOCK_RPC_URL.to_string()
            }
        );
    }

    #[test]
    fn unknown_chain_is_rpc_without_fabricated_url() {
        let resolved = classify_network(11_155_111, None, None);
        assert_eq!(
            resolved,
            ResolvedNetwork::Rpc {
                chain_id: 11_155_111,
                rpc_url: None
            }
        );
        let with_url = classify_network(11_155_111, Some("https://sepolia.example"), None);
        assert_eq!(with_url.rpc_url(), Some("https://sepolia.example"));
        assert!(!with_url.is_mock());
    }

    #[test]
    fn overrides_extend_and_win_over_defaults() {
        let mut overrides = MockChains::new();
        overrides.insert(31_337, "http://127.0.0.1:9545".to_string());
        overrides.insert(1_337, "http://127.0.0.1:7545".to_string());

        let replaced = classify_network(31_337, None, Some(&overrides));
        assert_eq!(replaced.rpc_url(), Some("http://127.0.0.1:9545"));

        let extended = classify_network(1_337, None, Some(&overrides));
        assert!(extended.is_mock());
        assert_eq!(extended.rpc_url(), Some("http://127.0.0.1:7545"));
    }

    #[test]
    fn explicit_url_beats_table_entry() {
        let resolved = classify_network(31_337, Some("http://node:8545"), None);
        assert_eq!(resolved.rpc_url(), Some("http://node:8545"));
        assert!(resolved.is_mock());
    }

    #[test]
    fn parses_hex_and_decimal_chain_ids() {
        assert_eq!(parse_chain_id(&json!("0x7a69")).expect("hex"), 31_337);
        assert_eq!(parse_chain_id(&json!("0xaa36a7")).expect("hex"), 11_155_111);
        assert_eq!(parse_chain_id(&json!("31337")).expect("decimal"), 31_337);
        assert_eq!(parse_chain_id(&json!(1)).expect("number"), 1);
        assert!(parse_chain_id(&json!("0xnope")).is_err());
        assert!(parse_chain_id(&json!(null)).is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolve_network_via_provider() {
        let factory = HttpTransportFactory::default();
        let resolved = resolve_network(&provider(json!("0x7a69")), None, &factory)
            .await
            .expect("resolve");
        assert!(resolved.is_mock());
        assert_eq!(resolved.rpc_url(), Some(DEFAULT_MOCK_RPC_URL));

        let resolved = resolve_network(&provider(json!("0xaa36a7")), None, &factory)
            .await
            .expect("resolve");
        assert_eq!(
            resolved,
            ResolvedNetwork::Rpc {
                chain_id: 11_155_111,
                rpc_url: None
            }
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolve_network_via_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0xaa36a7"}"#)
            .create_async()
            .await;

        let url = server.url();
        let factory = HttpTransportFactory::default();
        let resolved = resolve_network(&ProviderInput::Url(url.clone()), None, &factory)
            .await
            .expect("resolve");
        assert_eq!(
            resolved,
            ResolvedNetwork::Rpc {
                chain_id: 11_155_111,
                rpc_url: Some(url)
            }
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn chain_id_failure_is_surfaced() {
        let factory = HttpTransportFactory::default();
        let err = resolve_network(
            &ProviderInput::Provider(Arc::new(FailingProvider)),
            None,
            &factory,
        )
        .await
        .expect_err("chain id failure");
        assert_eq!(err.code(), "CHAIN_ID_ERROR");
    }

    #[test]
    fn serializes_tagged_shape() {
        let value = serde_json::to_value(ResolvedNetwork::Mock {
            chain_id: 31_337,
            rpc_url: DEFAULT_MOCK_RPC_URL.into(),
        })
        .expect("serialize");
        assert_eq!(
            value,
            json!({"kind": "mock", "chainId": 31337, "rpcUrl": "http://localhost:8545"})
        );
    }
}
