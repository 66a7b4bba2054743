mod client;
mod error;
mod http;
pub mod metadata;
mod pool;
pub mod resolver;

pub use client::{Eip1193Provider, ProviderInput, TransportFactory};
pub use error::{RpcError, RpcResult};
pub use http::{DEFAULT_RPC_TIMEOUT, HttpRpcTransport, HttpTransportFactory, build_http_client};
pub use metadata::{
    RelayerMetadata, fetch_fhevm_relayer_metadata, get_web3_client_version,
    try_fetch_hardhat_node_relayer_metadata,
};
pub use pool::TransportPool;
pub use resolver::{
    DEFAULT_MOCK_CHAIN_ID, DEFAULT_MOCK_RPC_URL, MockChains, ResolvedNetwork, classify_network,
    get_chain_id, merged_mock_chains, resolve_network,
};
