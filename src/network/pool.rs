use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};

use super::{Eip1193Provider, RpcResult, TransportFactory};

/// 按 URL 复用传输实例，避免探测 mock 节点时反复构造客户端。
pub struct TransportPool<F>
where
    F: TransportFactory,
{
    factory: F,
    transports: DashMap<String, Arc<dyn Eip1193Provider>>,
}

impl<F> TransportPool<F>
where
    F: TransportFactory,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            transports: DashMap::new(),
        }
    }

    pub fn get_or_connect(&self, rpc_url: &str) -> RpcResult<Arc<dyn Eip1193Provider>> {
        if let Some(existing) = self.transports.get(rpc_url) {
            return Ok(existing.clone());
        }

        let transport = self.factory.connect(rpc_url)?;
        match self.transports.entry(rpc_url.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(transport.clone());
                Ok(transport)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

impl<F> TransportFactory for TransportPool<F>
where
    F: TransportFactory,
{
    fn connect(&self, rpc_url: &str) -> RpcResult<Arc<dyn Eip1193Provider>> {
        self.get_or_connect(rpc_url)
    }
}
