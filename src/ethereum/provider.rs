use crate::config::{Config, NetworkConfig};
use crate::error::{NodeError, PipelineError, PipelineResult};
use alloy::{
    primitives::{Address, Bytes, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::TransactionRequest,
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Url;

/// JSON-RPC capabilities the pipeline consumes from a remote node
#[async_trait]
pub trait RemoteNode: Send + Sync {
    /// `eth_getTransactionCount` at the latest block
    async fn transaction_count(&self, address: Address) -> Result<u64, NodeError>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> Result<u128, NodeError>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, NodeError>;

    /// `eth_sendRawTransaction`
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, NodeError>;

    /// `eth_call`
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, NodeError>;
}

/// Remote node reached over HTTP. One per invocation; nothing is shared.
#[derive(Debug)]
pub struct HttpNode {
    provider: RootProvider<Http<Client>>,
}

impl HttpNode {
    pub fn connect(rpc_url: &str) -> PipelineResult<Self> {
        let url: Url = rpc_url.trim().parse().map_err(|e| {
            PipelineError::Validation(format!("Invalid provider URL '{}': {}", rpc_url, e))
        })?;

        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self { provider })
    }
}

#[async_trait]
impl RemoteNode for HttpNode {
    async fn transaction_count(&self, address: Address) -> Result<u64, NodeError> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn gas_price(&self) -> Result<u128, NodeError> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, NodeError> {
        Ok(self.provider.estimate_gas(tx).await?)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, NodeError> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, NodeError> {
        Ok(self.provider.call(tx).await?)
    }
}

/// Where a single invocation should send its requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub rpc_url: String,
    pub chain_id: Option<u64>,
}

/// Resolves per-call endpoints from the configured networks
#[derive(Debug)]
pub struct ProviderManager {
    config: Config,
}

impl ProviderManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn get_network_config(&self, network: Option<&str>) -> Result<&NetworkConfig> {
        let network_name = network.unwrap_or(&self.config.default_network);
        self.config
            .networks
            .get(network_name)
            .ok_or_else(|| anyhow!("Network '{}' not configured", network_name))
    }

    pub fn get_available_networks(&self) -> Vec<String> {
        let mut networks: Vec<String> = self.config.networks.keys().cloned().collect();
        networks.sort();
        networks
    }

    /// An explicit provider URL wins over the network table.
    ///
    /// The chain id still comes from the named (or default) network when the
    /// URL matches that network's configured RPC endpoint.
    pub fn resolve(&self, provider: Option<&str>, network: Option<&str>) -> Result<Endpoint> {
        if let Some(net) = network {
            crate::ethereum::utils::validate_network(net, &self.get_available_networks())?;
        }

        let network_config = self.get_network_config(network);

        match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(rpc_url) => {
                let chain_id = network_config
                    .ok()
                    .filter(|config| config.rpc_url == rpc_url)
                    .and_then(|config| config.chain_id);
                Ok(Endpoint {
                    rpc_url: rpc_url.to_string(),
                    chain_id,
                })
            }
            None => {
                let config = network_config?;
                Ok(Endpoint {
                    rpc_url: config.rpc_url.clone(),
                    chain_id: config.chain_id,
                })
            }
        }
    }
}
