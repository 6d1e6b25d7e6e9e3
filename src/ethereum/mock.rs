//! Mock remote node and shared fixtures for pipeline tests.

use alloy::{
    primitives::{keccak256, Address, Bytes, B256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

use super::provider::RemoteNode;
use super::TransactionParams;
use crate::error::NodeError;

// Well-known development key (hardhat/anvil account #0). Never use with real funds.
pub(crate) const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub(crate) const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub(crate) const TEST_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeMethod {
    TransactionCount,
    GasPrice,
    EstimateGas,
    SendRawTransaction,
    Call,
}

pub(crate) struct MockNode {
    nonce: u64,
    gas_price: u128,
    gas_estimate: u64,
    call_result: Bytes,
    failing: Option<(NodeMethod, String)>,
    hanging: Option<NodeMethod>,
    requests: Mutex<Vec<NodeMethod>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl MockNode {
    pub(crate) fn new() -> Self {
        Self {
            nonce: 7,
            gas_price: 20_000_000_000,
            gas_estimate: 45_000,
            call_result: Bytes::new(),
            failing: None,
            hanging: None,
            requests: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(mut self, method: NodeMethod, message: &str) -> Self {
        self.failing = Some((method, message.to_string()));
        self
    }

    pub(crate) fn hanging(mut self, method: NodeMethod) -> Self {
        self.hanging = Some(method);
        self
    }

    pub(crate) fn with_call_result(mut self, result: Bytes) -> Self {
        self.call_result = result;
        self
    }

    pub(crate) fn requests(&self) -> Vec<NodeMethod> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }

    async fn respond<T>(&self, method: NodeMethod, value: T) -> Result<T, NodeError> {
        self.requests.lock().unwrap().push(method);

        if self.hanging == Some(method) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        match &self.failing {
            Some((failing, message)) if *failing == method => Err(NodeError::new(message.clone())),
            _ => Ok(value),
        }
    }
}

#[async_trait]
impl RemoteNode for MockNode {
    async fn transaction_count(&self, _address: Address) -> Result<u64, NodeError> {
        self.respond(NodeMethod::TransactionCount, self.nonce).await
    }

    async fn gas_price(&self) -> Result<u128, NodeError> {
        self.respond(NodeMethod::GasPrice, self.gas_price).await
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64, NodeError> {
        self.respond(NodeMethod::EstimateGas, self.gas_estimate).await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, NodeError> {
        let hash = self
            .respond(NodeMethod::SendRawTransaction, keccak256(raw))
            .await?;
        self.broadcasts.lock().unwrap().push(raw.to_vec());
        Ok(hash)
    }

    async fn call(&self, _tx: &TransactionRequest) -> Result<Bytes, NodeError> {
        self.respond(NodeMethod::Call, self.call_result.clone()).await
    }
}

pub(crate) fn test_abi() -> Value {
    json!([
        {
            "type": "function",
            "name": "double",
            "inputs": [{"name": "a", "type": "uint256"}],
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "ping",
            "inputs": [],
            "outputs": [{"name": "", "type": "string"}],
            "stateMutability": "view"
        },
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                {"name": "to", "type": "address"},
                {"name": "amount", "type": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "sum",
            "inputs": [{"name": "values", "type": "uint256[]"}],
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "pure"
        },
        {
            "type": "function",
            "name": "echo",
            "inputs": [{"name": "message", "type": "string"}],
            "outputs": [{"name": "", "type": "string"}],
            "stateMutability": "pure"
        },
        {
            "type": "function",
            "name": "toggle",
            "inputs": [{"name": "enabled", "type": "bool"}],
            "outputs": [],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "set",
            "inputs": [{"name": "x", "type": "uint256"}],
            "outputs": [],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "set",
            "inputs": [{"name": "x", "type": "string"}],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ])
}

/// ABI encoding of a single `string` return value `"pong"`
pub(crate) fn pong_return_data() -> Bytes {
    let mut data = vec![0u8; 96];
    data[31] = 0x20;
    data[63] = 0x04;
    data[64..68].copy_from_slice(b"pong");
    data.into()
}

pub(crate) fn send_params() -> TransactionParams {
    TransactionParams {
        from: TEST_ADDRESS.to_string(),
        private_key: TEST_PRIVATE_KEY.to_string(),
        contract_address: TEST_CONTRACT.to_string(),
        abi: test_abi(),
        function_name: "double".to_string(),
        function_arguments: json!([21]),
        provider: "http://127.0.0.1:8545".to_string(),
        value: None,
        gas_limit: None,
        chain_id: None,
    }
}
