use alloy::{
    primitives::{Address, Bytes},
    rpc::types::TransactionRequest,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    provider::{HttpNode, RemoteNode},
    utils, CallParams, CallRequest, SendRequest, TransactionParams, UnsignedTransaction,
};
use crate::error::{NodeError, PipelineError, PipelineResult};

/// Drives one send or call against a remote node.
///
/// Nothing is cached between invocations: every send re-reads the nonce and
/// gas price. Two concurrent sends from one account can therefore observe
/// the same nonce; callers that need ordering must serialize their sends.
#[derive(Debug)]
pub struct ContractManager<N> {
    node: N,
    rpc_timeout: Duration,
}

impl<N: RemoteNode> ContractManager<N> {
    pub fn new(node: N, rpc_timeout: Duration) -> Self {
        Self { node, rpc_timeout }
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, NodeError>>,
    ) -> PipelineResult<Result<T, NodeError>> {
        tokio::time::timeout(self.rpc_timeout, request)
            .await
            .map_err(|_| PipelineError::Timeout {
                operation,
                timeout: self.rpc_timeout,
            })
    }

    async fn query<T>(
        &self,
        query: &'static str,
        request: impl Future<Output = Result<T, NodeError>>,
    ) -> PipelineResult<T> {
        self.with_timeout(query, request)
            .await?
            .map_err(|e| PipelineError::RemoteQuery {
                query,
                message: e.message,
            })
    }

    /// Encode the payload, then resolve nonce, gas price and gas limit.
    ///
    /// Encoding runs first, so a bad function name or argument fails before
    /// the node is contacted. The three reads are independent and issued
    /// concurrently; the first failure aborts the rest.
    pub async fn assemble(&self, request: &SendRequest) -> PipelineResult<UnsignedTransaction> {
        let data = request.call.encode()?;
        let to = request.call.contract_address;

        let estimate_request = TransactionRequest::default()
            .from(request.from)
            .to(to)
            .input(data.clone().into())
            .value(request.value);

        let gas_limit = async {
            match request.gas_limit {
                Some(gas_limit) => Ok(gas_limit),
                None => {
                    self.query("eth_estimateGas", self.node.estimate_gas(&estimate_request))
                        .await
                }
            }
        };

        let (nonce, gas_price, gas_limit) = tokio::try_join!(
            self.query(
                "eth_getTransactionCount",
                self.node.transaction_count(request.from)
            ),
            self.query("eth_gasPrice", self.node.gas_price()),
            gas_limit,
        )?;

        debug!(
            from = ?request.from,
            nonce,
            gas_price,
            gas_limit,
            estimated = request.gas_limit.is_none(),
            "Resolved chain fields"
        );

        Ok(UnsignedTransaction {
            to,
            data,
            value: request.value,
            from: request.from,
            nonce,
            gas_limit,
            gas_price,
            chain_id: request.chain_id,
        })
    }

    /// Submit a serialized transaction; returns its hash without waiting for inclusion
    pub async fn broadcast(&self, signed_tx_hex: &str) -> PipelineResult<String> {
        let raw = utils::decode_hex(signed_tx_hex)
            .map_err(|e| PipelineError::Validation(format!("Invalid signed transaction: {}", e)))?;

        let tx_hash = self
            .with_timeout(
                "eth_sendRawTransaction",
                self.node.send_raw_transaction(&raw),
            )
            .await?
            .map_err(|e| PipelineError::Broadcast(e.message))?;

        info!("Transaction sent with hash: 0x{:x}", tx_hash);
        Ok(format!("0x{:x}", tx_hash))
    }

    /// Execute the payload read-only and return the raw return data
    pub async fn simulate(&self, contract_address: Address, payload: &Bytes) -> PipelineResult<String> {
        let call_request = TransactionRequest::default()
            .to(contract_address)
            .input(payload.clone().into());

        let result = self
            .with_timeout("eth_call", self.node.call(&call_request))
            .await?
            .map_err(|e| PipelineError::Call(e.message))?;

        Ok(format!("0x{}", hex::encode(&result)))
    }

    /// Assemble, sign, serialize and broadcast
    pub async fn send_transaction(&self, request: SendRequest) -> PipelineResult<String> {
        let unsigned = self.assemble(&request).await?;
        let signed = request.key.sign_and_serialize(&unsigned)?;
        drop(request);

        info!(
            "Sending transaction to contract {:?} (nonce {})",
            unsigned.to, unsigned.nonce
        );
        self.broadcast(&signed.to_hex()).await
    }

    /// Encode and simulate; the result is not ABI-decoded
    pub async fn call(&self, request: &CallRequest) -> PipelineResult<String> {
        let payload = request.encode()?;
        self.simulate(request.contract_address, &payload).await
    }
}

/// Validate, connect to `params.provider`, and send a signed transaction.
///
/// Without `chain_id` the transaction is signed without EIP-155 replay
/// protection, which many public nodes refuse over RPC; pass the chain id of
/// the target network unless the node is known to accept legacy signatures.
pub async fn send_transaction(
    params: TransactionParams,
    rpc_timeout: Duration,
) -> PipelineResult<String> {
    let request = params.validate()?;
    let node = HttpNode::connect(&request.provider)?;
    ContractManager::new(node, rpc_timeout)
        .send_transaction(request)
        .await
}

/// Validate, connect to `params.provider`, and run a read-only call
pub async fn call(params: CallParams, rpc_timeout: Duration) -> PipelineResult<String> {
    let (provider, request) = params.validate()?;
    let node = HttpNode::connect(&provider)?;
    ContractManager::new(node, rpc_timeout).call(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::mock::{
        pong_return_data, send_params, test_abi, MockNode, NodeMethod, TEST_ADDRESS,
    };
    use crate::ethereum::signer::decode_signed;
    use alloy::primitives::{keccak256, U256};
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn manager(node: MockNode) -> ContractManager<MockNode> {
        ContractManager::new(node, TIMEOUT)
    }

    fn call_request(function_name: &str) -> CallRequest {
        let (_, request) = CallParams {
            contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            abi: test_abi(),
            function_name: function_name.to_string(),
            function_arguments: json!([]),
            provider: "http://127.0.0.1:8545".to_string(),
        }
        .validate()
        .unwrap();
        request
    }

    #[tokio::test]
    async fn test_assemble_resolves_chain_fields() {
        let manager = manager(MockNode::new());
        let request = send_params().validate().unwrap();

        let tx = manager.assemble(&request).await.unwrap();

        assert_eq!(&tx.data[..4], &keccak256("double(uint256)")[..4]);
        assert_eq!(tx.nonce, 7);
        assert_eq!(tx.gas_price, 20_000_000_000);
        assert_eq!(tx.gas_limit, 45_000);
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.from, TEST_ADDRESS.parse::<Address>().unwrap());
        assert_eq!(tx.to, request.call.contract_address);

        let mut requests = manager.node.requests();
        requests.sort_by_key(|m| *m as u8);
        assert_eq!(
            requests,
            vec![
                NodeMethod::TransactionCount,
                NodeMethod::GasPrice,
                NodeMethod::EstimateGas
            ]
        );
    }

    #[tokio::test]
    async fn test_supplied_gas_limit_skips_estimation() {
        let manager = manager(MockNode::new());
        let mut params = send_params();
        params.gas_limit = Some(90_000);
        params.value = Some(json!("250"));
        let request = params.validate().unwrap();

        let tx = manager.assemble(&request).await.unwrap();

        assert_eq!(tx.gas_limit, 90_000);
        assert_eq!(tx.value, U256::from(250u64));
        assert_eq!(manager.node.requests().len(), 2);
        assert!(!manager.node.requests().contains(&NodeMethod::EstimateGas));
    }

    #[tokio::test]
    async fn test_lookup_failure_happens_before_network_access() {
        let manager = manager(MockNode::new());
        let mut params = send_params();
        params.function_name = "triple".to_string();
        let request = params.validate().unwrap();

        let err = manager.send_transaction(request).await.unwrap_err();

        assert!(matches!(err, PipelineError::InterfaceLookup(_)));
        assert!(manager.node.requests().is_empty());
    }

    #[tokio::test]
    async fn test_encoding_failure_happens_before_network_access() {
        let manager = manager(MockNode::new());
        let mut params = send_params();
        params.function_arguments = json!([1, 2]);
        let request = params.validate().unwrap();

        let err = manager.send_transaction(request).await.unwrap_err();

        assert!(matches!(err, PipelineError::Encoding(_)));
        assert!(manager.node.requests().is_empty());
    }

    #[tokio::test]
    async fn test_remote_query_failure_stops_pipeline() {
        let manager = manager(
            MockNode::new().failing(NodeMethod::TransactionCount, "header not found"),
        );
        let request = send_params().validate().unwrap();

        let err = manager.send_transaction(request).await.unwrap_err();

        match err {
            PipelineError::RemoteQuery { query, message } => {
                assert_eq!(query, "eth_getTransactionCount");
                assert_eq!(message, "header not found");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(manager.node.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_gas_estimate_failure_is_remote_query_error() {
        let manager = manager(
            MockNode::new().failing(NodeMethod::EstimateGas, "execution reverted: not owner"),
        );
        let request = send_params().validate().unwrap();

        let err = manager.assemble(&request).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RemoteQuery { query: "eth_estimateGas", .. }
        ));
    }

    #[tokio::test]
    async fn test_send_transaction_returns_hash_of_broadcast_payload() {
        let manager = manager(MockNode::new());
        let request = send_params().validate().unwrap();
        let key_address = request.key.address();

        let tx_hash = manager.send_transaction(request).await.unwrap();

        assert_eq!(tx_hash.len(), 66);
        assert!(tx_hash.starts_with("0x"));

        let broadcasts = manager.node.broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(tx_hash, format!("0x{:x}", keccak256(&broadcasts[0])));

        let decoded = decode_signed(&hex::encode(&broadcasts[0])).unwrap();
        assert_eq!(decoded.signer, key_address);
        assert_eq!(decoded.nonce, 7);
        assert_eq!(decoded.gas_limit, 45_000);
        assert_eq!(decoded.gas_price, 20_000_000_000);
        assert_eq!(&decoded.data[..4], &keccak256("double(uint256)")[..4]);
        assert_eq!(U256::from_be_slice(&decoded.data[4..]), U256::from(21u64));
    }

    #[tokio::test]
    async fn test_broadcast_rejection_keeps_node_message() {
        let manager = manager(
            MockNode::new().failing(NodeMethod::SendRawTransaction, "nonce too low"),
        );
        let request = send_params().validate().unwrap();

        let err = manager.send_transaction(request).await.unwrap_err();

        match err {
            PipelineError::Broadcast(message) => assert_eq!(message, "nonce too low"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_rejects_non_hex_payload() {
        let manager = manager(MockNode::new());
        let err = manager.broadcast("0xnot-hex").await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(manager.node.requests().is_empty());
    }

    #[tokio::test]
    async fn test_call_returns_raw_result() {
        let manager = manager(MockNode::new().with_call_result(pong_return_data()));

        let result = manager.call(&call_request("ping")).await.unwrap();

        let expected = format!(
            "0x{}{}{}{}",
            format!("{:0>64}", "20"),
            format!("{:0>64}", "4"),
            "706f6e67",
            "0".repeat(56)
        );
        assert_eq!(result, expected);
        assert_eq!(manager.node.requests(), vec![NodeMethod::Call]);
    }

    #[tokio::test]
    async fn test_call_revert_is_call_error() {
        let manager = manager(
            MockNode::new().failing(NodeMethod::Call, "execution reverted: paused"),
        );

        let err = manager.call(&call_request("ping")).await.unwrap_err();

        match err {
            PipelineError::Call(message) => assert_eq!(message, "execution reverted: paused"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_hung_node_times_out() {
        let manager = ContractManager::new(
            MockNode::new().hanging(NodeMethod::GasPrice),
            Duration::from_millis(50),
        );
        let request = send_params().validate().unwrap();

        let err = manager.send_transaction(request).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Timeout {
                operation: "eth_gasPrice",
                ..
            }
        ));
        assert!(manager.node.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sends_are_not_coordinated() {
        let manager = manager(MockNode::new());
        let first = send_params().validate().unwrap();
        let second = send_params().validate().unwrap();

        let (a, b) = tokio::join!(
            manager.send_transaction(first),
            manager.send_transaction(second)
        );
        a.unwrap();
        b.unwrap();

        // Both pipelines read the nonce from the node; neither reserved it locally
        let broadcasts = manager.node.broadcasts();
        assert_eq!(broadcasts.len(), 2);
        let nonces: Vec<u64> = broadcasts
            .iter()
            .map(|raw| decode_signed(&hex::encode(raw)).unwrap().nonce)
            .collect();
        assert_eq!(nonces, vec![7, 7]);
        assert_eq!(
            manager
                .node
                .requests()
                .iter()
                .filter(|m| **m == NodeMethod::TransactionCount)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_public_operations_validate_before_connecting() {
        let mut params = send_params();
        params.provider = "not a url".to_string();
        let err = send_transaction(params, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let err = call(
            CallParams {
                contract_address: "0x123".to_string(),
                abi: test_abi(),
                function_name: "ping".to_string(),
                function_arguments: json!([]),
                provider: "http://127.0.0.1:8545".to_string(),
            },
            TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
