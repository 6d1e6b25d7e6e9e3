use anyhow::Result;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::{PipelineError, PipelineResult},
    ethereum::{
        abi,
        contract,
        provider::{Endpoint, ProviderManager},
        CallParams, TransactionParams,
    },
};

#[derive(Debug, Clone)]
pub struct ContractCallerServer {
    provider_manager: Arc<ProviderManager>,
    config: Arc<Config>,
}

/// Where the contract interface comes from: inline JSON or an artifact on disk
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct AbiSource {
    /// JSON ABI array or build artifact object with an `abi` key
    abi: Option<Value>,
    /// Path to a JSON ABI or build artifact file
    abi_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct CallFunctionRequest {
    contract_address: String,
    #[serde(flatten)]
    abi_source: AbiSource,
    function_name: String,
    function_arguments: Value,
    /// RPC endpoint URL; falls back to the configured network
    provider: Option<String>,
    network: Option<String>,
}

#[derive(Deserialize, Serialize, JsonSchema)]
struct SendTransactionRequest {
    from: String,
    private_key: String,
    contract_address: String,
    #[serde(flatten)]
    abi_source: AbiSource,
    function_name: String,
    function_arguments: Value,
    provider: Option<String>,
    network: Option<String>,
    /// Wei, as an integer or a decimal / 0x-hex string
    value: Option<Value>,
    /// Skips gas estimation when set
    gas_limit: Option<u64>,
    chain_id: Option<u64>,
}

impl std::fmt::Debug for SendTransactionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendTransactionRequest")
            .field("from", &self.from)
            .field("private_key", &"[REDACTED]")
            .field("contract_address", &self.contract_address)
            .field("function_name", &self.function_name)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl ContractCallerServer {
    pub fn new(config: Config) -> Result<Self> {
        let provider_manager = Arc::new(ProviderManager::new(config.clone()));
        let config = Arc::new(config);

        Ok(Self {
            provider_manager,
            config,
        })
    }

    pub async fn run(&self) -> Result<()> {
        info!("Starting Contract Caller MCP Server");

        let service = self.clone().serve(stdio()).await?;

        info!("Contract Caller MCP Server started successfully");
        let _ = service.waiting().await;
        Ok(())
    }

    fn endpoint(&self, provider: Option<&str>, network: Option<&str>) -> PipelineResult<Endpoint> {
        self.provider_manager
            .resolve(provider, network)
            .map_err(|e| PipelineError::Validation(e.to_string()))
    }

    async fn load_abi(source: AbiSource) -> PipelineResult<Value> {
        match (source.abi, source.abi_path) {
            (Some(abi), None) => Ok(abi),
            (None, Some(path)) => abi::read_artifact(&path).await,
            (Some(_), Some(_)) => Err(PipelineError::Validation(
                "Provide either 'abi' or 'abi_path', not both".to_string(),
            )),
            (None, None) => Err(PipelineError::Validation(
                "Missing required field 'abi' (or 'abi_path')".to_string(),
            )),
        }
    }

    async fn handle_call(&self, request: CallFunctionRequest) -> PipelineResult<String> {
        let endpoint = self.endpoint(request.provider.as_deref(), request.network.as_deref())?;
        let abi = Self::load_abi(request.abi_source).await?;

        let params = CallParams {
            contract_address: request.contract_address,
            abi,
            function_name: request.function_name,
            function_arguments: request.function_arguments,
            provider: endpoint.rpc_url,
        };

        contract::call(params, self.config.rpc_timeout()).await
    }

    async fn handle_send(&self, request: SendTransactionRequest) -> PipelineResult<String> {
        let endpoint = self.endpoint(request.provider.as_deref(), request.network.as_deref())?;
        let abi = Self::load_abi(request.abi_source).await?;

        let params = TransactionParams {
            from: request.from,
            private_key: request.private_key,
            contract_address: request.contract_address,
            abi,
            function_name: request.function_name,
            function_arguments: request.function_arguments,
            provider: endpoint.rpc_url,
            value: request.value,
            gas_limit: request.gas_limit,
            chain_id: request.chain_id.or(endpoint.chain_id),
        };

        contract::send_transaction(params, self.config.rpc_timeout()).await
    }
}

// Rejected input is the caller's problem; node failures are ours
fn log_failure(action: &str, e: &PipelineError) {
    if e.is_local() {
        warn!("Rejected {} request: {}", action, e);
    } else {
        error!("Failed to {}: {}", action, e);
    }
}

#[tool(tool_box)]
impl ContractCallerServer {
    #[tool(description = "Call a contract function without sending a transaction and return the raw hex-encoded result")]
    async fn call_function(&self, #[tool(aggr)] request: CallFunctionRequest) -> String {
        match self.handle_call(request).await {
            Ok(result) => result,
            Err(e) => {
                log_failure("call function", &e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "Sign a contract function call locally, broadcast it, and return the transaction hash")]
    async fn send_transaction(&self, #[tool(aggr)] request: SendTransactionRequest) -> String {
        if !self.config.security.allow_write_operations {
            return "Error: Write operations are disabled. Use --allow-writes flag to enable transaction sending.".to_string();
        }

        match self.handle_send(request).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                log_failure("send transaction", &e);
                format!("Error: {}", e)
            }
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for ContractCallerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("MCP server that encodes contract function calls from a JSON ABI, signs transactions locally with a caller-supplied key, and submits them through a JSON-RPC node. Results are returned as raw hex; nonces are read from the node on every send.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
