pub mod abi;
pub mod contract;
#[cfg(test)]
pub(crate) mod mock;
pub mod provider;
pub mod signer;
pub mod utils;

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use abi::ContractInterface;
use signer::LocalKey;

/// Public input of `send_transaction`, as received from a caller
#[derive(Clone, Deserialize)]
pub struct TransactionParams {
    pub from: String,
    pub private_key: String,
    pub contract_address: String,
    pub abi: Value,
    pub function_name: String,
    pub function_arguments: Value,
    pub provider: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

// Manual impl so the private key never reaches a log line
impl std::fmt::Debug for TransactionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionParams")
            .field("from", &self.from)
            .field("private_key", &"[REDACTED]")
            .field("contract_address", &self.contract_address)
            .field("function_name", &self.function_name)
            .field("function_arguments", &self.function_arguments)
            .field("provider", &self.provider)
            .field("value", &self.value)
            .field("gas_limit", &self.gas_limit)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

/// Public input of `call`; no signing fields
#[derive(Debug, Clone, Deserialize)]
pub struct CallParams {
    pub contract_address: String,
    pub abi: Value,
    pub function_name: String,
    pub function_arguments: Value,
    pub provider: String,
}

/// A validated (interface, function, arguments) triple aimed at one contract
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub contract_address: Address,
    pub interface: ContractInterface,
    pub function_name: String,
    pub arguments: Value,
}

impl CallRequest {
    pub fn encode(&self) -> PipelineResult<Bytes> {
        self.interface
            .encode_call(&self.function_name, &self.arguments)
    }
}

/// A validated send: everything the pipeline needs before touching the node
#[derive(Debug)]
pub struct SendRequest {
    pub from: Address,
    pub key: LocalKey,
    pub call: CallRequest,
    pub provider: String,
    pub value: U256,
    pub gas_limit: Option<u64>,
    pub chain_id: Option<u64>,
}

/// Transaction record before signing. Built fresh for every send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub from: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: Option<u64>,
}

/// Scalar fields of an [`UnsignedTransaction`] in minimal big-endian hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HexFields {
    pub nonce: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub value: String,
}

impl UnsignedTransaction {
    pub fn hex_fields(&self) -> HexFields {
        HexFields {
            nonce: utils::to_minimal_hex(U256::from(self.nonce)),
            gas_price: utils::to_minimal_hex(U256::from(self.gas_price)),
            gas_limit: utils::to_minimal_hex(U256::from(self.gas_limit)),
            value: utils::to_minimal_hex(self.value),
        }
    }
}

fn require(field: &str, value: &str) -> PipelineResult<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::Validation(format!(
            "Missing required field '{}'",
            field
        )));
    }
    Ok(())
}

fn parse_address(field: &str, value: &str) -> PipelineResult<Address> {
    require(field, value)?;
    utils::validate_address(value)
        .map_err(|e| PipelineError::Validation(format!("Invalid '{}': {}", field, e)))
}

fn parse_value(value: Option<&Value>) -> PipelineResult<U256> {
    match value {
        None | Some(Value::Null) => Ok(U256::ZERO),
        Some(Value::Number(n)) => n.as_u64().map(U256::from).ok_or_else(|| {
            PipelineError::Validation(format!(
                "Invalid 'value': {} is not a non-negative integer (use a string for amounts above 2^64)",
                n
            ))
        }),
        Some(Value::String(s)) => utils::parse_wei_value(s)
            .map_err(|e| PipelineError::Validation(format!("Invalid 'value': {}", e))),
        Some(other) => Err(PipelineError::Validation(format!(
            "Invalid 'value': expected integer or numeric string, got {}",
            other
        ))),
    }
}

fn build_call_request(
    contract_address: &str,
    abi: &Value,
    function_name: &str,
    function_arguments: &Value,
) -> PipelineResult<CallRequest> {
    let contract_address = parse_address("contract_address", contract_address)?;

    if abi.is_null() {
        return Err(PipelineError::Validation(
            "Missing required field 'abi'".to_string(),
        ));
    }
    let interface = ContractInterface::from_json(abi)?;

    require("function_name", function_name)?;
    utils::validate_function_name(function_name)
        .map_err(|e| PipelineError::Validation(e.to_string()))?;

    if !matches!(function_arguments, Value::Array(_) | Value::Object(_)) {
        return Err(PipelineError::Validation(format!(
            "'function_arguments' must be an array or an object, got: {}",
            function_arguments
        )));
    }

    Ok(CallRequest {
        contract_address,
        interface,
        function_name: function_name.to_string(),
        arguments: function_arguments.clone(),
    })
}

impl TransactionParams {
    /// Check every field before any network access.
    ///
    /// The key must derive the `from` address; a mismatch is reported here as a
    /// signing error instead of surfacing later as a node rejection.
    pub fn validate(self) -> PipelineResult<SendRequest> {
        require("provider", &self.provider)?;
        let from = parse_address("from", &self.from)?;
        let call = build_call_request(
            &self.contract_address,
            &self.abi,
            &self.function_name,
            &self.function_arguments,
        )?;
        let value = parse_value(self.value.as_ref())?;

        require("private_key", &self.private_key)?;
        let key = LocalKey::from_hex(&self.private_key)?;
        if key.address() != from {
            return Err(PipelineError::Signing(format!(
                "Private key belongs to {:?}, not to the 'from' address {:?}",
                key.address(),
                from
            )));
        }

        Ok(SendRequest {
            from,
            key,
            call,
            provider: self.provider.trim().to_string(),
            value,
            gas_limit: self.gas_limit,
            chain_id: self.chain_id,
        })
    }
}

impl CallParams {
    /// Returns the provider URL and the validated request
    pub fn validate(self) -> PipelineResult<(String, CallRequest)> {
        require("provider", &self.provider)?;
        let request = build_call_request(
            &self.contract_address,
            &self.abi,
            &self.function_name,
            &self.function_arguments,
        )?;
        Ok((self.provider.trim().to_string(), request))
    }
}
