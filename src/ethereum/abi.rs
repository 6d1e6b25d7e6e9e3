use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi},
    primitives::Bytes,
};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Contract interface supplied by the caller for a single invocation.
///
/// Accepts either a bare JSON ABI array or a build artifact object carrying
/// the ABI under an `abi` key (truffle, hardhat and foundry all do this).
#[derive(Debug, Clone)]
pub struct ContractInterface {
    abi: JsonAbi,
}

impl ContractInterface {
    pub fn from_json(value: &Value) -> PipelineResult<Self> {
        let abi_value = match value {
            Value::Array(_) => value,
            Value::Object(artifact) => artifact.get("abi").ok_or_else(|| {
                PipelineError::Validation(
                    "Contract artifact has no 'abi' field".to_string(),
                )
            })?,
            Value::String(raw) => {
                let parsed: Value = serde_json::from_str(raw).map_err(|e| {
                    PipelineError::Validation(format!("Failed to parse ABI JSON: {}", e))
                })?;
                return Self::from_json(&parsed);
            }
            other => {
                return Err(PipelineError::Validation(format!(
                    "ABI must be a JSON array or an artifact object, got: {}",
                    other
                )))
            }
        };

        let abi: JsonAbi = serde_json::from_value(abi_value.clone())
            .map_err(|e| PipelineError::Validation(format!("Failed to parse ABI JSON: {}", e)))?;

        Ok(Self { abi })
    }

    pub fn function_names(&self) -> Vec<String> {
        self.abi.functions().map(|f| f.name.clone()).collect()
    }

    /// Exact-name lookup. Overloaded names are refused rather than guessed.
    pub fn function(&self, name: &str) -> PipelineResult<&Function> {
        let candidates = self.abi.function(name).map(Vec::as_slice).unwrap_or_default();

        match candidates {
            [function] => Ok(function),
            [] => {
                let available = self.function_names();
                if available.is_empty() {
                    Err(PipelineError::InterfaceLookup(format!(
                        "Function '{}' not found. The contract ABI contains no functions.",
                        name
                    )))
                } else {
                    Err(PipelineError::InterfaceLookup(format!(
                        "Function '{}' not found in contract ABI. Available functions: {}",
                        name,
                        available.join(", ")
                    )))
                }
            }
            overloads => {
                let signatures: Vec<String> = overloads.iter().map(|f| f.signature()).collect();
                Err(PipelineError::InterfaceLookup(format!(
                    "Function '{}' is overloaded and cannot be selected by name: {}",
                    name,
                    signatures.join(", ")
                )))
            }
        }
    }

    /// Selector of the named function followed by its ABI-encoded arguments
    pub fn encode_call(&self, function_name: &str, arguments: &Value) -> PipelineResult<Bytes> {
        let function = self.function(function_name)?;
        let inputs = coerce_arguments(function, arguments)?;

        let encoded = function
            .abi_encode_input(&inputs)
            .map_err(|e| PipelineError::Encoding(format!("Failed to encode function inputs: {}", e)))?;

        debug!(
            function = %function.signature(),
            payload_len = encoded.len(),
            "Encoded call payload"
        );
        Ok(encoded.into())
    }
}

/// Read a JSON ABI or build artifact file without interpreting it
pub async fn read_artifact<P: AsRef<Path>>(path: P) -> PipelineResult<Value> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await.map_err(|e| {
        PipelineError::Validation(format!("Failed to read ABI file {:?}: {}", path, e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        PipelineError::Validation(format!("Failed to parse ABI file {:?}: {}", path, e))
    })
}

/// Coerce positional (array) or named (object) JSON arguments to the declared input types
fn coerce_arguments(function: &Function, arguments: &Value) -> PipelineResult<Vec<DynSolValue>> {
    let expected_params = || -> String {
        function
            .inputs
            .iter()
            .map(|input| format!("{} {}", input.ty, input.name))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let values: Vec<&Value> = match arguments {
        Value::Array(params) => {
            if params.len() != function.inputs.len() {
                return Err(PipelineError::Encoding(format!(
                    "Parameter count mismatch for function '{}': expected {} parameters, got {}. Expected parameters: [{}]",
                    function.name,
                    function.inputs.len(),
                    params.len(),
                    expected_params()
                )));
            }
            params.iter().collect()
        }
        Value::Object(named) => {
            let unexpected: Vec<&str> = named
                .keys()
                .filter(|key| !function.inputs.iter().any(|input| &input.name == *key))
                .map(String::as_str)
                .collect();
            if !unexpected.is_empty() {
                return Err(PipelineError::Encoding(format!(
                    "Unexpected parameters for function '{}': {}. Expected parameters: [{}]",
                    function.name,
                    unexpected.join(", "),
                    expected_params()
                )));
            }

            function
                .inputs
                .iter()
                .map(|input| {
                    named.get(&input.name).ok_or_else(|| {
                        PipelineError::Encoding(format!(
                            "Missing required parameter '{}' of type '{}' for function '{}'. Expected parameters: [{}]",
                            input.name,
                            input.ty,
                            function.name,
                            expected_params()
                        ))
                    })
                })
                .collect::<PipelineResult<_>>()?
        }
        Value::Null if function.inputs.is_empty() => Vec::new(),
        other => {
            return Err(PipelineError::Encoding(format!(
                "Invalid parameter format for function '{}'. Provide an array or an object keyed by parameter name, got: {}",
                function.name, other
            )))
        }
    };

    function
        .inputs
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (input, value))| {
            let ty = input.resolve().map_err(|e| {
                PipelineError::Encoding(format!(
                    "Unsupported parameter type '{}' for '{}': {}",
                    input.ty, input.name, e
                ))
            })?;
            coerce_value(value, &ty).map_err(|e| {
                PipelineError::Encoding(format!(
                    "Invalid parameter #{} ('{}' of type '{}'): {}",
                    i + 1,
                    input.name,
                    input.ty,
                    e
                ))
            })
        })
        .collect()
}

fn coerce_value(value: &Value, ty: &DynSolType) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| coerce_value(item, inner))
            .collect::<Result<_, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!("expected {} elements, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| coerce_value(item, inner))
                .collect::<Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(format!(
                    "expected tuple of {} components, got {}",
                    types.len(),
                    items.len()
                ));
            }
            items
                .iter()
                .zip(types)
                .map(|(item, ty)| coerce_value(item, ty))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Tuple)
        }
        (_, Value::String(s)) => ty.coerce_str(s).map_err(|e| e.to_string()),
        (DynSolType::Bool, Value::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (DynSolType::Int(_) | DynSolType::Uint(_), Value::Number(n)) => {
            if n.is_f64() {
                return Err(format!(
                    "{} is not an integer; pass large or fractional amounts as strings",
                    n
                ));
            }
            ty.coerce_str(&n.to_string()).map_err(|e| e.to_string())
        }
        (_, other) => Err(format!("cannot convert {} into {}", other, ty)),
    }
}
