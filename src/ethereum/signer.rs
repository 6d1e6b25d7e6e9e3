//! Local signing and canonical serialization of legacy transactions
//!
//! The private key lives only inside [`LocalKey`]: it is never serialized,
//! never logged, and dropped together with the request that carried it.

use alloy::{
    consensus::{SignableTransaction, TxEnvelope, TxLegacy},
    eips::eip2718::{Decodable2718, Encodable2718},
    network::TxSignerSync,
    primitives::{Address, Bytes, TxKind, B256, U256},
    signers::local::PrivateKeySigner,
};
use std::str::FromStr;
use tracing::debug;

use super::{utils, UnsignedTransaction};
use crate::error::{PipelineError, PipelineResult};

/// Serialized, signed transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
}

impl SignedTransaction {
    /// `0x` prefixed hex of the raw bytes
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// Fields recovered from a serialized transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: Option<u64>,
    pub signer: Address,
    pub hash: B256,
}

/// Private key held for the duration of one signing step
pub struct LocalKey {
    signer: PrivateKeySigner,
}

impl LocalKey {
    /// Parse a 32-byte hex private key, with or without `0x`
    pub fn from_hex(key_hex: &str) -> PipelineResult<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        if key_hex.len() != 64 || !key_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PipelineError::Signing(
                "Invalid private key: expected 32 bytes as 64 hexadecimal characters".to_string(),
            ));
        }

        let signer = PrivateKeySigner::from_str(key_hex)
            .map_err(|e| PipelineError::Signing(format!("Invalid private key: {}", e)))?;

        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign the legacy pre-image and serialize the signed transaction.
    ///
    /// With a chain id the signature follows EIP-155; without one, `v` is 27 or 28.
    pub fn sign_and_serialize(&self, tx: &UnsignedTransaction) -> PipelineResult<SignedTransaction> {
        let fields = tx.hex_fields();
        debug!(
            to = ?tx.to,
            nonce = %fields.nonce,
            gas_price = %fields.gas_price,
            gas_limit = %fields.gas_limit,
            value = %fields.value,
            chain_id = ?tx.chain_id,
            "Signing transaction"
        );

        let mut legacy = TxLegacy {
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: TxKind::Call(tx.to),
            value: tx.value,
            input: tx.data.clone(),
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut legacy)
            .map_err(|e| PipelineError::Signing(format!("Signing failed: {}", e)))?;

        let signed = legacy.into_signed(signature);
        let hash = *signed.hash();
        let raw = TxEnvelope::from(signed).encoded_2718();

        Ok(SignedTransaction {
            raw: raw.into(),
            hash,
        })
    }
}

impl std::fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKey")
            .field("address", &self.signer.address())
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

/// Parse a serialized legacy transaction and recover its signer
pub fn decode_signed(raw_hex: &str) -> PipelineResult<DecodedTransaction> {
    let raw = utils::decode_hex(raw_hex).map_err(|e| PipelineError::Validation(e.to_string()))?;

    let envelope = TxEnvelope::decode_2718(&mut raw.as_slice())
        .map_err(|e| PipelineError::Validation(format!("Malformed transaction: {}", e)))?;

    let signed = envelope.as_legacy().ok_or_else(|| {
        PipelineError::Validation("Only legacy transactions are supported".to_string())
    })?;
    let tx = signed.tx();

    let to = match tx.to {
        TxKind::Call(to) => to,
        TxKind::Create => {
            return Err(PipelineError::Validation(
                "Contract creation transactions are not supported".to_string(),
            ))
        }
    };

    let signer = signed
        .signature()
        .recover_address_from_prehash(&signed.signature_hash())
        .map_err(|e| PipelineError::Signing(format!("Signature recovery failed: {}", e)))?;

    Ok(DecodedTransaction {
        to,
        data: tx.input.clone(),
        value: tx.value,
        nonce: tx.nonce,
        gas_limit: tx.gas_limit,
        gas_price: tx.gas_price,
        chain_id: tx.chain_id,
        signer,
        hash: *signed.hash(),
    })
}
