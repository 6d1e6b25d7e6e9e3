//! Contract function calls and locally signed transactions over JSON-RPC.
//!
//! [`ethereum::contract::send_transaction`] encodes a call from a JSON ABI,
//! resolves nonce, gas price and gas limit from the node, signs with a
//! caller-supplied key and broadcasts the raw transaction.
//! [`ethereum::contract::call`] encodes the same payload and runs it
//! read-only, returning the raw hex result.

pub mod config;
pub mod error;
pub mod ethereum;
pub mod server;

pub use error::{NodeError, PipelineError, PipelineResult};
