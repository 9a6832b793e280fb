//! Permit message, signature and request types.
//!
//! Requests are ephemeral: they are built by a caller, consumed by exactly one
//! engine call and never stored.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::utils::without_0x_prefix;

/// Execution context of a single call.
///
/// Stands in for the host environment's `msg.sender` and `block.timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
	/// Address invoking the operation.
	pub caller: Address,
	/// Current time in UNIX seconds.
	pub timestamp: u64,
}

impl CallContext {
	pub fn new(caller: Address, timestamp: u64) -> Self {
		Self { caller, timestamp }
	}
}

/// The typed-data message a holder signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
	pub owner: Address,
	pub spender: Address,
	pub value: U256,
	pub nonce: U256,
	pub deadline: U256,
}

/// Errors raised while decoding a compact signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureFormatError {
	#[error("Invalid hex: {0}")]
	Hex(String),
	#[error("Expected 65 signature bytes, got {0}")]
	Length(usize),
}

/// Recoverable ECDSA signature in `(v, r, s)` form.
///
/// `v` is kept exactly as supplied; range checks happen during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

impl PermitSignature {
	pub fn new(v: u8, r: B256, s: B256) -> Self {
		Self { v, r, s }
	}

	/// Decodes the 65-byte `r || s || v` layout.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureFormatError> {
		if bytes.len() != 65 {
			return Err(SignatureFormatError::Length(bytes.len()));
		}
		Ok(Self {
			r: B256::from_slice(&bytes[..32]),
			s: B256::from_slice(&bytes[32..64]),
			v: bytes[64],
		})
	}

	/// Encodes as `r || s || v`.
	pub fn to_bytes(&self) -> [u8; 65] {
		let mut out = [0u8; 65];
		out[..32].copy_from_slice(self.r.as_slice());
		out[32..64].copy_from_slice(self.s.as_slice());
		out[64] = self.v;
		out
	}
}

impl FromStr for PermitSignature {
	type Err = SignatureFormatError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes = hex::decode(without_0x_prefix(s))
			.map_err(|e| SignatureFormatError::Hex(e.to_string()))?;
		Self::from_bytes(&bytes)
	}
}

impl std::fmt::Display for PermitSignature {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(self.to_bytes()))
	}
}

/// Set-allowance authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitRequest {
	pub holder: Address,
	pub spender: Address,
	pub value: U256,
	pub deadline: U256,
	pub signature: PermitSignature,
}

/// Full-value fused shortcut; the caller is spender and recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveWithPermitRequest {
	pub holder: Address,
	pub value: U256,
	pub deadline: U256,
	pub signature: PermitSignature,
}

/// Partial-value fused shortcut; the caller is the spender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFromWithPermitRequest {
	pub from: Address,
	pub to: Address,
	pub transfer_amount: U256,
	pub value: U256,
	pub deadline: U256,
	pub signature: PermitSignature,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_signature_hex_layout() {
		let sig = PermitSignature::new(27, B256::repeat_byte(0x11), B256::repeat_byte(0x22));
		let encoded = sig.to_string();
		assert!(encoded.starts_with("0x1111"));
		assert!(encoded.ends_with("1b"));
		assert_eq!(encoded.parse::<PermitSignature>().unwrap(), sig);
	}

	#[test]
	fn test_signature_rejects_wrong_length() {
		assert_eq!(
			PermitSignature::from_bytes(&[0u8; 64]),
			Err(SignatureFormatError::Length(64))
		);
		assert!(matches!(
			"0xzz".parse::<PermitSignature>(),
			Err(SignatureFormatError::Hex(_))
		));
	}
}
