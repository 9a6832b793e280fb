//! secp256k1 signer recovery.
//!
//! Only canonical signatures are accepted: `v` must be 27 or 28, `r` and `s`
//! must lie in `[1, n)` and `s` must be in the lower half of the curve order.
//! A mismatched signer is not an error here; the caller compares the
//! recovered address against the claimed holder.

use alloy_primitives::{uint, Address, Signature, B256, U256};
use permit_types::PermitSignature;
use thiserror::Error;

/// Order of the secp256k1 group.
pub const SECP256K1_N: U256 =
	uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

/// Largest canonical `s` value, `n / 2`.
pub const SECP256K1_HALF_N: U256 =
	uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Reasons a signature cannot yield a signer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	#[error("Invalid recovery id v={0}, expected 27 or 28")]
	InvalidV(u8),
	#[error("Signature r is out of range")]
	InvalidR,
	#[error("Signature s is out of range")]
	InvalidS,
	#[error("Signature s is not in the lower half of the curve order")]
	HighS,
	#[error("Public key recovery failed: {0}")]
	Recovery(String),
}

/// Recovers the address that produced `signature` over `digest`.
pub fn recover_signer(digest: &B256, signature: &PermitSignature) -> Result<Address, SignatureError> {
	let y_parity = match signature.v {
		27 => false,
		28 => true,
		v => return Err(SignatureError::InvalidV(v)),
	};

	let r = U256::from_be_bytes(signature.r.0);
	let s = U256::from_be_bytes(signature.s.0);
	if r.is_zero() || r >= SECP256K1_N {
		return Err(SignatureError::InvalidR);
	}
	if s.is_zero() || s >= SECP256K1_N {
		return Err(SignatureError::InvalidS);
	}
	if s > SECP256K1_HALF_N {
		return Err(SignatureError::HighS);
	}

	Signature::new(r, s, y_parity)
		.recover_address_from_prehash(digest)
		.map_err(|e| SignatureError::Recovery(e.to_string()))
}
