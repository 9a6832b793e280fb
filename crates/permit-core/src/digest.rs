//! Permit digest construction.
//!
//! Produces `keccak256(0x1901 || domainSeparator || structHash)` for the
//! `Permit` type. Wallets compute the same bytes from typed data, so the type
//! string and field order here are the wire contract with every signer.

use alloy_primitives::{keccak256, B256};
use permit_types::utils::{compute_final_digest, Eip712AbiEncoder, PERMIT_TYPE};
use permit_types::Permit;

/// keccak256 of the permit type string.
pub fn permit_typehash() -> B256 {
	keccak256(PERMIT_TYPE.as_bytes())
}

/// EIP-712 struct hash of a permit message.
pub fn struct_hash(permit: &Permit) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&permit_typehash());
	enc.push_address(&permit.owner);
	enc.push_address(&permit.spender);
	enc.push_u256(permit.value);
	enc.push_u256(permit.nonce);
	enc.push_u256(permit.deadline);
	keccak256(enc.finish())
}

/// Digest a holder signs to authorize `permit` under `domain_separator`.
pub fn build_digest(domain_separator: &B256, permit: &Permit) -> B256 {
	compute_final_digest(domain_separator, &struct_hash(permit))
}
