//! Generic EIP-712 utilities shared across the permit engine.
//!
//! These helpers provide:
//! - Domain hash computation (name, version, chainId, verifyingContract)
//! - Final digest computation (0x1901 || domainHash || structHash)
//! - A minimal ABI encoder for the static field types used by permits

use alloy_primitives::{keccak256, Address, B256, U256};

/// Domain type string committed to by every domain separator.
pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Permit type string. Field order and names are part of the wire contract
/// with off-chain signers; changing it is a breaking protocol change.
pub const PERMIT_TYPE: &str =
	"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

/// Protocol version bound into the domain.
pub const PERMIT_VERSION: &str = "1";

/// Compute EIP-712 domain hash
/// (keccak256(abi.encode(typeHash, nameHash, versionHash, chainId, verifyingContract))).
pub fn compute_domain_hash(
	name: &str,
	version: &str,
	chain_id: u64,
	verifying_contract: &Address,
) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_b256(&keccak256(name.as_bytes()));
	enc.push_b256(&keccak256(version.as_bytes()));
	enc.push_u256(U256::from(chain_id));
	enc.push_address(verifying_contract);
	keccak256(enc.finish())
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Minimal ABI encoder for static types used in EIP-712 struct hashing.
///
/// Every value occupies exactly one 32-byte word.
#[derive(Debug, Default)]
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self {
			buf: Vec::with_capacity(32 * 6),
		}
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	/// Addresses are left-padded with 12 zero bytes.
	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		let word: [u8; 32] = v.to_be_bytes::<32>();
		self.buf.extend_from_slice(&word);
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use alloy_sol_types::eip712_domain;

	#[test]
	fn test_domain_hash_matches_alloy() {
		let contract = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
		let expected = eip712_domain! {
			name: "Permit Token",
			version: "1",
			chain_id: 31337,
			verifying_contract: contract,
		}
		.separator();

		assert_eq!(
			compute_domain_hash("Permit Token", PERMIT_VERSION, 31337, &contract),
			expected
		);
	}

	#[test]
	fn test_domain_hash_binds_chain_and_contract() {
		let a = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
		let b = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");

		let base = compute_domain_hash("Token", PERMIT_VERSION, 1, &a);
		assert_ne!(base, compute_domain_hash("Token", PERMIT_VERSION, 10, &a));
		assert_ne!(base, compute_domain_hash("Token", PERMIT_VERSION, 1, &b));
		assert_ne!(base, compute_domain_hash("Token", "2", 1, &a));
	}

	#[test]
	fn test_encoder_word_layout() {
		let addr = address!("0x00000000000000000000000000000000000000ff");
		let mut enc = Eip712AbiEncoder::new();
		enc.push_address(&addr);
		enc.push_u256(U256::from(1u8));
		let bytes = enc.finish();

		assert_eq!(bytes.len(), 64);
		assert!(bytes[..31].iter().all(|b| *b == 0));
		assert_eq!(bytes[31], 0xff);
		assert_eq!(bytes[63], 1);
	}
}
