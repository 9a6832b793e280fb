//! EIP-712 domain binding.
//!
//! The domain separator is computed once and never changes for the lifetime of
//! the engine. It commits to the token name, the fixed version "1", the chain
//! id and the token contract address, so a signature produced for one
//! deployment is worthless on another chain or contract.

use alloy_primitives::{Address, B256};
use permit_types::utils::{compute_domain_hash, PERMIT_VERSION};

/// Immutable domain identifier of one token deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSeparator {
	name: String,
	chain_id: u64,
	verifying_contract: Address,
	hash: B256,
}

impl DomainSeparator {
	pub fn new(name: impl Into<String>, chain_id: u64, verifying_contract: Address) -> Self {
		let name = name.into();
		let hash = compute_domain_hash(&name, PERMIT_VERSION, chain_id, &verifying_contract);
		Self {
			name,
			chain_id,
			verifying_contract,
			hash,
		}
	}

	/// The 32-byte domain separator.
	pub fn hash(&self) -> B256 {
		self.hash
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn version(&self) -> &'static str {
		PERMIT_VERSION
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn verifying_contract(&self) -> Address {
		self.verifying_contract
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_separator_is_stable_and_scoped() {
		let contract = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
		let domain = DomainSeparator::new("Permit Token", 1, contract);

		assert_eq!(domain.hash(), DomainSeparator::new("Permit Token", 1, contract).hash());
		assert_ne!(domain.hash(), DomainSeparator::new("Permit Token", 5, contract).hash());
		assert_ne!(
			domain.hash(),
			DomainSeparator::new("Permit Token", 1, Address::repeat_byte(7)).hash()
		);
		assert_ne!(domain.hash(), DomainSeparator::new("Other", 1, contract).hash());
		assert_eq!(domain.version(), "1");
	}
}
