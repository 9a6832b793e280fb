//! Off-chain signing client for permits.
//!
//! Holders sign permit digests off-chain and hand the `(v, r, s)` triple to a
//! relayer or spender. This crate provides the account abstraction used by
//! the CLI and by tests to produce those signatures.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use permit_types::{ConfigSchema, ImplementationRegistry, PermitSignature};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Signing the digest failed.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// The configured key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// The account configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface for accounts able to sign permit digests.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this account implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address recovered from signatures produced by this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte prehash without any message prefix.
	///
	/// The returned `v` is 27 or 28.
	async fn sign_hash(&self, hash: &B256) -> Result<PermitSignature, AccountError>;
}

/// Type alias for account factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that manages account operations.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs an EIP-712 permit digest.
	pub async fn sign_digest(&self, digest: &B256) -> Result<PermitSignature, AccountError> {
		self.implementation.sign_hash(digest).await
	}
}
