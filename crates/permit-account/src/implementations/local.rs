//! Local private-key account.
//!
//! Signs digests in-process with a secp256k1 key loaded from configuration.
//! The key material is only held inside the signer and the redacting
//! `SecretString` used while parsing it.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy_primitives::{Address, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use permit_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, PermitSignature, Schema, SecretString,
	ValidationError,
};

/// Account backed by an in-memory private key.
#[derive(Debug)]
pub struct LocalAccount {
	signer: PrivateKeySigner,
}

impl LocalAccount {
	/// Parses a 0x-prefixed (or bare) hex private key.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		if private_key.is_empty() {
			return Err(AccountError::InvalidKey("empty private key".into()));
		}
		let signer = private_key
			.with_exposed(|key| key.parse::<PrivateKeySigner>())
			.map_err(|e| AccountError::InvalidKey(e.to_string()))?;
		Ok(Self { signer })
	}

	/// Creates an account with a freshly generated key.
	pub fn random() -> Self {
		Self {
			signer: PrivateKeySigner::random(),
		}
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAccountSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_hash(&self, hash: &B256) -> Result<PermitSignature, AccountError> {
		let signature = self
			.signer
			.sign_hash(hash)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;

		Ok(PermitSignature::new(
			27 + u8::from(signature.v()),
			B256::from(signature.r().to_be_bytes::<32>()),
			B256::from(signature.s().to_be_bytes::<32>()),
		))
	}
}

/// Configuration schema for LocalAccount.
pub struct LocalAccountSchema;

impl ConfigSchema for LocalAccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let hex = key.strip_prefix("0x").unwrap_or(key);
					if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
						Ok(())
					} else {
						Err("must be 32 bytes of hex".to_string())
					}
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a local account from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex-encoded secp256k1 key
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalAccountSchema
		.validate(config)
		.map_err(|e| AccountError::Configuration(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::Configuration("private_key is required".into()))?;

	Ok(Box::new(LocalAccount::new(&private_key)?))
}

/// Registry for the local account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, keccak256, Signature, U256};

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_known_key_address() {
		let account = LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap();
		assert_eq!(
			account.address().await.unwrap(),
			address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
	}

	#[tokio::test]
	async fn test_signature_recovers_to_signer() {
		let account = LocalAccount::random();
		let hash = keccak256(b"permit");
		let sig = account.sign_hash(&hash).await.unwrap();

		assert!(sig.v == 27 || sig.v == 28);
		let recovered = Signature::new(
			U256::from_be_bytes(sig.r.0),
			U256::from_be_bytes(sig.s.0),
			sig.v == 28,
		)
		.recover_address_from_prehash(&hash)
		.unwrap();
		assert_eq!(recovered, account.address().await.unwrap());
	}

	#[test]
	fn test_factory_validates_key() {
		let config: toml::Value = toml::from_str("private_key = \"0x1234\"").unwrap();
		assert!(matches!(
			create_account(&config),
			Err(AccountError::Configuration(_))
		));

		let config: toml::Value = toml::from_str(&format!("private_key = \"{DEV_KEY}\"")).unwrap();
		assert!(create_account(&config).is_ok());
	}
}
