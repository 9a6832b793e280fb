//! Configuration module for the permit engine.
//!
//! Configuration is loaded from a TOML file. `${VAR}` and `${VAR:-default}`
//! placeholders are replaced with environment variables before parsing, and
//! the parsed configuration is validated before it is handed out.

use alloy_primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message; the default rendering dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Token identity bound into the EIP-712 domain.
	pub token: TokenConfig,
	/// Authorization processing options.
	#[serde(default)]
	pub authorization: AuthorizationConfig,
	/// Ledger backend selection.
	pub ledger: LedgerConfig,
	/// Signing account used by the CLI `sign` command.
	pub account: Option<AccountConfig>,
}

/// Token identity. Changing any field changes the domain separator and
/// invalidates every outstanding signature.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
	/// Display name committed to by the domain separator.
	pub name: String,
	/// Chain the token is deployed on.
	pub chain_id: u64,
	/// Address of the token contract (EIP-712 `verifyingContract`).
	pub address: Address,
}

/// What happens to a consumed nonce when a later step of the same call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoncePolicy {
	/// The nonce stays consumed; every attempt that passes the deadline
	/// check burns exactly one nonce.
	#[default]
	ConsumeOnAttempt,
	/// The nonce increment is rolled back with the rest of the call.
	RevertOnFailure,
}

/// Authorization processing options.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthorizationConfig {
	#[serde(default)]
	pub nonce_policy: NoncePolicy,
	/// Buffer size of the committed-event broadcast channel.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

impl Default for AuthorizationConfig {
	fn default() -> Self {
		Self {
			nonce_policy: NoncePolicy::default(),
			event_capacity: default_event_capacity(),
		}
	}
}

fn default_event_capacity() -> usize {
	1024
}

/// Ledger backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of ledger implementation names to their raw configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Signing account configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of account implementation names to their raw configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with the default
/// in `${VAR_NAME:-default}` when the variable is unset.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		content.parse()
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.token.name.is_empty() {
			return Err(ConfigError::Validation("Token name cannot be empty".into()));
		}
		if self.token.chain_id == 0 {
			return Err(ConfigError::Validation(
				"Token chain_id must be greater than 0".into(),
			));
		}
		if self.token.address == Address::ZERO {
			return Err(ConfigError::Validation(
				"Token address cannot be the zero address".into(),
			));
		}

		if self.authorization.event_capacity == 0 {
			return Err(ConfigError::Validation(
				"Authorization event_capacity must be greater than 0".into(),
			));
		}

		if self.ledger.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Ledger primary implementation cannot be empty".into(),
			));
		}
		if !self.ledger.implementations.contains_key(&self.ledger.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary ledger '{}' not found in implementations",
				self.ledger.primary
			)));
		}

		if let Some(account) = &self.account {
			if !account.implementations.contains_key(&account.primary) {
				return Err(ConfigError::Validation(format!(
					"Primary account '{}' not found in implementations",
					account.primary
				)));
			}
		}

		Ok(())
	}
}

/// Parses and validates configuration from a TOML string, resolving
/// environment variables first.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
