//! Builder for constructing a permit engine from configuration.
//!
//! The ledger backend is chosen by name from a set of factory functions, so
//! new backends plug in without touching the engine.

use crate::domain::DomainSeparator;
use crate::engine::{event_bus::EventBus, PermitEngine};
use permit_config::Config;
use permit_ledger::{LedgerError, LedgerInterface, LedgerService};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Builds a [`PermitEngine`] from a validated [`Config`].
pub struct PermitEngineBuilder {
	config: Config,
}

impl PermitEngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Instantiates the primary ledger through its factory and wires the
	/// engine around it.
	pub fn build<LF>(self, ledger_factories: HashMap<String, LF>) -> Result<PermitEngine, BuilderError>
	where
		LF: Fn(&toml::Value) -> Result<Box<dyn LedgerInterface>, LedgerError>,
	{
		let primary = &self.config.ledger.primary;
		let ledger_config = self
			.config
			.ledger
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary ledger '{}' has no configuration",
					primary
				))
			})?;
		let factory = ledger_factories
			.get(primary)
			.ok_or_else(|| BuilderError::MissingComponent(format!("ledger '{}'", primary)))?;

		let backend = match factory(ledger_config) {
			Ok(backend) => {
				tracing::info!(component = "ledger", implementation = %primary, "Loaded");
				backend
			},
			Err(e) => {
				tracing::error!(
					component = "ledger",
					implementation = %primary,
					error = %e,
					"Failed to create ledger implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create ledger implementation '{}': {}",
					primary, e
				)));
			},
		};

		let token = &self.config.token;
		let domain = DomainSeparator::new(token.name.clone(), token.chain_id, token.address);
		tracing::info!(
			token = %token.name,
			chain_id = token.chain_id,
			domain_separator = %domain.hash(),
			"Domain bound"
		);

		Ok(PermitEngine::new(
			domain,
			LedgerService::new(backend),
			self.config.authorization.nonce_policy,
			EventBus::new(self.config.authorization.event_capacity),
		))
	}
}
