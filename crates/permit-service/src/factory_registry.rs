//! Factory lookup for the configurable backends.

use permit_account::{AccountError, AccountFactory, AccountService};
use permit_config::AccountConfig;
use permit_ledger::LedgerFactory;
use std::collections::HashMap;

/// All ledger factories keyed by implementation name.
pub fn ledger_factories() -> HashMap<String, LedgerFactory> {
	permit_ledger::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect()
}

/// All account factories keyed by implementation name.
pub fn account_factories() -> HashMap<String, AccountFactory> {
	permit_account::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect()
}

/// Instantiates the primary signing account from configuration.
pub fn build_account(config: &AccountConfig) -> Result<AccountService, AccountError> {
	let factories = account_factories();
	let factory = factories.get(&config.primary).ok_or_else(|| {
		AccountError::Configuration(format!("Unknown account implementation '{}'", config.primary))
	})?;
	let implementation_config = config.implementations.get(&config.primary).ok_or_else(|| {
		AccountError::Configuration(format!("Account '{}' has no configuration", config.primary))
	})?;

	let account = factory(implementation_config)?;
	tracing::info!(component = "account", implementation = %config.primary, "Loaded");
	Ok(AccountService::new(account))
}
