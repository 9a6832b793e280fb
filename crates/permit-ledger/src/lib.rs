//! Ledger collaborator for the permit engine.
//!
//! The permit engine never keeps balances or allowances itself. It reaches the
//! token ledger through [`LedgerInterface`], a capability set of balance and
//! allowance primitives plus a transactional checkpoint used to make each
//! engine call all-or-nothing. Every mutating primitive returns the canonical
//! event(s) it emits so the caller can journal them.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use permit_types::{ConfigSchema, ImplementationRegistry, TokenEvent};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
	/// The debited account holds less than the requested amount.
	#[error("Insufficient balance: {account} holds {balance}, needs {needed}")]
	InsufficientBalance {
		account: Address,
		balance: U256,
		needed: U256,
	},
	/// The spender's allowance is lower than the requested amount.
	#[error("Insufficient allowance: {spender} may spend {allowance} of {owner}, needs {needed}")]
	InsufficientAllowance {
		owner: Address,
		spender: Address,
		allowance: U256,
		needed: U256,
	},
	/// A credit would overflow a balance or the total supply.
	#[error("Arithmetic overflow crediting {0}")]
	Overflow(Address),
	/// Checkpoint misuse, e.g. committing without an open transaction.
	#[error("Transaction error: {0}")]
	Transaction(String),
	/// Invalid backend configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Capability set the permit engine requires from a token ledger.
///
/// Implementations are used behind the engine's call lock, so `begin`,
/// `commit` and `rollback` never interleave with other calls.
#[async_trait]
pub trait LedgerInterface: Send + Sync {
	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn balance_of(&self, account: Address) -> Result<U256, LedgerError>;

	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, LedgerError>;

	async fn total_supply(&self) -> Result<U256, LedgerError>;

	/// Moves `amount` from `from` to `to`.
	async fn transfer(
		&self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<TokenEvent, LedgerError>;

	/// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
	/// allowance. An allowance of `U256::MAX` is never decremented.
	async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<Vec<TokenEvent>, LedgerError>;

	/// Overwrites the allowance of `spender` over `owner`'s balance.
	async fn set_allowance(
		&self,
		owner: Address,
		spender: Address,
		amount: U256,
	) -> Result<TokenEvent, LedgerError>;

	/// Destroys `amount` from `account`'s balance.
	async fn debit(&self, account: Address, amount: U256) -> Result<TokenEvent, LedgerError>;

	/// Opens a checkpoint that a later `rollback` returns to.
	async fn begin(&self) -> Result<(), LedgerError>;

	/// Keeps all changes since `begin`.
	async fn commit(&self) -> Result<(), LedgerError>;

	/// Discards all changes since `begin`.
	async fn rollback(&self) -> Result<(), LedgerError>;
}

/// Type alias for ledger factory functions.
pub type LedgerFactory = fn(&toml::Value) -> Result<Box<dyn LedgerInterface>, LedgerError>;

/// Registry trait for ledger implementations.
pub trait LedgerRegistry: ImplementationRegistry<Factory = LedgerFactory> {}

/// Get all registered ledger implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, LedgerFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// High-level ledger service used by the permit engine.
///
/// Wraps a backend and traces every state-changing primitive.
pub struct LedgerService {
	backend: Box<dyn LedgerInterface>,
}

impl LedgerService {
	pub fn new(backend: Box<dyn LedgerInterface>) -> Self {
		Self { backend }
	}

	pub async fn balance_of(&self, account: Address) -> Result<U256, LedgerError> {
		self.backend.balance_of(account).await
	}

	pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, LedgerError> {
		self.backend.allowance(owner, spender).await
	}

	pub async fn total_supply(&self) -> Result<U256, LedgerError> {
		self.backend.total_supply().await
	}

	pub async fn transfer(
		&self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<TokenEvent, LedgerError> {
		tracing::debug!(%from, %to, %amount, "Ledger transfer");
		self.backend.transfer(from, to, amount).await
	}

	pub async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<Vec<TokenEvent>, LedgerError> {
		tracing::debug!(%spender, %from, %to, %amount, "Ledger transferFrom");
		self.backend.transfer_from(spender, from, to, amount).await
	}

	pub async fn set_allowance(
		&self,
		owner: Address,
		spender: Address,
		amount: U256,
	) -> Result<TokenEvent, LedgerError> {
		tracing::debug!(%owner, %spender, %amount, "Ledger approve");
		self.backend.set_allowance(owner, spender, amount).await
	}

	pub async fn debit(&self, account: Address, amount: U256) -> Result<TokenEvent, LedgerError> {
		tracing::debug!(%account, %amount, "Ledger debit");
		self.backend.debit(account, amount).await
	}

	pub async fn begin(&self) -> Result<(), LedgerError> {
		self.backend.begin().await
	}

	pub async fn commit(&self) -> Result<(), LedgerError> {
		self.backend.commit().await
	}

	pub async fn rollback(&self) -> Result<(), LedgerError> {
		self.backend.rollback().await
	}
}
