//! In-memory ledger backend.
//!
//! Keeps balances and allowances in hash maps behind a read-write lock. The
//! transactional checkpoint is a full copy of the state taken at `begin`,
//! which is cheap enough for the account counts this backend is meant for
//! (tests, local tooling and single-process deployments).

use crate::{LedgerError, LedgerFactory, LedgerInterface, LedgerRegistry};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use permit_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, TokenEvent, ValidationError,
};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Default)]
struct LedgerState {
	balances: HashMap<Address, U256>,
	allowances: HashMap<(Address, Address), U256>,
	total_supply: U256,
}

impl LedgerState {
	fn balance(&self, account: &Address) -> U256 {
		self.balances.get(account).copied().unwrap_or(U256::ZERO)
	}

	fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
		self.allowances
			.get(&(*owner, *spender))
			.copied()
			.unwrap_or(U256::ZERO)
	}

	fn debit(&mut self, account: Address, amount: U256) -> Result<(), LedgerError> {
		let balance = self.balance(&account);
		let remaining =
			balance
				.checked_sub(amount)
				.ok_or(LedgerError::InsufficientBalance {
					account,
					balance,
					needed: amount,
				})?;
		self.balances.insert(account, remaining);
		Ok(())
	}

	fn credit(&mut self, account: Address, amount: U256) -> Result<(), LedgerError> {
		let updated = self
			.balance(&account)
			.checked_add(amount)
			.ok_or(LedgerError::Overflow(account))?;
		self.balances.insert(account, updated);
		Ok(())
	}

	/// The credit cannot fail once the debit succeeded: every balance is
	/// bounded by the total supply, which is itself overflow-checked.
	fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
		self.debit(from, amount)?;
		self.credit(to, amount)
	}
}

/// In-memory ledger implementation.
pub struct MemoryLedger {
	state: RwLock<LedgerState>,
	/// Snapshot taken by `begin`, restored by `rollback`.
	checkpoint: Mutex<Option<LedgerState>>,
}

impl MemoryLedger {
	pub fn new() -> Self {
		Self {
			state: RwLock::new(LedgerState::default()),
			checkpoint: Mutex::new(None),
		}
	}

	/// Creates a ledger seeded with genesis balances.
	pub fn with_balances(
		balances: impl IntoIterator<Item = (Address, U256)>,
	) -> Result<Self, LedgerError> {
		let mut state = LedgerState::default();
		for (account, amount) in balances {
			state.credit(account, amount)?;
			state.total_supply = state
				.total_supply
				.checked_add(amount)
				.ok_or(LedgerError::Overflow(account))?;
		}
		Ok(Self {
			state: RwLock::new(state),
			checkpoint: Mutex::new(None),
		})
	}
}

impl Default for MemoryLedger {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl LedgerInterface for MemoryLedger {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryLedgerSchema)
	}

	async fn balance_of(&self, account: Address) -> Result<U256, LedgerError> {
		Ok(self.state.read().await.balance(&account))
	}

	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, LedgerError> {
		Ok(self.state.read().await.allowance(&owner, &spender))
	}

	async fn total_supply(&self) -> Result<U256, LedgerError> {
		Ok(self.state.read().await.total_supply)
	}

	async fn transfer(
		&self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<TokenEvent, LedgerError> {
		self.state.write().await.transfer(from, to, amount)?;
		Ok(TokenEvent::transfer(from, to, amount))
	}

	async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<Vec<TokenEvent>, LedgerError> {
		let mut state = self.state.write().await;
		let mut events = Vec::with_capacity(2);

		let allowance = state.allowance(&from, &spender);
		let remaining = if allowance == U256::MAX {
			None
		} else {
			Some(
				allowance
					.checked_sub(amount)
					.ok_or(LedgerError::InsufficientAllowance {
						owner: from,
						spender,
						allowance,
						needed: amount,
					})?,
			)
		};

		state.transfer(from, to, amount)?;
		if let Some(remaining) = remaining {
			state.allowances.insert((from, spender), remaining);
			events.push(TokenEvent::approval(from, spender, remaining));
		}
		events.push(TokenEvent::transfer(from, to, amount));
		Ok(events)
	}

	async fn set_allowance(
		&self,
		owner: Address,
		spender: Address,
		amount: U256,
	) -> Result<TokenEvent, LedgerError> {
		let mut state = self.state.write().await;
		state.allowances.insert((owner, spender), amount);
		Ok(TokenEvent::approval(owner, spender, amount))
	}

	async fn debit(&self, account: Address, amount: U256) -> Result<TokenEvent, LedgerError> {
		let mut state = self.state.write().await;
		state.debit(account, amount)?;
		// Cannot underflow: total supply is the sum of all balances and the
		// debit above proved `account` held at least `amount`.
		state.total_supply = state.total_supply.saturating_sub(amount);
		Ok(TokenEvent::transfer(account, Address::ZERO, amount))
	}

	async fn begin(&self) -> Result<(), LedgerError> {
		let mut checkpoint = self.checkpoint.lock().await;
		if checkpoint.is_some() {
			return Err(LedgerError::Transaction(
				"A transaction is already open".into(),
			));
		}
		*checkpoint = Some(self.state.read().await.clone());
		Ok(())
	}

	async fn commit(&self) -> Result<(), LedgerError> {
		self.checkpoint
			.lock()
			.await
			.take()
			.map(|_| ())
			.ok_or_else(|| LedgerError::Transaction("No open transaction to commit".into()))
	}

	async fn rollback(&self) -> Result<(), LedgerError> {
		let snapshot =
			self.checkpoint.lock().await.take().ok_or_else(|| {
				LedgerError::Transaction("No open transaction to roll back".into())
			})?;
		*self.state.write().await = snapshot;
		Ok(())
	}
}

/// Configuration schema for MemoryLedger.
pub struct MemoryLedgerSchema;

impl ConfigSchema for MemoryLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let allocation = Schema::new(
			vec![
				Field::new("address", FieldType::String).with_validator(|v| {
					v.as_str()
						.and_then(|s| Address::from_str(s).ok())
						.map(|_| ())
						.ok_or_else(|| "must be a 20-byte hex address".to_string())
				}),
				Field::new("amount", FieldType::String).with_validator(|v| {
					v.as_str()
						.and_then(|s| U256::from_str(s).ok())
						.map(|_| ())
						.ok_or_else(|| "must be a decimal or 0x-prefixed integer".to_string())
				}),
			],
			vec![],
		);
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"balances",
				FieldType::Array(Box::new(FieldType::Table(allocation))),
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a memory ledger from configuration.
///
/// Configuration parameters:
/// - `balances` (optional): genesis allocations `{ address, amount }`
pub fn create_ledger(config: &toml::Value) -> Result<Box<dyn LedgerInterface>, LedgerError> {
	MemoryLedgerSchema
		.validate(config)
		.map_err(|e| LedgerError::Configuration(e.to_string()))?;

	let mut allocations = Vec::new();
	if let Some(entries) = config.get("balances").and_then(|v| v.as_array()) {
		for entry in entries {
			let address = entry
				.get("address")
				.and_then(|v| v.as_str())
				.and_then(|s| Address::from_str(s).ok())
				.ok_or_else(|| LedgerError::Configuration("Invalid balance address".into()))?;
			let amount = entry
				.get("amount")
				.and_then(|v| v.as_str())
				.and_then(|s| U256::from_str(s).ok())
				.ok_or_else(|| LedgerError::Configuration("Invalid balance amount".into()))?;
			allocations.push((address, amount));
		}
	}

	Ok(Box::new(MemoryLedger::with_balances(allocations)?))
}

/// Registry for the memory ledger implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = LedgerFactory;

	fn factory() -> Self::Factory {
		create_ledger
	}
}

impl LedgerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const ALICE: Address = Address::repeat_byte(0xa1);
	const BOB: Address = Address::repeat_byte(0xb0);
	const CAROL: Address = Address::repeat_byte(0xc4);

	fn funded() -> MemoryLedger {
		MemoryLedger::with_balances([(ALICE, U256::from(1000u64))]).unwrap()
	}

	#[tokio::test]
	async fn test_transfer_and_insufficient_balance() {
		let ledger = funded();

		let event = ledger
			.transfer(ALICE, BOB, U256::from(400u64))
			.await
			.unwrap();
		assert_eq!(event, TokenEvent::transfer(ALICE, BOB, U256::from(400u64)));
		assert_eq!(ledger.balance_of(ALICE).await.unwrap(), U256::from(600u64));
		assert_eq!(ledger.balance_of(BOB).await.unwrap(), U256::from(400u64));

		let err = ledger
			.transfer(BOB, ALICE, U256::from(401u64))
			.await
			.unwrap_err();
		assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
		assert_eq!(ledger.balance_of(BOB).await.unwrap(), U256::from(400u64));
	}

	#[tokio::test]
	async fn test_self_transfer_keeps_balance() {
		let ledger = funded();
		ledger
			.transfer(ALICE, ALICE, U256::from(1000u64))
			.await
			.unwrap();
		assert_eq!(ledger.balance_of(ALICE).await.unwrap(), U256::from(1000u64));
	}

	#[tokio::test]
	async fn test_transfer_from_consumes_allowance() {
		let ledger = funded();
		ledger
			.set_allowance(ALICE, BOB, U256::from(500u64))
			.await
			.unwrap();

		let events = ledger
			.transfer_from(BOB, ALICE, CAROL, U256::from(200u64))
			.await
			.unwrap();
		assert_eq!(
			events,
			vec![
				TokenEvent::approval(ALICE, BOB, U256::from(300u64)),
				TokenEvent::transfer(ALICE, CAROL, U256::from(200u64)),
			]
		);
		assert_eq!(
			ledger.allowance(ALICE, BOB).await.unwrap(),
			U256::from(300u64)
		);

		let err = ledger
			.transfer_from(BOB, ALICE, CAROL, U256::from(301u64))
			.await
			.unwrap_err();
		assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
	}

	#[tokio::test]
	async fn test_unlimited_allowance_is_not_decremented() {
		let ledger = funded();
		ledger.set_allowance(ALICE, BOB, U256::MAX).await.unwrap();

		let events = ledger
			.transfer_from(BOB, ALICE, BOB, U256::from(10u64))
			.await
			.unwrap();
		assert_eq!(events.len(), 1);
		assert_eq!(ledger.allowance(ALICE, BOB).await.unwrap(), U256::MAX);
	}

	#[tokio::test]
	async fn test_debit_burns_supply() {
		let ledger = funded();
		let event = ledger.debit(ALICE, U256::from(250u64)).await.unwrap();
		assert_eq!(
			event,
			TokenEvent::transfer(ALICE, Address::ZERO, U256::from(250u64))
		);
		assert_eq!(ledger.total_supply().await.unwrap(), U256::from(750u64));
		assert!(ledger.debit(BOB, U256::from(1u64)).await.is_err());
	}

	#[tokio::test]
	async fn test_rollback_restores_checkpoint() {
		let ledger = funded();

		ledger.begin().await.unwrap();
		ledger
			.transfer(ALICE, BOB, U256::from(100u64))
			.await
			.unwrap();
		ledger
			.set_allowance(ALICE, BOB, U256::from(7u64))
			.await
			.unwrap();
		ledger.rollback().await.unwrap();

		assert_eq!(ledger.balance_of(ALICE).await.unwrap(), U256::from(1000u64));
		assert_eq!(ledger.allowance(ALICE, BOB).await.unwrap(), U256::ZERO);

		ledger.begin().await.unwrap();
		ledger
			.transfer(ALICE, BOB, U256::from(100u64))
			.await
			.unwrap();
		ledger.commit().await.unwrap();
		assert_eq!(ledger.balance_of(BOB).await.unwrap(), U256::from(100u64));

		assert!(matches!(
			ledger.commit().await,
			Err(LedgerError::Transaction(_))
		));
	}

	#[tokio::test]
	async fn test_nested_begin_rejected() {
		let ledger = MemoryLedger::new();
		ledger.begin().await.unwrap();
		assert!(matches!(
			ledger.begin().await,
			Err(LedgerError::Transaction(_))
		));
	}

	#[tokio::test]
	async fn test_factory_seeds_balances() {
		let config: toml::Value = toml::from_str(
			r#"
balances = [
	{ address = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1", amount = "1000" },
	{ address = "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0", amount = "0x10" },
]
"#,
		)
		.unwrap();

		let ledger = create_ledger(&config).unwrap();
		assert_eq!(ledger.balance_of(ALICE).await.unwrap(), U256::from(1000u64));
		assert_eq!(ledger.balance_of(BOB).await.unwrap(), U256::from(16u64));
		assert_eq!(ledger.total_supply().await.unwrap(), U256::from(1016u64));
	}

	#[tokio::test]
	async fn test_genesis_supply_overflow_rejected() {
		assert!(matches!(
			MemoryLedger::with_balances([(ALICE, U256::MAX), (BOB, U256::from(1u8))]),
			Err(LedgerError::Overflow(account)) if account == BOB
		));

		let ledger = MemoryLedger::with_balances([(ALICE, U256::from(1u8)), (ALICE, U256::from(2u8))])
			.unwrap();
		assert_eq!(ledger.balance_of(ALICE).await.unwrap(), U256::from(3u8));
		assert_eq!(ledger.total_supply().await.unwrap(), U256::from(3u8));
	}

	#[test]
	fn test_factory_rejects_bad_address() {
		let config: toml::Value =
			toml::from_str(r#"balances = [{ address = "nope", amount = "1" }]"#).unwrap();
		assert!(matches!(
			create_ledger(&config),
			Err(LedgerError::Configuration(_))
		));
	}
}
