//! JSON call batches for the `apply` command.
//!
//! A batch is a list of engine calls executed in order against one engine.
//! Failing calls are reported and do not stop the batch.
//!
//! ```json
//! { "calls": [
//!   { "op": "permit", "caller": "0x…", "holder": "0x…", "spender": "0x…",
//!     "value": "500", "deadline": "1700000060",
//!     "signature": { "v": 27, "r": "0x…", "s": "0x…" } },
//!   { "op": "burn", "caller": "0x…", "amount": "10" }
//! ] }
//! ```

use alloy_primitives::{Address, U256};
use permit_core::PermitEngine;
use permit_types::{
	current_timestamp, CallContext, PermitRequest, ReceiveWithPermitRequest, TokenEvent,
	TransferFromWithPermitRequest,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::broadcast::{self, error::TryRecvError};

#[derive(Debug, Deserialize)]
pub struct Batch {
	pub calls: Vec<Call>,
}

/// One engine call. `timestamp` defaults to the wall clock.
#[derive(Debug, Deserialize)]
pub struct Call {
	pub caller: Address,
	#[serde(default)]
	pub timestamp: Option<u64>,
	#[serde(flatten)]
	pub op: Operation,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
	Permit(PermitRequest),
	ReceiveWithPermit(ReceiveWithPermitRequest),
	TransferFromWithPermit(TransferFromWithPermitRequest),
	Burn { amount: U256 },
}

impl Operation {
	fn name(&self) -> &'static str {
		match self {
			Self::Permit(_) => "permit",
			Self::ReceiveWithPermit(_) => "receive_with_permit",
			Self::TransferFromWithPermit(_) => "transfer_from_with_permit",
			Self::Burn { .. } => "burn",
		}
	}

	/// Holder whose nonce the call may consume.
	fn holder(&self) -> Option<Address> {
		match self {
			Self::Permit(request) => Some(request.holder),
			Self::ReceiveWithPermit(request) => Some(request.holder),
			Self::TransferFromWithPermit(request) => Some(request.from),
			Self::Burn { .. } => None,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct CallOutcome {
	pub index: usize,
	pub op: &'static str,
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NonceEntry {
	pub holder: Address,
	pub nonce: U256,
}

/// Result of a batch run.
#[derive(Debug, Serialize)]
pub struct Report {
	pub outcomes: Vec<CallOutcome>,
	/// Events of committed calls, in commit order.
	pub events: Vec<TokenEvent>,
	/// Events lost because a single call emitted more than the bus holds.
	#[serde(skip_serializing_if = "is_zero")]
	pub dropped_events: u64,
	/// Final nonces of every holder named in the batch.
	pub nonces: Vec<NonceEntry>,
}

fn is_zero(n: &u64) -> bool {
	*n == 0
}

/// Moves every buffered event into `events`, returning how many were lost to
/// buffer overflow.
fn drain_events(receiver: &mut broadcast::Receiver<TokenEvent>, events: &mut Vec<TokenEvent>) -> u64 {
	let mut dropped = 0;
	loop {
		match receiver.try_recv() {
			Ok(event) => events.push(event),
			Err(TryRecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Event buffer overflowed; raise authorization.event_capacity");
				dropped += skipped;
			},
			Err(_) => return dropped,
		}
	}
}

/// Runs every call of `batch` against `engine`.
///
/// Events are collected after each call, so the bus only has to hold the
/// events of one call.
pub async fn run(engine: &PermitEngine, batch: Batch) -> Report {
	let mut receiver = engine.subscribe();
	let mut outcomes = Vec::with_capacity(batch.calls.len());
	let mut events = Vec::new();
	let mut dropped_events = 0;
	let mut holders = BTreeSet::new();

	for (index, call) in batch.calls.into_iter().enumerate() {
		let ctx = CallContext::new(call.caller, call.timestamp.unwrap_or_else(current_timestamp));
		if let Some(holder) = call.op.holder() {
			holders.insert(holder);
		}

		let op = call.op.name();
		let result = match &call.op {
			Operation::Permit(request) => engine.permit(&ctx, request).await,
			Operation::ReceiveWithPermit(request) => engine.receive_with_permit(&ctx, request).await,
			Operation::TransferFromWithPermit(request) => {
				engine.transfer_from_with_permit(&ctx, request).await
			},
			Operation::Burn { amount } => engine.burn(&ctx, *amount).await,
		};

		if let Err(e) = &result {
			tracing::warn!(index, op, error = %e, "Call failed");
		}
		outcomes.push(CallOutcome {
			index,
			op,
			ok: result.is_ok(),
			error: result.err().map(|e| e.to_string()),
		});
		dropped_events += drain_events(&mut receiver, &mut events);
	}

	let mut nonces = Vec::with_capacity(holders.len());
	for holder in holders {
		nonces.push(NonceEntry {
			holder,
			nonce: engine.nonce_of(holder).await,
		});
	}

	Report {
		outcomes,
		events,
		dropped_events,
		nonces,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::ledger_factories;
	use permit_account::implementations::local::LocalAccount;
	use permit_account::AccountInterface;
	use permit_config::Config;
	use permit_core::{build_digest, PermitEngineBuilder};
	use permit_types::{Permit, SecretString};

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const HOLDER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
	const SPENDER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

	const CONFIG: &str = r#"
[token]
name = "Permit Token"
chain_id = 31337
address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

[ledger]
primary = "memory"
[ledger.implementations.memory]
balances = [{ address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", amount = "1000" }]
"#;

	fn engine() -> PermitEngine {
		let config: Config = CONFIG.parse().unwrap();
		PermitEngineBuilder::new(config)
			.build(ledger_factories())
			.unwrap()
	}

	#[tokio::test]
	async fn test_batch_reports_outcomes_events_and_nonces() {
		let engine = engine();
		let holder: Address = HOLDER.parse().unwrap();
		let spender: Address = SPENDER.parse().unwrap();
		let account = LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap();

		let digest = build_digest(
			&engine.domain_separator(),
			&Permit {
				owner: holder,
				spender,
				value: U256::from(500u64),
				nonce: U256::ZERO,
				deadline: U256::from(2_000_000_000u64),
			},
		);
		let signature = account.sign_hash(&digest).await.unwrap();

		let batch_json = serde_json::json!({
			"calls": [
				{
					"op": "permit",
					"caller": SPENDER,
					"timestamp": 1_700_000_000u64,
					"holder": HOLDER,
					"spender": SPENDER,
					"value": "0x1f4",
					"deadline": "0x77359400",
					"signature": signature,
				},
				{
					"op": "permit",
					"caller": SPENDER,
					"timestamp": 1_700_000_000u64,
					"holder": HOLDER,
					"spender": SPENDER,
					"value": "0x1f4",
					"deadline": "0x77359400",
					"signature": signature,
				},
				{ "op": "burn", "caller": HOLDER, "amount": "0xa" },
			]
		});
		let batch: Batch = serde_json::from_value(batch_json).unwrap();
		let report = run(&engine, batch).await;

		let ok: Vec<bool> = report.outcomes.iter().map(|o| o.ok).collect();
		assert_eq!(ok, vec![true, false, true]);
		assert!(report.outcomes[1]
			.error
			.as_deref()
			.unwrap()
			.contains("Signature mismatch"));

		assert_eq!(
			report.events,
			vec![
				TokenEvent::approval(holder, spender, U256::from(500u64)),
				TokenEvent::transfer(holder, Address::ZERO, U256::from(10u64)),
			]
		);
		assert_eq!(report.dropped_events, 0);
		assert_eq!(report.nonces.len(), 1);
		assert_eq!(report.nonces[0].holder, holder);
		assert_eq!(report.nonces[0].nonce, U256::from(2u8));
	}

	#[tokio::test]
	async fn test_batch_longer_than_event_capacity_keeps_all_events() {
		let mut config: Config = CONFIG.parse().unwrap();
		config.authorization.event_capacity = 1;
		let engine = PermitEngineBuilder::new(config)
			.build(ledger_factories())
			.unwrap();
		let holder: Address = HOLDER.parse().unwrap();

		let batch: Batch = serde_json::from_value(serde_json::json!({
			"calls": [
				{ "op": "burn", "caller": HOLDER, "amount": "0x1" },
				{ "op": "burn", "caller": HOLDER, "amount": "0x2" },
				{ "op": "burn", "caller": HOLDER, "amount": "0x3" },
			]
		}))
		.unwrap();
		let report = run(&engine, batch).await;

		assert_eq!(
			report.events,
			vec![
				TokenEvent::transfer(holder, Address::ZERO, U256::from(1u8)),
				TokenEvent::transfer(holder, Address::ZERO, U256::from(2u8)),
				TokenEvent::transfer(holder, Address::ZERO, U256::from(3u8)),
			]
		);
		assert_eq!(report.dropped_events, 0);
		assert_eq!(
			engine.balance_of(holder).await.unwrap(),
			U256::from(994u64)
		);
	}

	#[test]
	fn test_unknown_op_rejected() {
		let result: Result<Batch, _> = serde_json::from_str(
			r#"{ "calls": [ { "op": "mint", "caller": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266" } ] }"#,
		);
		assert!(result.is_err());
	}
}
