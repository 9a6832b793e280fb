//! Authorization processor.
//!
//! Every public operation runs as one transaction: the engine lock is taken,
//! the ledger is checkpointed, the operation runs, and the ledger is either
//! committed (and the call's events published) or rolled back. The lock also
//! guards the nonce ledger, so nonce consumption and ledger effects of one
//! call are never interleaved with another call.
//!
//! A call whose future is dropped between checkpoint and commit leaves its
//! marker in the locked state. The next caller to take the lock rolls that
//! call back before doing anything else.

pub mod event_bus;

use crate::digest::build_digest;
use crate::domain::DomainSeparator;
use crate::nonces::NonceLedger;
use crate::signature::recover_signer;
use crate::PermitError;
use alloy_primitives::{Address, B256, U256};
use event_bus::EventBus;
use permit_config::NoncePolicy;
use permit_ledger::LedgerService;
use permit_types::{
	short_address, CallContext, Permit, PermitRequest, PermitSignature, ReceiveWithPermitRequest,
	TokenEvent, TransferFromWithPermitRequest,
};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::instrument;

/// State guarded by the engine lock.
#[derive(Default)]
struct EngineState {
	nonces: NonceLedger,
	/// Set from checkpoint until commit or rollback.
	open_call: Option<OpenCall>,
}

/// Bookkeeping for a call that holds a ledger checkpoint.
#[derive(Default)]
struct OpenCall {
	consumed_nonce: Option<(Address, U256)>,
}

impl EngineState {
	/// Consumes `holder`'s nonce and records it against the open call.
	fn consume_nonce(&mut self, holder: Address) -> U256 {
		let nonce = self.nonces.consume(holder);
		if let Some(call) = self.open_call.as_mut() {
			call.consumed_nonce = Some((holder, nonce));
		}
		nonce
	}
}

/// The signed fields of an authorization, before its nonce is known.
struct Grant<'a> {
	owner: Address,
	spender: Address,
	value: U256,
	deadline: U256,
	signature: &'a PermitSignature,
}

/// Signature-based approval engine over a ledger collaborator.
pub struct PermitEngine {
	domain: DomainSeparator,
	ledger: LedgerService,
	state: Mutex<EngineState>,
	policy: NoncePolicy,
	event_bus: EventBus,
}

impl PermitEngine {
	pub fn new(
		domain: DomainSeparator,
		ledger: LedgerService,
		policy: NoncePolicy,
		event_bus: EventBus,
	) -> Self {
		Self {
			domain,
			ledger,
			state: Mutex::new(EngineState::default()),
			policy,
			event_bus,
		}
	}

	/// Sets `allowance(holder, spender) = value` on a valid holder signature.
	#[instrument(skip_all, fields(holder = %short_address(&request.holder)))]
	pub async fn permit(&self, ctx: &CallContext, request: &PermitRequest) -> Result<(), PermitError> {
		let mut state = self.lock().await;
		self.begin(&mut state).await?;
		let mut events = Vec::new();
		let result = self.apply_permit(&mut state, &mut events, ctx, request).await;
		self.finish(&mut state, events, result).await
	}

	/// Approves the caller for `value` and immediately pulls all of it from
	/// the holder to the caller.
	#[instrument(skip_all, fields(holder = %short_address(&request.holder)))]
	pub async fn receive_with_permit(
		&self,
		ctx: &CallContext,
		request: &ReceiveWithPermitRequest,
	) -> Result<(), PermitError> {
		let mut state = self.lock().await;
		self.begin(&mut state).await?;
		let mut events = Vec::new();
		let result = self
			.apply_receive(&mut state, &mut events, ctx, request)
			.await;
		self.finish(&mut state, events, result).await
	}

	/// Approves the caller for `value`, moves `transfer_amount` from `from` to
	/// `to` and leaves the remainder as the caller's allowance.
	#[instrument(skip_all, fields(holder = %short_address(&request.from)))]
	pub async fn transfer_from_with_permit(
		&self,
		ctx: &CallContext,
		request: &TransferFromWithPermitRequest,
	) -> Result<(), PermitError> {
		let mut state = self.lock().await;
		self.begin(&mut state).await?;
		let mut events = Vec::new();
		let result = self
			.apply_transfer_from(&mut state, &mut events, ctx, request)
			.await;
		self.finish(&mut state, events, result).await
	}

	/// Destroys `amount` of the caller's own balance.
	#[instrument(skip_all, fields(caller = %short_address(&ctx.caller)))]
	pub async fn burn(&self, ctx: &CallContext, amount: U256) -> Result<(), PermitError> {
		let mut state = self.lock().await;
		self.begin(&mut state).await?;
		let mut events = Vec::new();
		let result = match self.ledger.debit(ctx.caller, amount).await {
			Ok(event) => {
				events.push(event);
				tracing::info!(%amount, "Burned");
				Ok(())
			},
			Err(e) => Err(e.into()),
		};
		self.finish(&mut state, events, result).await
	}

	/// Nonce the next authorization from `holder` must be signed over.
	pub async fn nonce_of(&self, holder: Address) -> U256 {
		self.lock().await.nonces.current(&holder)
	}

	pub fn domain_separator(&self) -> B256 {
		self.domain.hash()
	}

	pub fn token_name(&self) -> &str {
		self.domain.name()
	}

	pub fn chain_id(&self) -> u64 {
		self.domain.chain_id()
	}

	pub fn contract_address(&self) -> Address {
		self.domain.verifying_contract()
	}

	pub fn nonce_policy(&self) -> NoncePolicy {
		self.policy
	}

	pub async fn balance_of(&self, account: Address) -> Result<U256, PermitError> {
		let _state = self.lock().await;
		Ok(self.ledger.balance_of(account).await?)
	}

	pub async fn allowance(&self, holder: Address, spender: Address) -> Result<U256, PermitError> {
		let _state = self.lock().await;
		Ok(self.ledger.allowance(holder, spender).await?)
	}

	pub async fn total_supply(&self) -> Result<U256, PermitError> {
		let _state = self.lock().await;
		Ok(self.ledger.total_supply().await?)
	}

	/// Receives every event of every committed call from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
		self.event_bus.subscribe()
	}

	async fn apply_permit(
		&self,
		state: &mut EngineState,
		events: &mut Vec<TokenEvent>,
		ctx: &CallContext,
		request: &PermitRequest,
	) -> Result<(), PermitError> {
		self.authorize(
			state,
			ctx,
			Grant {
				owner: request.holder,
				spender: request.spender,
				value: request.value,
				deadline: request.deadline,
				signature: &request.signature,
			},
		)?;

		let event = self
			.ledger
			.set_allowance(request.holder, request.spender, request.value)
			.await?;
		events.push(event);

		tracing::info!(
			spender = %short_address(&request.spender),
			value = %request.value,
			"Permit applied"
		);
		Ok(())
	}

	async fn apply_receive(
		&self,
		state: &mut EngineState,
		events: &mut Vec<TokenEvent>,
		ctx: &CallContext,
		request: &ReceiveWithPermitRequest,
	) -> Result<(), PermitError> {
		let caller = ctx.caller;
		self.authorize(
			state,
			ctx,
			Grant {
				owner: request.holder,
				spender: caller,
				value: request.value,
				deadline: request.deadline,
				signature: &request.signature,
			},
		)?;

		let approval = self
			.ledger
			.set_allowance(request.holder, caller, request.value)
			.await?;
		events.push(approval);

		let moved = self
			.ledger
			.transfer_from(caller, request.holder, caller, request.value)
			.await?;
		events.extend(moved);

		tracing::info!(
			receiver = %short_address(&caller),
			value = %request.value,
			"Received with permit"
		);
		Ok(())
	}

	async fn apply_transfer_from(
		&self,
		state: &mut EngineState,
		events: &mut Vec<TokenEvent>,
		ctx: &CallContext,
		request: &TransferFromWithPermitRequest,
	) -> Result<(), PermitError> {
		let spender = ctx.caller;
		self.authorize(
			state,
			ctx,
			Grant {
				owner: request.from,
				spender,
				value: request.value,
				deadline: request.deadline,
				signature: &request.signature,
			},
		)?;

		// The signed value is announced first; the stored allowance is only
		// ever the residual.
		events.push(TokenEvent::approval(request.from, spender, request.value));

		let residual = if request.value == U256::MAX {
			U256::MAX
		} else {
			request
				.value
				.checked_sub(request.transfer_amount)
				.ok_or(PermitError::InsufficientRequestedAllowance {
					requested: request.transfer_amount,
					authorized: request.value,
				})?
		};

		let approval = self
			.ledger
			.set_allowance(request.from, spender, residual)
			.await?;
		events.push(approval);

		let transfer = self
			.ledger
			.transfer(request.from, request.to, request.transfer_amount)
			.await?;
		events.push(transfer);

		tracing::info!(
			to = %short_address(&request.to),
			amount = %request.transfer_amount,
			residual = %residual,
			"Transferred with permit"
		);
		Ok(())
	}

	/// Deadline check, nonce consumption, digest and signer recovery, in
	/// that order. The nonce is consumed before the signature is looked at.
	fn authorize(
		&self,
		state: &mut EngineState,
		ctx: &CallContext,
		grant: Grant<'_>,
	) -> Result<(), PermitError> {
		if U256::from(ctx.timestamp) > grant.deadline {
			return Err(PermitError::ExpiredAuthorization {
				deadline: grant.deadline,
				now: ctx.timestamp,
			});
		}

		let nonce = state.consume_nonce(grant.owner);

		let digest = build_digest(
			&self.domain.hash(),
			&Permit {
				owner: grant.owner,
				spender: grant.spender,
				value: grant.value,
				nonce,
				deadline: grant.deadline,
			},
		);

		let recovered = recover_signer(&digest, grant.signature)?;
		if recovered != grant.owner {
			return Err(PermitError::SignatureMismatch {
				expected: grant.owner,
				recovered,
			});
		}

		tracing::debug!(%nonce, "Authorization verified");
		Ok(())
	}

	/// Takes the engine lock, first rolling back any call that was abandoned
	/// while it held a checkpoint.
	async fn lock(&self) -> MutexGuard<'_, EngineState> {
		let mut state = self.state.lock().await;
		if state.open_call.is_some() {
			tracing::warn!("Rolling back abandoned call");
			self.rollback(&mut state).await;
		}
		state
	}

	async fn begin(&self, state: &mut EngineState) -> Result<(), PermitError> {
		// Marked before awaiting so a drop mid-checkpoint is still recovered.
		state.open_call = Some(OpenCall::default());
		if let Err(e) = self.ledger.begin().await {
			state.open_call = None;
			return Err(e.into());
		}
		Ok(())
	}

	async fn finish(
		&self,
		state: &mut EngineState,
		events: Vec<TokenEvent>,
		result: Result<(), PermitError>,
	) -> Result<(), PermitError> {
		match result {
			Ok(()) => {
				// A failed commit keeps the call open; the next lock rolls it back.
				self.ledger.commit().await?;
				state.open_call = None;
				let names: Vec<&str> = events.iter().map(TokenEvent::name).collect();
				let delivered = self.event_bus.publish_all(events);
				tracing::debug!(events = ?names, delivered, "Call committed");
				Ok(())
			},
			Err(err) => {
				self.rollback(state).await;
				tracing::warn!(error = %err, "Call reverted");
				Err(err)
			},
		}
	}

	/// Discards the open call's ledger writes and, under `RevertOnFailure`,
	/// its nonce. The call stays marked open until the ledger has answered.
	async fn rollback(&self, state: &mut EngineState) {
		if let Err(e) = self.ledger.rollback().await {
			tracing::error!(error = %e, "Ledger rollback failed");
		}
		let call = state.open_call.take().unwrap_or_default();
		if self.policy == NoncePolicy::RevertOnFailure {
			if let Some((holder, previous)) = call.consumed_nonce {
				state.nonces.restore(holder, previous);
			}
		}
	}
}
