//! Signature-based approval engine for a token ledger.
//!
//! A holder authorizes a spender off-chain by signing an EIP-712 digest over
//! a `Permit` message. The engine checks the deadline, consumes the holder's
//! nonce, rebuilds the digest, recovers the signer and only then touches the
//! ledger: either setting an allowance or approving and transferring in the
//! same call. Events produced during a call are published once it commits.

use alloy_primitives::{Address, U256};
use permit_ledger::LedgerError;
use thiserror::Error;

pub mod builder;
pub mod digest;
pub mod domain;
pub mod engine;
pub mod nonces;
pub mod signature;

pub use builder::{BuilderError, PermitEngineBuilder};
pub use digest::build_digest;
pub use domain::DomainSeparator;
pub use engine::{event_bus::EventBus, PermitEngine};
pub use nonces::NonceLedger;
pub use permit_config::NoncePolicy;
pub use signature::{recover_signer, SignatureError};

/// Errors that end an engine call.
///
/// Every variant is terminal for the call; the ledger is rolled back before
/// the error is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermitError {
	/// The call's timestamp is past the signed deadline.
	#[error("Authorization expired: deadline {deadline}, now {now}")]
	ExpiredAuthorization { deadline: U256, now: u64 },
	/// The signature could not be recovered at all.
	#[error("Invalid signature: {0}")]
	InvalidSignature(#[from] SignatureError),
	/// The signature is valid but was produced by someone other than the holder,
	/// or over a different nonce, spender, value, deadline or domain.
	#[error("Signature mismatch: expected {expected}, recovered {recovered}")]
	SignatureMismatch { expected: Address, recovered: Address },
	/// A partial shortcut asked to move more than the signed value.
	#[error("Requested {requested} exceeds authorized value {authorized}")]
	InsufficientRequestedAllowance { requested: U256, authorized: U256 },
	#[error(transparent)]
	Ledger(#[from] LedgerError),
}
