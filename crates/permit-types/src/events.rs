//! Event types emitted by the token surface.
//!
//! Ledger primitives return the canonical events they emit. The engine keeps
//! them in a per-call journal and publishes them on the event bus only after
//! the call commits.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Canonical ERC-20 style change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum TokenEvent {
	/// Balance moved between accounts. Burns use the zero address as `to`.
	Transfer {
		from: Address,
		to: Address,
		value: U256,
	},
	/// Allowance of `spender` over `owner`'s balance changed to `value`.
	Approval {
		owner: Address,
		spender: Address,
		value: U256,
	},
}

impl TokenEvent {
	pub fn transfer(from: Address, to: Address, value: U256) -> Self {
		Self::Transfer { from, to, value }
	}

	pub fn approval(owner: Address, spender: Address, value: U256) -> Self {
		Self::Approval {
			owner,
			spender,
			value,
		}
	}

	/// Event name as it appears in logs.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Transfer { .. } => "Transfer",
			Self::Approval { .. } => "Approval",
		}
	}
}
