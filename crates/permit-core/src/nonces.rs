//! Per-holder replay counters.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;

/// Monotonic nonce per holder, implicitly zero for unseen holders.
///
/// Counters are 256-bit and wrap on overflow. Reaching 2^256 attempts for one
/// holder is not a realistic concern, so no saturation is attempted.
#[derive(Debug, Default)]
pub struct NonceLedger {
	counters: HashMap<Address, U256>,
}

impl NonceLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Nonce the next authorization from `holder` must be signed over.
	pub fn current(&self, holder: &Address) -> U256 {
		self.counters.get(holder).copied().unwrap_or(U256::ZERO)
	}

	/// Returns the current nonce and advances the counter by one.
	pub fn consume(&mut self, holder: Address) -> U256 {
		let counter = self.counters.entry(holder).or_default();
		let current = *counter;
		*counter = current.wrapping_add(U256::from(1u8));
		current
	}

	/// Puts a holder's counter back to `previous`.
	///
	/// Only used to undo a `consume` of the same call.
	pub(crate) fn restore(&mut self, holder: Address, previous: U256) {
		self.counters.insert(holder, previous);
	}
}
