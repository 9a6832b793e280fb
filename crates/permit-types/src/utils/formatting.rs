//! String formatting utilities.
//!
//! Hex prefix stripping and shortened addresses for log output.

use alloy_primitives::Address;

/// Shortens an address for display, e.g. `0x5fbd..0aa3`.
pub fn short_address(address: &Address) -> String {
	let full = hex::encode(address.as_slice());
	format!("0x{}..{}", &full[..4], &full[full.len() - 4..])
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(without_0x_prefix("0Xabcd"), "abcd");
		assert_eq!(without_0x_prefix("abcd"), "abcd");
	}

	#[test]
	fn test_short_address() {
		let addr = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
		assert_eq!(short_address(&addr), "0x5fbd..0aa3");
	}
}
