//! Utility functions shared across the permit engine.

pub mod eip712;
pub mod formatting;
pub mod helpers;

pub use eip712::{
	compute_domain_hash, compute_final_digest, Eip712AbiEncoder, DOMAIN_TYPE, PERMIT_TYPE,
	PERMIT_VERSION,
};
pub use formatting::{short_address, without_0x_prefix};
pub use helpers::current_timestamp;
