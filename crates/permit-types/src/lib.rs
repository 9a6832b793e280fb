//! Common types for the permit engine.
//!
//! Shared data types used by the ledger, signing, configuration and engine
//! crates: permit messages and signatures, token events, EIP-712 helpers and
//! the configuration validation framework.

/// Token change notifications.
pub mod events;
/// Permit messages, signatures and call requests.
pub mod permit;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Redacting string type for signing keys.
pub mod secret_string;
/// EIP-712 encoding, formatting and time helpers.
pub mod utils;
/// Configuration validation schemas.
pub mod validation;

pub use alloy_primitives::{Address, B256, U256};
pub use events::TokenEvent;
pub use permit::{
	CallContext, Permit, PermitRequest, PermitSignature, ReceiveWithPermitRequest,
	SignatureFormatError, TransferFromWithPermitRequest,
};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use utils::{current_timestamp, short_address, without_0x_prefix};
pub use validation::{ConfigSchema, Field, FieldType, FieldValidator, Schema, ValidationError};
