//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable module (ledger, account) provides a Registry struct that
/// declares the name used in configuration and hands out its factory.
pub trait ImplementationRegistry {
	/// The key used in the TOML configuration, e.g. "memory" for
	/// `ledger.implementations.memory` or "local" for `account.implementations.local`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
