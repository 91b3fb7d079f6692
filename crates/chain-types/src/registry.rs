//! Registry trait for self-registering client implementations.
//!
//! Every backend module exposes a `Registry` struct implementing this trait so
//! the client registry can map a configuration name to a constructor without
//! any reflection.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in currency configuration to reference this implementation,
	/// for example `memory` in `implementation = "memory"`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
