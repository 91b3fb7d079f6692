//! Currency configuration consumed by the client registry.
//!
//! A currency code maps to the name of a registered client implementation,
//! the positional arguments handed to its factory and an optional
//! decimal-places hint. Arguments are either known up front or produced on
//! demand, which lets secrets be read only when a client is actually built.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while producing deferred constructor arguments.
#[derive(Debug, Clone, Error)]
pub enum ArgsError {
	/// A placeholder or external source could not be resolved.
	#[error("Failed to resolve arguments: {0}")]
	Resolution(String),
	/// The produced arguments are malformed.
	#[error("Failed to parse arguments: {0}")]
	Parse(String),
}

/// Zero-argument producer of constructor arguments.
pub type ArgsProducer = Arc<dyn Fn() -> Result<Vec<toml::Value>, ArgsError> + Send + Sync>;

/// Constructor arguments of a client implementation.
#[derive(Clone)]
pub enum ClientArgs {
	/// Arguments known at configuration time, passed unchanged.
	Eager(Vec<toml::Value>),
	/// Arguments produced when the client is created, once per creation.
	Deferred(ArgsProducer),
}

impl ClientArgs {
	/// Wraps a closure as deferred arguments.
	pub fn deferred<F>(producer: F) -> Self
	where
		F: Fn() -> Result<Vec<toml::Value>, ArgsError> + Send + Sync + 'static,
	{
		Self::Deferred(Arc::new(producer))
	}

	/// Evaluates the arguments.
	///
	/// Deferred producers run on every call; nothing is cached.
	pub fn resolve(&self) -> Result<Vec<toml::Value>, ArgsError> {
		match self {
			Self::Eager(args) => Ok(args.clone()),
			Self::Deferred(producer) => producer(),
		}
	}

	pub fn is_deferred(&self) -> bool {
		matches!(self, Self::Deferred(_))
	}
}

impl Default for ClientArgs {
	fn default() -> Self {
		Self::Eager(Vec::new())
	}
}

impl fmt::Debug for ClientArgs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Eager(args) => f.debug_tuple("Eager").field(args).finish(),
			Self::Deferred(_) => f.write_str("Deferred(<producer>)"),
		}
	}
}

/// Configuration entry for one currency code.
#[derive(Debug, Clone)]
pub struct CurrencyConfig {
	/// Name of the registered client implementation.
	pub implementation: String,
	/// Positional constructor arguments.
	pub args: ClientArgs,
	/// Number of decimal places between minor and major units.
	pub fraction: Option<u32>,
}

impl CurrencyConfig {
	pub fn new(implementation: impl Into<String>, args: ClientArgs) -> Self {
		Self {
			implementation: implementation.into(),
			args,
			fraction: None,
		}
	}

	/// Sets the decimal-places hint.
	pub fn with_fraction(mut self, fraction: u32) -> Self {
		self.fraction = Some(fraction);
		self
	}

	/// Returns true when the entry names no implementation.
	pub fn is_empty(&self) -> bool {
		self.implementation.trim().is_empty()
	}
}
