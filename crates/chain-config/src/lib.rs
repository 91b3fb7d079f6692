//! Configuration module for the chain gateway.
//!
//! This module loads the currency table that drives the client registry from
//! TOML. Each currency names a client implementation, its positional
//! constructor arguments and an optional decimal-places hint:
//!
//! ```toml
//! [currencies.BTC]
//! implementation = "memory"
//! fraction = 8
//! args = [{ namespace = "btc", fee = "${BTC_FEE:-1000}" }]
//! ```
//!
//! String arguments may reference environment variables as `${VAR}` or
//! `${VAR:-default}`. Placeholders are resolved when the configuration is
//! loaded, unless the currency sets `deferred = true`; then they are resolved
//! each time a client for that currency is created, so secrets are read only
//! when actually needed.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files with
//! `include = ["btc.toml", "eth.toml"]`. A currency code may be defined in
//! only one file.

mod loader;

use chain_types::{ArgsError, ClientArgs, CurrencyConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Largest accepted `fraction`; no chain in use goes beyond this.
const MAX_FRACTION: u32 = 36;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Top-level configuration: the currencies the gateway supports.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Map of currency codes to their client configuration.
	pub currencies: HashMap<String, CurrencySection>,
}

/// Configuration of a single currency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrencySection {
	/// Name of the registered client implementation, e.g. `memory`.
	pub implementation: String,
	/// Positional constructor arguments.
	#[serde(default)]
	pub args: Vec<toml::Value>,
	/// Decimal places between minor and major units.
	pub fraction: Option<u32>,
	/// Resolve environment placeholders at client creation instead of at load.
	#[serde(default)]
	pub deferred: bool,
}

impl CurrencySection {
	/// Converts the section into a registry entry.
	///
	/// Eager sections resolve their placeholders now. Deferred sections keep
	/// the raw arguments and resolve them inside the producer on every call.
	pub fn to_currency_config(&self) -> Result<CurrencyConfig, ConfigError> {
		let args = if self.deferred {
			let raw = self.args.clone();
			let implementation = self.implementation.clone();
			ClientArgs::deferred(move || {
				tracing::trace!("Resolving deferred arguments for {}", implementation);
				raw.iter()
					.map(resolve_value)
					.collect::<Result<Vec<_>, _>>()
					.map_err(|e| ArgsError::Resolution(e.to_string()))
			})
		} else {
			ClientArgs::Eager(
				self.args
					.iter()
					.map(resolve_value)
					.collect::<Result<Vec<_>, _>>()?,
			)
		};

		Ok(CurrencyConfig {
			implementation: self.implementation.clone(),
			args,
			fraction: self.fraction,
		})
	}
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration value too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

/// Resolves environment placeholders in every string inside `value`.
///
/// Substituted text never changes the value's type: a placeholder inside a
/// string yields a string.
pub fn resolve_value(value: &toml::Value) -> Result<toml::Value, ConfigError> {
	Ok(match value {
		toml::Value::String(s) => toml::Value::String(resolve_env_vars(s)?),
		toml::Value::Array(items) => toml::Value::Array(
			items
				.iter()
				.map(resolve_value)
				.collect::<Result<Vec<_>, _>>()?,
		),
		toml::Value::Table(table) => {
			let mut resolved = toml::map::Map::new();
			for (key, item) in table {
				resolved.insert(key.clone(), resolve_value(item)?);
			}
			toml::Value::Table(resolved)
		},
		other => other.clone(),
	})
}

impl Config {
	/// Loads configuration from a file, following include directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// - At least one currency must be configured
	/// - Currency codes must be non-empty and contain no whitespace
	/// - Every currency must name an implementation
	/// - `fraction` cannot exceed 36
	fn validate(&self) -> Result<(), ConfigError> {
		if self.currencies.is_empty() {
			return Err(ConfigError::Validation(
				"At least one currency must be configured".into(),
			));
		}

		for (code, currency) in &self.currencies {
			if code.is_empty() || code.chars().any(char::is_whitespace) {
				return Err(ConfigError::Validation(format!(
					"Invalid currency code '{}'",
					code
				)));
			}
			if currency.implementation.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Currency {} must name an implementation",
					code
				)));
			}
			if let Some(fraction) = currency.fraction {
				if fraction > MAX_FRACTION {
					return Err(ConfigError::Validation(format!(
						"Currency {} fraction {} exceeds {}",
						code, fraction, MAX_FRACTION
					)));
				}
			}
		}

		Ok(())
	}

	/// Builds the registry's currency map.
	pub fn into_currency_map(self) -> Result<HashMap<String, CurrencyConfig>, ConfigError> {
		self.currencies
			.into_iter()
			.map(|(code, section)| Ok((code, section.to_currency_config()?)))
			.collect()
	}
}

/// Parses and validates a configuration document.
///
/// Placeholders are left untouched here; they are resolved per currency by
/// `CurrencySection::to_currency_config`.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let config: Config = toml::from_str(s)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_RPC_HOST", "localhost");
		std::env::set_var("TEST_RPC_PORT", "8332");

		let result = resolve_env_vars("http://${TEST_RPC_HOST}:${TEST_RPC_PORT}").unwrap();
		assert_eq!(result, "http://localhost:8332");

		std::env::remove_var("TEST_RPC_HOST");
		std::env::remove_var("TEST_RPC_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let result = resolve_env_vars("${MISSING_FEE_VAR:-1000}").unwrap();
		assert_eq!(result, "1000");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("${MISSING_KEY_VAR}");
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_KEY_VAR"));
	}

	#[test]
	fn test_parse_currencies() {
		let config: Config = r#"
[currencies.BTC]
implementation = "memory"
fraction = 8
args = [{ namespace = "btc", fee = "1000" }]

[currencies.ETH]
implementation = "memory"
"#
		.parse()
		.unwrap();

		assert_eq!(config.currencies.len(), 2);
		let btc = &config.currencies["BTC"];
		assert_eq!(btc.fraction, Some(8));
		assert!(!btc.deferred);
		assert_eq!(btc.args.len(), 1);
		assert!(config.currencies["ETH"].args.is_empty());
	}

	#[test]
	fn test_validation_rejects_bad_entries() {
		assert!("currencies = {}".parse::<Config>().is_err());

		let empty_impl = r#"
[currencies.BTC]
implementation = ""
"#;
		assert!(matches!(
			empty_impl.parse::<Config>(),
			Err(ConfigError::Validation(_))
		));

		let too_precise = r#"
[currencies.BTC]
implementation = "memory"
fraction = 40
"#;
		assert!(matches!(
			too_precise.parse::<Config>(),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_eager_args_resolve_at_conversion() {
		std::env::set_var("TEST_EAGER_FEE", "2500");
		let config: Config = r#"
[currencies.LTC]
implementation = "memory"
args = [{ fee = "${TEST_EAGER_FEE}", nested = ["${TEST_EAGER_FEE}", 3] }]
"#
		.parse()
		.unwrap();

		let currency = config.currencies["LTC"].to_currency_config().unwrap();
		std::env::remove_var("TEST_EAGER_FEE");

		// Already resolved, later env changes do not matter
		assert!(!currency.args.is_deferred());
		let args = currency.args.resolve().unwrap();
		assert_eq!(args[0]["fee"].as_str(), Some("2500"));
		assert_eq!(args[0]["nested"][0].as_str(), Some("2500"));
		assert_eq!(args[0]["nested"][1].as_integer(), Some(3));
	}

	#[test]
	fn test_deferred_args_resolve_on_each_call() {
		let config: Config = r#"
[currencies.XRP]
implementation = "memory"
deferred = true
args = [{ namespace = "${TEST_DEFERRED_NS}" }]
"#
		.parse()
		.unwrap();

		// Missing at load time is fine for deferred entries
		let currency = config.currencies["XRP"].to_currency_config().unwrap();
		assert!(currency.args.is_deferred());
		assert!(matches!(
			currency.args.resolve(),
			Err(ArgsError::Resolution(_))
		));

		std::env::set_var("TEST_DEFERRED_NS", "xrp");
		let args = currency.args.resolve().unwrap();
		assert_eq!(args[0]["namespace"].as_str(), Some("xrp"));

		std::env::set_var("TEST_DEFERRED_NS", "xrpl");
		let args = currency.args.resolve().unwrap();
		assert_eq!(args[0]["namespace"].as_str(), Some("xrpl"));
		std::env::remove_var("TEST_DEFERRED_NS");
	}

	#[test]
	fn test_eager_missing_env_var_fails_conversion() {
		let config: Config = r#"
[currencies.DOT]
implementation = "memory"
args = ["${TEST_NEVER_SET_VAR}"]
"#
		.parse()
		.unwrap();

		assert!(config.into_currency_map().is_err());
	}
}
