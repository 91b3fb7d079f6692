//! Client registry for the chain gateway.
//!
//! The registry holds two tables: implementation name -> factory, filled by
//! explicit registration at startup, and currency code -> `CurrencyConfig`,
//! replaced wholesale by `init`. `create` resolves a currency code to a fresh
//! client typed as `ChainClientInterface`.
//!
//! The registry is a plain value rather than process-wide state. `init` takes
//! `&mut self`, so configuration cannot change while clients are being
//! created from a shared reference.

use chain_client::{ChainClientInterface, ClientError, ClientFactory};
use chain_config::{Config, ConfigError};
use chain_types::{ArgsError, CurrencyConfig};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while building a client.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// The currency has no configuration, or its entry is empty.
	#[error("Cannot find configuration for currency: {0}")]
	ConfigurationNotFound(String),
	/// The configured implementation was never registered.
	#[error("Unknown client implementation '{name}'. Available: [{available}]")]
	UnknownImplementation { name: String, available: String },
	/// Deferred constructor arguments could not be produced.
	#[error("Arguments for currency {currency}: {source}")]
	Arguments {
		currency: String,
		#[source]
		source: ArgsError,
	},
	/// The implementation refused its constructor arguments.
	#[error("Failed to construct client for currency {currency}: {source}")]
	Client {
		currency: String,
		#[source]
		source: ClientError,
	},
	/// Loading the configuration failed.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Registry of client factories and currency configuration.
pub struct ClientRegistry {
	factories: HashMap<String, ClientFactory>,
	currencies: HashMap<String, CurrencyConfig>,
}

impl ClientRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			factories: HashMap::new(),
			currencies: HashMap::new(),
		}
	}

	/// Creates a registry with every implementation shipped in `chain-client`.
	pub fn with_default_implementations() -> Self {
		let mut registry = Self::new();

		for (name, factory) in chain_client::get_all_implementations() {
			registry.register(name, factory);
		}

		registry
	}

	/// Creates a registry with the default implementations and the currencies
	/// of `config`.
	pub fn from_config(config: Config) -> Result<Self, RegistryError> {
		let mut registry = Self::with_default_implementations();
		registry.init(config.into_currency_map()?);
		Ok(registry)
	}

	/// Register a client implementation under `name`.
	///
	/// Registering a name twice replaces the earlier factory.
	pub fn register(&mut self, name: impl Into<String>, factory: ClientFactory) {
		let name = name.into();
		tracing::debug!("Registering client implementation: {}", name);
		self.factories.insert(name, factory);
	}

	/// Replaces the whole currency configuration.
	///
	/// Entries from a previous call are discarded, not merged.
	pub fn init(&mut self, currencies: HashMap<String, CurrencyConfig>) {
		tracing::debug!("Initialized {} currencies", currencies.len());
		self.currencies = currencies;
	}

	/// Creates a new client for `currency`.
	///
	/// Deferred arguments are produced exactly once per call. Nothing is
	/// cached, so every call returns an independent client.
	pub fn create(&self, currency: &str) -> Result<Box<dyn ChainClientInterface>, RegistryError> {
		let config = self
			.currencies
			.get(currency)
			.filter(|config| !config.is_empty())
			.ok_or_else(|| RegistryError::ConfigurationNotFound(currency.to_string()))?;

		let factory = self.factories.get(&config.implementation).ok_or_else(|| {
			RegistryError::UnknownImplementation {
				name: config.implementation.clone(),
				available: self.implementations().join(", "),
			}
		})?;

		let args = config
			.args
			.resolve()
			.map_err(|source| RegistryError::Arguments {
				currency: currency.to_string(),
				source,
			})?;

		tracing::debug!(
			currency,
			implementation = %config.implementation,
			args = args.len(),
			"Creating client"
		);

		factory(&args).map_err(|source| RegistryError::Client {
			currency: currency.to_string(),
			source,
		})
	}

	/// Decimal places of `currency`, if configured.
	pub fn fraction(&self, currency: &str) -> Option<u32> {
		self.currencies.get(currency).and_then(|config| config.fraction)
	}

	/// Configured currency codes, sorted.
	pub fn currencies(&self) -> Vec<&str> {
		let mut codes: Vec<&str> = self.currencies.keys().map(String::as_str).collect();
		codes.sort_unstable();
		codes
	}

	/// Registered implementation names, sorted.
	pub fn implementations(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}
}

impl Default for ClientRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use chain_client::implementations::memory::MemoryClient;
	use chain_types::{
		AddressKeyPair, Amount, Block, ClientArgs, ConfigSchema, Schema, SecretString, SignedTx,
		Transaction, TxInput, TxOutput, ValidationError,
	};
	use std::collections::BTreeMap;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	/// Client that reports the `network` argument it was built with as its
	/// generated address.
	struct NetworkEchoClient {
		network: String,
	}

	struct AnySchema;

	impl ConfigSchema for AnySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	fn unsupported() -> ClientError {
		ClientError::new("echo", "unsupported")
	}

	#[async_trait]
	impl ChainClientInterface for NetworkEchoClient {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(AnySchema)
		}

		async fn generate_address(&self) -> Result<AddressKeyPair, ClientError> {
			Ok(AddressKeyPair {
				address: self.network.clone(),
				public: String::new(),
				secret: BTreeMap::new(),
			})
		}

		async fn get_address_balance(&self, _address: &str) -> Result<Amount, ClientError> {
			Err(unsupported())
		}

		async fn get_address_txs(
			&self,
			_address: &str,
			_limit: usize,
			_since_ts: u64,
		) -> Result<Vec<Transaction>, ClientError> {
			Err(unsupported())
		}

		fn is_address_valid(&self, _address: &str) -> bool {
			false
		}

		async fn get_network_fee(&self) -> Result<Amount, ClientError> {
			Err(unsupported())
		}

		async fn get_block_number(&self) -> Result<u64, ClientError> {
			Err(unsupported())
		}

		async fn get_block(&self, _block: u64, _expand: bool) -> Result<Block, ClientError> {
			Err(unsupported())
		}

		async fn get_total_supply(&self) -> Result<Amount, ClientError> {
			Err(unsupported())
		}

		async fn get_tx(&self, _hash: &str) -> Result<Transaction, ClientError> {
			Err(unsupported())
		}

		async fn sign_tx(
			&self,
			_inputs: &[TxInput],
			_outputs: &[TxOutput],
			_fee: &Amount,
		) -> Result<SignedTx, ClientError> {
			Err(unsupported())
		}

		async fn submit_tx(&self, _tx: &SignedTx) -> Result<String, ClientError> {
			Err(unsupported())
		}

		fn has_multiple_outputs(&self) -> bool {
			false
		}
	}

	fn create_echo_client(
		args: &[toml::Value],
	) -> Result<Box<dyn ChainClientInterface>, ClientError> {
		let network = args
			.first()
			.and_then(|arg| arg.get("network"))
			.and_then(|network| network.as_str())
			.ok_or_else(|| ClientError::new("echo", "missing_network"))?;

		Ok(Box::new(NetworkEchoClient {
			network: network.to_string(),
		}))
	}

	fn network_arg(network: &str) -> toml::Value {
		let mut table = toml::map::Map::new();
		table.insert("network".to_string(), toml::Value::String(network.to_string()));
		toml::Value::Table(table)
	}

	fn registry_with(currencies: Vec<(&str, CurrencyConfig)>) -> ClientRegistry {
		let mut registry = ClientRegistry::with_default_implementations();
		registry.register("btc_client", create_echo_client);
		registry.init(
			currencies
				.into_iter()
				.map(|(code, config)| (code.to_string(), config))
				.collect(),
		);
		registry
	}

	#[tokio::test]
	async fn test_create_passes_eager_args() {
		let registry = registry_with(vec![(
			"BTC",
			CurrencyConfig::new("btc_client", ClientArgs::Eager(vec![network_arg("mainnet")])),
		)]);

		let client = registry.create("BTC").unwrap();
		assert_eq!(client.generate_address().await.unwrap().address, "mainnet");
	}

	#[test]
	fn test_unregistered_currency_fails() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let registry = registry_with(vec![(
			"BTC",
			CurrencyConfig::new(
				"btc_client",
				ClientArgs::deferred(move || {
					counter.fetch_add(1, Ordering::SeqCst);
					Ok(vec![network_arg("mainnet")])
				}),
			),
		)]);

		let err = registry.create("DOGE").err().unwrap();
		assert!(matches!(&err, RegistryError::ConfigurationNotFound(code) if code == "DOGE"));
		assert_eq!(err.to_string(), "Cannot find configuration for currency: DOGE");
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn test_empty_entry_is_not_found() {
		let registry = registry_with(vec![("BTC", CurrencyConfig::new("", ClientArgs::default()))]);

		assert!(matches!(
			registry.create("BTC"),
			Err(RegistryError::ConfigurationNotFound(code)) if code == "BTC"
		));
	}

	#[test]
	fn test_create_before_init_fails() {
		let registry = ClientRegistry::with_default_implementations();
		assert!(matches!(
			registry.create("BTC"),
			Err(RegistryError::ConfigurationNotFound(_))
		));
	}

	#[tokio::test]
	async fn test_deferred_producer_runs_once_per_create() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let registry = registry_with(vec![(
			"BTC",
			CurrencyConfig::new(
				"btc_client",
				ClientArgs::deferred(move || {
					let n = counter.fetch_add(1, Ordering::SeqCst);
					Ok(vec![network_arg(&format!("net-{}", n))])
				}),
			),
		)]);

		let first = registry.create("BTC").unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		let second = registry.create("BTC").unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 2);

		// Each client saw its own evaluation
		assert_eq!(first.generate_address().await.unwrap().address, "net-0");
		assert_eq!(second.generate_address().await.unwrap().address, "net-1");
	}

	#[test]
	fn test_deferred_producer_error() {
		let registry = registry_with(vec![(
			"BTC",
			CurrencyConfig::new(
				"btc_client",
				ClientArgs::deferred(|| Err(ArgsError::Resolution("vault sealed".into()))),
			),
		)]);

		assert!(matches!(
			registry.create("BTC"),
			Err(RegistryError::Arguments { currency, .. }) if currency == "BTC"
		));
	}

	#[test]
	fn test_unknown_implementation_lists_available() {
		let registry = registry_with(vec![(
			"BTC",
			CurrencyConfig::new("BtcClient", ClientArgs::default()),
		)]);

		let err = registry.create("BTC").err().unwrap();
		assert!(matches!(&err, RegistryError::UnknownImplementation { name, .. } if name == "BtcClient"));
		assert!(err.to_string().contains("btc_client, memory"));
	}

	#[test]
	fn test_factory_error_is_surfaced() {
		let registry = registry_with(vec![(
			"BTC",
			CurrencyConfig::new("btc_client", ClientArgs::Eager(vec![])),
		)]);

		match registry.create("BTC") {
			Err(RegistryError::Client { source, .. }) => {
				assert_eq!(source.tag(), "e_echo_missing_network")
			},
			_ => panic!("expected client construction error"),
		}
	}

	#[test]
	fn test_init_replaces_previous_configuration() {
		let mut registry = registry_with(vec![(
			"BTC",
			CurrencyConfig::new("memory", ClientArgs::default()).with_fraction(8),
		)]);
		assert!(registry.create("BTC").is_ok());
		assert_eq!(registry.fraction("BTC"), Some(8));

		let mut next = HashMap::new();
		next.insert(
			"ETH".to_string(),
			CurrencyConfig::new("memory", ClientArgs::default()).with_fraction(18),
		);
		registry.init(next);

		assert!(matches!(
			registry.create("BTC"),
			Err(RegistryError::ConfigurationNotFound(_))
		));
		assert!(registry.create("ETH").is_ok());
		assert_eq!(registry.currencies(), vec!["ETH"]);
		assert_eq!(registry.fraction("BTC"), None);
	}

	#[tokio::test]
	async fn test_clients_are_independent() {
		let alice = MemoryClient::address_for_secret("mem", "alice-secret");
		let bob = MemoryClient::address_for_secret("mem", "bob-secret");
		let args: toml::Value =
			toml::from_str(&format!("[genesis]\n{} = \"1000\"\n", alice)).unwrap();
		let registry = registry_with(vec![(
			"MEM",
			CurrencyConfig::new("memory", ClientArgs::Eager(vec![args])),
		)]);

		let first = registry.create("MEM").unwrap();
		let second = registry.create("MEM").unwrap();

		let inputs = vec![TxInput {
			address: alice.clone(),
			value: Amount::from(110u64),
			secret: vec![SecretString::from("alice-secret")],
		}];
		let outputs = vec![TxOutput {
			address: bob.clone(),
			value: Amount::from(100u64),
		}];
		first
			.send(&inputs, &outputs, &Amount::from(10u64))
			.await
			.unwrap();

		assert_eq!(first.get_block_number().await.unwrap(), 2);
		assert_eq!(
			first.get_address_balance(&bob).await.unwrap(),
			Amount::from(100u64)
		);

		assert_eq!(second.get_block_number().await.unwrap(), 1);
		assert_eq!(
			second.get_address_balance(&alice).await.unwrap(),
			Amount::from(1000u64)
		);
		assert_eq!(second.get_address_balance(&bob).await.unwrap(), Amount::zero());
		assert_eq!(
			second.get_total_supply().await.unwrap(),
			Amount::from(1000u64)
		);
	}

	#[tokio::test]
	async fn test_from_config_end_to_end() {
		std::env::set_var("TEST_REGISTRY_LTC_FEE", "777");
		let config: Config = r#"
[currencies.LTC]
implementation = "memory"
fraction = 8
deferred = true
args = [{ namespace = "ltc", fee = "${TEST_REGISTRY_LTC_FEE}" }]
"#
		.parse()
		.unwrap();

		let registry = ClientRegistry::from_config(config).unwrap();
		let client = registry.create("LTC").unwrap();
		std::env::remove_var("TEST_REGISTRY_LTC_FEE");

		assert_eq!(client.get_network_fee().await.unwrap(), Amount::from(777u64));
		assert_eq!(registry.fraction("LTC"), Some(8));

		// The variable is read again on the next creation
		assert!(matches!(
			registry.create("LTC"),
			Err(RegistryError::Arguments { .. })
		));
	}
}
