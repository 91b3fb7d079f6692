//! In-memory ledger client for development and testing.
//!
//! This implementation keeps a complete account-based ledger in memory:
//! genesis allocations, one block per submitted transaction, balances, and
//! per-address history. Key material is derived by hashing, not by real
//! elliptic-curve cryptography, so it must never guard real funds.
//!
//! Each client instance owns its own ledger; two clients built from the same
//! configuration do not share state.
//!
//! `sign_tx` seals the transfer with a key private to the client instance and
//! `submit_tx` only accepts payloads carrying a valid seal. Submission checks
//! the transfer again before touching balances.

use crate::{ChainClientInterface, ChainClientRegistry, ClientError, ClientFactory};
use async_trait::async_trait;
use chain_types::{
	current_timestamp, utils::truncate_id, AddressKeyPair, Amount, Block, BlockTransactions,
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString, SignedTx,
	Transaction, TransferOutput, TxInput, TxOutput, ValidationError,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Length in hex characters of the address body after the namespace prefix.
const ADDRESS_BODY_LEN: usize = 40;

/// Configuration for the memory client, taken from its first constructor argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryClientConfig {
	/// Prefix of addresses and error tags.
	#[serde(default = "default_namespace")]
	pub namespace: String,
	/// Network fee reported by `get_network_fee`.
	#[serde(default = "default_fee")]
	pub fee: Amount,
	/// Irreversibility threshold reported by `get_confirmations`.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Whether transfers may have several inputs and outputs.
	#[serde(default = "default_multiple_outputs")]
	pub multiple_outputs: bool,
	/// Initial balances (address -> minor units) minted in block 1.
	#[serde(default)]
	pub genesis: BTreeMap<String, Amount>,
}

fn default_namespace() -> String {
	"mem".to_string()
}

fn default_fee() -> Amount {
	Amount::from(1000u64)
}

fn default_confirmations() -> u64 {
	crate::DEFAULT_CONFIRMATIONS
}

fn default_multiple_outputs() -> bool {
	true
}

impl Default for MemoryClientConfig {
	fn default() -> Self {
		Self {
			namespace: default_namespace(),
			fee: default_fee(),
			confirmations: default_confirmations(),
			multiple_outputs: default_multiple_outputs(),
			genesis: BTreeMap::new(),
		}
	}
}

/// Transfer body covered by the seal.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTransfer {
	inputs: Vec<TransferOutput>,
	outputs: Vec<TransferOutput>,
	fee: Amount,
	nonce: String,
}

/// Payload carried in `SignedTx::raw` as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedTransfer {
	transfer: RawTransfer,
	/// keccak(seal key ‖ transfer JSON)
	seal: String,
}

/// A transaction as stored in the ledger, independent of any address view.
#[derive(Debug, Clone)]
struct StoredTx {
	hash: String,
	block: u64,
	time: u64,
	inputs: Vec<TransferOutput>,
	outputs: Vec<TransferOutput>,
	fee: Amount,
}

#[derive(Debug, Clone)]
struct MinedBlock {
	hash: String,
	number: u64,
	time: u64,
	total_supply: Amount,
	txs: Vec<String>,
}

#[derive(Debug, Default)]
struct Ledger {
	balances: HashMap<String, Amount>,
	/// Block `n` lives at index `n - 1`.
	blocks: Vec<MinedBlock>,
	txs: HashMap<String, StoredTx>,
	total_supply: Amount,
}

impl Ledger {
	fn tip(&self) -> u64 {
		self.blocks.len() as u64
	}

	fn confirmations(&self, block: u64) -> u64 {
		if block == 0 {
			0
		} else {
			self.tip().saturating_sub(block)
		}
	}

	/// Appends a block holding a single transaction.
	fn mine(&mut self, mut tx: StoredTx) -> u64 {
		let number = self.tip() + 1;
		let prev_hash = self
			.blocks
			.last()
			.map(|b| b.hash.clone())
			.unwrap_or_default();
		let time = self
			.blocks
			.last()
			.map(|b| b.time.max(tx.time))
			.unwrap_or(tx.time);

		tx.block = number;
		tx.time = time;
		self.blocks.push(MinedBlock {
			hash: keccak_hex(format!("{}:{}:{}", prev_hash, number, tx.hash).as_bytes()),
			number,
			time,
			total_supply: self.total_supply.clone(),
			txs: vec![tx.hash.clone()],
		});
		self.txs.insert(tx.hash.clone(), tx);
		number
	}

	/// Renders a stored transaction, optionally from the point of view of `account`.
	fn view(&self, tx: &StoredTx, account: Option<&str>) -> Transaction {
		let balance = account.map(|address| {
			let received: Amount = tx
				.outputs
				.iter()
				.filter(|o| o.address == address)
				.map(|o| &o.value)
				.sum();
			let spent: Amount = tx
				.inputs
				.iter()
				.filter(|i| i.address == address)
				.map(|i| &i.value)
				.sum();
			received - spent
		});

		Transaction {
			block: tx.block,
			hash: tx.hash.clone(),
			value: tx.outputs.iter().map(|o| &o.value).sum(),
			account: account.map(str::to_string),
			balance,
			confirmations: self.confirmations(tx.block),
			from: tx.inputs.iter().map(|i| i.address.clone()).collect(),
			to: tx.outputs.clone(),
			fee: tx.fee.clone(),
		}
	}
}

/// In-memory client implementation.
pub struct MemoryClient {
	config: MemoryClientConfig,
	ledger: RwLock<Ledger>,
	seal_key: SecretString,
}

impl MemoryClient {
	/// Creates a client and mints the genesis allocations in block 1.
	pub fn new(config: MemoryClientConfig) -> Self {
		let mut ledger = Ledger::default();

		if !config.genesis.is_empty() {
			let outputs: Vec<TransferOutput> = config
				.genesis
				.iter()
				.map(|(address, value)| TransferOutput {
					address: address.clone(),
					value: value.clone(),
				})
				.collect();
			for output in &outputs {
				let balance = ledger.balances.entry(output.address.clone()).or_default();
				*balance = &*balance + &output.value;
			}
			ledger.total_supply = outputs.iter().map(|o| &o.value).sum();
			let hash = keccak_hex(format!("genesis:{}", config.namespace).as_bytes());
			ledger.mine(StoredTx {
				hash,
				block: 0,
				time: current_timestamp(),
				inputs: Vec::new(),
				outputs,
				fee: Amount::zero(),
			});
		}

		Self {
			config,
			ledger: RwLock::new(ledger),
			seal_key: SecretString::new(random_hex()),
		}
	}

	/// Derives the address controlled by `secret` in `namespace`.
	pub fn address_for_secret(namespace: &str, secret: &str) -> String {
		let public = Keccak256::digest(secret.as_bytes());
		let body = hex::encode(Keccak256::digest(public));
		format!("{}{}", namespace, &body[..ADDRESS_BODY_LEN])
	}

	fn error(&self, reason: &str) -> ClientError {
		ClientError::new(&self.config.namespace, reason)
	}

	/// Checks the shape and arithmetic of a transfer, without authorization.
	fn check_transfer(
		&self,
		inputs: &[TransferOutput],
		outputs: &[TransferOutput],
		fee: &Amount,
	) -> Result<(), ClientError> {
		if inputs.is_empty() {
			return Err(self.error("no_inputs"));
		}
		if outputs.is_empty() {
			return Err(self.error("no_outputs"));
		}
		if !self.config.multiple_outputs && (inputs.len() > 1 || outputs.len() > 1) {
			return Err(self.error("multiple_outputs_unsupported"));
		}
		if fee.is_negative() {
			return Err(self.error("invalid_fee"));
		}

		for output in outputs {
			if !self.is_address_valid(&output.address) || !output.value.is_positive() {
				return Err(self.error("invalid_output"));
			}
		}
		for input in inputs {
			if !self.is_address_valid(&input.address) || !input.value.is_positive() {
				return Err(self.error("invalid_input"));
			}
		}

		let total_in: Amount = inputs.iter().map(|i| &i.value).sum();
		let total_out: Amount = outputs.iter().map(|o| &o.value).sum();
		if total_in != &total_out + fee {
			return Err(self.error("unbalanced"));
		}

		Ok(())
	}

	fn seal(&self, body: &str) -> String {
		self.seal_key
			.with_exposed(|key| keccak_hex(format!("{}{}", key, body).as_bytes()))
	}

	fn encode(&self, transfer: RawTransfer) -> Result<SignedTx, ClientError> {
		let body =
			serde_json::to_string(&transfer).map_err(|_| self.error("encoding_failed"))?;
		let sealed = SealedTransfer {
			seal: self.seal(&body),
			transfer,
		};
		let raw = serde_json::to_string(&sealed).map_err(|_| self.error("encoding_failed"))?;
		let hash = keccak_hex(raw.as_bytes());
		Ok(SignedTx { raw, hash })
	}

	fn decode(&self, tx: &SignedTx) -> Result<RawTransfer, ClientError> {
		let sealed: SealedTransfer =
			serde_json::from_str(&tx.raw).map_err(|_| self.error("malformed_tx"))?;
		if keccak_hex(tx.raw.as_bytes()) != tx.hash {
			return Err(self.error("hash_mismatch"));
		}

		let body =
			serde_json::to_string(&sealed.transfer).map_err(|_| self.error("malformed_tx"))?;
		if self.seal(&body) != sealed.seal {
			return Err(self.error("invalid_signature"));
		}

		let transfer = sealed.transfer;
		self.check_transfer(&transfer.inputs, &transfer.outputs, &transfer.fee)?;
		Ok(transfer)
	}
}

fn keccak_hex(data: &[u8]) -> String {
	hex::encode(Keccak256::digest(data))
}

/// 64 hex characters of uuid v4 entropy.
fn random_hex() -> String {
	let entropy = [
		uuid::Uuid::new_v4().as_bytes().to_vec(),
		uuid::Uuid::new_v4().as_bytes().to_vec(),
	]
	.concat();
	hex::encode(entropy)
}

#[async_trait]
impl ChainClientInterface for MemoryClient {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryClientSchema)
	}

	async fn generate_address(&self) -> Result<AddressKeyPair, ClientError> {
		let secret = random_hex();
		let public = hex::encode(Keccak256::digest(secret.as_bytes()));
		let address = Self::address_for_secret(&self.config.namespace, &secret);

		let mut secrets = BTreeMap::new();
		secrets.insert("private".to_string(), SecretString::new(secret));

		Ok(AddressKeyPair {
			address,
			public,
			secret: secrets,
		})
	}

	async fn get_address_balance(&self, address: &str) -> Result<Amount, ClientError> {
		if !self.is_address_valid(address) {
			return Err(self.error("invalid_address"));
		}
		let ledger = self.ledger.read().await;
		Ok(ledger.balances.get(address).cloned().unwrap_or_default())
	}

	async fn get_address_txs(
		&self,
		address: &str,
		limit: usize,
		since_ts: u64,
	) -> Result<Vec<Transaction>, ClientError> {
		if !self.is_address_valid(address) {
			return Err(self.error("invalid_address"));
		}
		let ledger = self.ledger.read().await;

		// Newest first
		let txs = ledger
			.blocks
			.iter()
			.rev()
			.flat_map(|block| block.txs.iter())
			.filter_map(|hash| ledger.txs.get(hash))
			.filter(|tx| tx.time >= since_ts)
			.filter(|tx| {
				tx.inputs.iter().any(|i| i.address == address)
					|| tx.outputs.iter().any(|o| o.address == address)
			})
			.take(limit)
			.map(|tx| ledger.view(tx, Some(address)))
			.collect();

		Ok(txs)
	}

	fn is_address_valid(&self, address: &str) -> bool {
		address
			.strip_prefix(self.config.namespace.as_str())
			.is_some_and(|body| {
				body.len() == ADDRESS_BODY_LEN
					&& body
						.chars()
						.all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
			})
	}

	async fn get_network_fee(&self) -> Result<Amount, ClientError> {
		Ok(self.config.fee.clone())
	}

	async fn get_block_number(&self) -> Result<u64, ClientError> {
		Ok(self.ledger.read().await.tip())
	}

	async fn get_block(&self, block: u64, expand: bool) -> Result<Block, ClientError> {
		let ledger = self.ledger.read().await;
		let mined = block
			.checked_sub(1)
			.and_then(|index| ledger.blocks.get(index as usize))
			.ok_or_else(|| self.error("block_not_found"))?;

		let txs = if expand {
			BlockTransactions::Full(
				mined
					.txs
					.iter()
					.filter_map(|hash| ledger.txs.get(hash))
					.map(|tx| ledger.view(tx, None))
					.collect(),
			)
		} else {
			BlockTransactions::Hashes(mined.txs.clone())
		};

		Ok(Block {
			hash: mined.hash.clone(),
			number: mined.number,
			time: mined.time,
			confirmations: ledger.confirmations(mined.number),
			total_supply: Some(mined.total_supply.clone()),
			txs,
		})
	}

	async fn get_total_supply(&self) -> Result<Amount, ClientError> {
		Ok(self.ledger.read().await.total_supply.clone())
	}

	async fn get_tx(&self, hash: &str) -> Result<Transaction, ClientError> {
		let ledger = self.ledger.read().await;
		ledger
			.txs
			.get(hash)
			.map(|tx| ledger.view(tx, None))
			.ok_or_else(|| self.error("tx_not_found"))
	}

	async fn sign_tx(
		&self,
		inputs: &[TxInput],
		outputs: &[TxOutput],
		fee: &Amount,
	) -> Result<SignedTx, ClientError> {
		let spent: Vec<TransferOutput> = inputs
			.iter()
			.map(|i| TransferOutput {
				address: i.address.clone(),
				value: i.value.clone(),
			})
			.collect();
		let received: Vec<TransferOutput> =
			outputs.iter().cloned().map(TransferOutput::from).collect();
		self.check_transfer(&spent, &received, fee)?;

		for input in inputs {
			let controls_address = input.secret.first().is_some_and(|secret| {
				secret.with_exposed(|s| {
					Self::address_for_secret(&self.config.namespace, s) == input.address
				})
			});
			if !controls_address {
				return Err(self.error("invalid_secret"));
			}
		}

		let signed = self.encode(RawTransfer {
			inputs: spent,
			outputs: received,
			fee: fee.clone(),
			nonce: uuid::Uuid::new_v4().to_string(),
		})?;

		tracing::debug!(hash = %truncate_id(&signed.hash), "Signed transfer");
		Ok(signed)
	}

	async fn submit_tx(&self, tx: &SignedTx) -> Result<String, ClientError> {
		let transfer = self.decode(tx)?;
		let mut ledger = self.ledger.write().await;

		if ledger.txs.contains_key(&tx.hash) {
			return Err(self.error("duplicate_tx"));
		}

		let mut spending: HashMap<&str, Amount> = HashMap::new();
		for input in &transfer.inputs {
			let entry = spending.entry(input.address.as_str()).or_default();
			*entry = &*entry + &input.value;
		}
		for (address, amount) in &spending {
			let balance = ledger.balances.get(*address).cloned().unwrap_or_default();
			if &balance < amount {
				return Err(self.error("insufficient_balance"));
			}
		}

		for (address, amount) in spending {
			let balance = ledger.balances.entry(address.to_string()).or_default();
			*balance = &*balance - &amount;
		}
		for output in &transfer.outputs {
			let balance = ledger.balances.entry(output.address.clone()).or_default();
			*balance = &*balance + &output.value;
		}
		// Fees leave circulation
		ledger.total_supply = &ledger.total_supply - &transfer.fee;

		let number = ledger.mine(StoredTx {
			hash: tx.hash.clone(),
			block: 0,
			time: current_timestamp(),
			inputs: transfer.inputs,
			outputs: transfer.outputs,
			fee: transfer.fee,
		});

		tracing::info!(
			block = number,
			hash = %truncate_id(&tx.hash),
			"Mined block"
		);
		Ok(tx.hash.clone())
	}

	fn has_multiple_outputs(&self) -> bool {
		self.config.multiple_outputs
	}

	fn get_confirmations(&self) -> u64 {
		self.config.confirmations
	}
}

/// Configuration schema for MemoryClient.
pub struct MemoryClientSchema;

impl ConfigSchema for MemoryClientSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("namespace", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(ns)
							if !ns.is_empty()
								&& ns.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) =>
						{
							Ok(())
						},
						_ => Err("namespace must be non-empty lowercase alphanumerics".to_string()),
					}
				}),
				Field::new("fee", FieldType::Amount),
				Field::new(
					"confirmations",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("multiple_outputs", FieldType::Boolean),
				Field::new("genesis", FieldType::Table(Schema::new(vec![], vec![]))).with_validator(
					|value| {
						let table = value.as_table().ok_or("genesis must be a table")?;
						for (address, amount) in table {
							let valid = match amount {
								toml::Value::Integer(i) => *i >= 0,
								toml::Value::String(s) => {
									s.parse::<Amount>().is_ok_and(|a| !a.is_negative())
								},
								_ => false,
							};
							if !valid {
								return Err(format!(
									"genesis amount for '{}' must be a non-negative integer",
									address
								));
							}
						}
						Ok(())
					},
				),
			],
		);

		schema.validate(config)
	}
}

/// Factory function to create a memory client from its constructor arguments.
///
/// Arguments:
/// - optional table: `namespace`, `fee`, `confirmations`, `multiple_outputs`, `genesis`
pub fn create_client(args: &[toml::Value]) -> Result<Box<dyn ChainClientInterface>, ClientError> {
	MemoryClientSchema.validate_args(args).map_err(|e| {
		tracing::warn!("Invalid memory client configuration: {}", e);
		ClientError::new("mem", "invalid_config")
	})?;

	let config: MemoryClientConfig = match args.first() {
		Some(value) => value.clone().try_into().map_err(|e| {
			tracing::warn!("Invalid memory client configuration: {}", e);
			ClientError::new("mem", "invalid_config")
		})?,
		None => MemoryClientConfig::default(),
	};

	Ok(Box::new(MemoryClient::new(config)))
}

/// Registry for the memory client implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = ClientFactory;

	fn factory() -> Self::Factory {
		create_client
	}
}

impl ChainClientRegistry for Registry {}
