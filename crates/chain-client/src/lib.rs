//! Blockchain client module for the chain gateway.
//!
//! This module defines the contract every blockchain backend implements,
//! whatever the chain family. Callers only ever talk to
//! `ChainClientInterface`, so the same code works on any registered chain.
//!
//! Besides the primitives, the trait carries a few operations composed purely
//! from them (deposit filtering, last-block lookup, sign and submit). They are
//! written once here and inherited by every backend.

use async_trait::async_trait;
use chain_types::{
	AddressKeyPair, Amount, Block, ConfigSchema, ImplementationRegistry, SignedTx, Transaction,
	TxInput, TxOutput,
};
use std::collections::HashMap;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Confirmations after which a transaction is treated as irreversible,
/// unless a backend overrides `get_confirmations`.
pub const DEFAULT_CONFIRMATIONS: u64 = 12;

/// Error returned by any fallible client operation.
///
/// The payload is a short tag namespaced by backend and reason, such as
/// `e_btc_timeout`. Tags are surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{0}")]
pub struct ClientError(String);

impl ClientError {
	/// Builds the tag `e_<namespace>_<reason>`.
	pub fn new(namespace: &str, reason: &str) -> Self {
		Self(format!("e_{}_{}", namespace, reason))
	}

	/// Wraps an already formed tag.
	pub fn from_tag(tag: impl Into<String>) -> Self {
		Self(tag.into())
	}

	pub fn tag(&self) -> &str {
		&self.0
	}

	/// Backend part of a well-formed tag.
	pub fn namespace(&self) -> Option<&str> {
		self.split().map(|(namespace, _)| namespace)
	}

	/// Reason part of a well-formed tag.
	pub fn reason(&self) -> Option<&str> {
		self.split().map(|(_, reason)| reason)
	}

	fn split(&self) -> Option<(&str, &str)> {
		let rest = self.0.strip_prefix("e_")?;
		let (namespace, reason) = rest.split_once('_')?;
		if namespace.is_empty() || reason.is_empty() {
			return None;
		}
		Some((namespace, reason))
	}
}

/// Failure of the sign and submit pipeline, reported by `send_detailed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
	/// Signing failed, nothing was submitted.
	#[error("Signing failed: {0}")]
	Signing(ClientError),
	/// Signing succeeded but the network rejected the transaction.
	///
	/// The signed transaction is handed back so the caller can resubmit it.
	#[error("Submission of {} failed: {error}", .signed.hash)]
	Submission { signed: SignedTx, error: ClientError },
}

impl SendError {
	/// The backend error that stopped the pipeline.
	pub fn client_error(&self) -> &ClientError {
		match self {
			Self::Signing(error) => error,
			Self::Submission { error, .. } => error,
		}
	}

	/// The signed but unsubmitted transaction, if signing got that far.
	pub fn signed_tx(&self) -> Option<&SignedTx> {
		match self {
			Self::Signing(_) => None,
			Self::Submission { signed, .. } => Some(signed),
		}
	}
}

impl From<SendError> for ClientError {
	fn from(err: SendError) -> Self {
		match err {
			SendError::Signing(error) => error,
			SendError::Submission { error, .. } => error,
		}
	}
}

/// Trait defining the contract every blockchain backend implements.
///
/// All amounts are minor units. Every fallible operation returns either a
/// result or a `ClientError`, never both. Network I/O, signing and address
/// encoding belong to the implementation.
#[async_trait]
pub trait ChainClientInterface: Send + Sync {
	/// Returns the schema the implementation's constructor arguments must satisfy.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Generates a new address with its public key and secret material.
	async fn generate_address(&self) -> Result<AddressKeyPair, ClientError>;

	/// Gets the balance of an address.
	async fn get_address_balance(&self, address: &str) -> Result<Amount, ClientError>;

	/// Gets up to `limit` transactions touching `address`, made at or after
	/// `since_ts`.
	///
	/// Each record carries `account = address` and the signed balance delta:
	/// positive for deposits, negative for outgoing transfers.
	async fn get_address_txs(
		&self,
		address: &str,
		limit: usize,
		since_ts: u64,
	) -> Result<Vec<Transaction>, ClientError>;

	/// Checks whether `address` is valid on this network.
	fn is_address_valid(&self, address: &str) -> bool;

	/// Gets the current network fee for a transfer.
	async fn get_network_fee(&self) -> Result<Amount, ClientError>;

	/// Gets the index of the latest block or ledger.
	async fn get_block_number(&self) -> Result<u64, ClientError>;

	/// Gets a block by index.
	///
	/// With `expand` the block lists full transaction records instead of hashes.
	async fn get_block(&self, block: u64, expand: bool) -> Result<Block, ClientError>;

	/// Gets the total coin supply according to the latest block.
	async fn get_total_supply(&self) -> Result<Amount, ClientError>;

	/// Gets a transaction by hash.
	async fn get_tx(&self, hash: &str) -> Result<Transaction, ClientError>;

	/// Builds and signs a transfer.
	///
	/// Inputs carry the secrets for their addresses. `fee` covers the whole
	/// transaction.
	async fn sign_tx(
		&self,
		inputs: &[TxInput],
		outputs: &[TxOutput],
		fee: &Amount,
	) -> Result<SignedTx, ClientError>;

	/// Submits a signed transaction and returns its hash.
	async fn submit_tx(&self, tx: &SignedTx) -> Result<String, ClientError>;

	/// Whether one transaction may carry several inputs and outputs.
	fn has_multiple_outputs(&self) -> bool;

	/// Confirmations after which a transaction is irreversible.
	fn get_confirmations(&self) -> u64 {
		DEFAULT_CONFIRMATIONS
	}

	/// Gets the deposits of an address keyed by transaction hash.
	///
	/// Calls `get_address_txs` with the same arguments and keeps only records
	/// whose balance delta (or value, when no delta is reported) is strictly
	/// positive. Records are returned unchanged; a duplicate hash keeps the
	/// last record.
	async fn get_address_deposit_map(
		&self,
		address: &str,
		limit: usize,
		since_ts: u64,
	) -> Result<HashMap<String, Transaction>, ClientError> {
		let txs = self.get_address_txs(address, limit, since_ts).await?;

		let mut deposits = HashMap::new();
		for tx in txs {
			if !tx.is_deposit() {
				continue;
			}
			deposits.insert(tx.hash.clone(), tx);
		}

		Ok(deposits)
	}

	/// Gets the latest block, composed from `get_block_number` and `get_block`.
	async fn get_last_block(&self, expand: bool) -> Result<Block, ClientError> {
		let number = self.get_block_number().await?;
		self.get_block(number, expand).await
	}

	/// Signs and submits a transfer, returning the transaction hash.
	///
	/// Submission only happens after a successful signature. Use
	/// `send_detailed` to get the signed transaction back when submission
	/// fails.
	async fn send(
		&self,
		inputs: &[TxInput],
		outputs: &[TxOutput],
		fee: &Amount,
	) -> Result<String, ClientError> {
		let signed = self.sign_tx(inputs, outputs, fee).await?;
		self.submit_tx(&signed).await
	}

	/// Same pipeline as `send`, reporting which step failed.
	async fn send_detailed(
		&self,
		inputs: &[TxInput],
		outputs: &[TxOutput],
		fee: &Amount,
	) -> Result<String, SendError> {
		let signed = self
			.sign_tx(inputs, outputs, fee)
			.await
			.map_err(SendError::Signing)?;

		match self.submit_tx(&signed).await {
			Ok(hash) => Ok(hash),
			Err(error) => {
				tracing::warn!(
					hash = %signed.hash,
					error = %error,
					"Signed transaction was not accepted"
				);
				Err(SendError::Submission { signed, error })
			},
		}
	}
}

/// Type alias for client factory functions.
///
/// A factory receives the currency's resolved positional arguments and
/// returns a ready client.
pub type ClientFactory = fn(&[toml::Value]) -> Result<Box<dyn ChainClientInterface>, ClientError>;

/// Registry trait for client implementations.
pub trait ChainClientRegistry: ImplementationRegistry<Factory = ClientFactory> {}

/// Get all registered client implementations.
///
/// Returns (name, factory) pairs for every implementation shipped with this
/// crate. Chain-specific backends living in other crates register themselves
/// with the client registry explicitly.
pub fn get_all_implementations() -> Vec<(&'static str, ClientFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}
