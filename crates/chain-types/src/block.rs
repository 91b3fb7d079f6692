//! Block representation returned by `get_block`.

use crate::{Amount, Transaction};
use serde::{Deserialize, Serialize};

/// Transactions included in a block.
///
/// Backends return bare hashes unless the caller asked for an expanded block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
	/// Transaction hashes in block order.
	Hashes(Vec<String>),
	/// Full transaction records in block order.
	Full(Vec<Transaction>),
}

impl BlockTransactions {
	pub fn len(&self) -> usize {
		match self {
			Self::Hashes(hashes) => hashes.len(),
			Self::Full(txs) => txs.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the transaction hashes regardless of expansion.
	pub fn hashes(&self) -> Vec<&str> {
		match self {
			Self::Hashes(hashes) => hashes.iter().map(String::as_str).collect(),
			Self::Full(txs) => txs.iter().map(|tx| tx.hash.as_str()).collect(),
		}
	}
}

/// A block (or ledger) on the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
	/// Hash of the block.
	pub hash: String,
	/// Height of the block, same as the index it was requested by.
	pub number: u64,
	/// Unix timestamp (seconds) when the block was produced.
	pub time: u64,
	/// Number of blocks produced after this one.
	pub confirmations: u64,
	/// Total supply of the chain's coin at this block, in minor units.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub total_supply: Option<Amount>,
	pub txs: BlockTransactions,
}
