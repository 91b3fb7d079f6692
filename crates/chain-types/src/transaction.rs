//! Transaction types shared by every backend.
//!
//! Values are always minor units. A `Transaction` fetched for a specific
//! address carries that address in `account` and the signed balance delta in
//! `balance`: positive for deposits, negative for outgoing transfers.

use crate::{Amount, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single destination of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutput {
	pub address: String,
	pub value: Amount,
}

/// Transaction record as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	/// Block containing the transaction, 0 while it sits in the mempool.
	pub block: u64,
	/// Transaction id.
	pub hash: String,
	/// Total transacted value.
	pub value: Amount,
	/// Address the record was fetched for, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub account: Option<String>,
	/// Balance change of `account` caused by this transaction.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub balance: Option<Amount>,
	/// Blocks produced since the containing block.
	pub confirmations: u64,
	/// Unique source addresses.
	pub from: BTreeSet<String>,
	/// Destinations in transaction order.
	pub to: Vec<TransferOutput>,
	/// Total fee paid.
	pub fee: Amount,
}

impl Transaction {
	/// Returns the value that decides whether this is a deposit.
	///
	/// The per-address `balance` wins when present, otherwise the total
	/// `value` is used.
	pub fn net_value(&self) -> &Amount {
		self.balance.as_ref().unwrap_or(&self.value)
	}

	/// Returns true when the net value is strictly positive.
	pub fn is_deposit(&self) -> bool {
		self.net_value().is_positive()
	}

	pub fn is_confirmed(&self) -> bool {
		self.block > 0
	}
}

/// Funding source for `sign_tx`.
///
/// Each input carries the secrets needed to spend from its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
	pub address: String,
	pub value: Amount,
	pub secret: Vec<SecretString>,
}

/// Destination for `sign_tx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
	pub address: String,
	pub value: Amount,
}

impl From<TxOutput> for TransferOutput {
	fn from(output: TxOutput) -> Self {
		Self {
			address: output.address,
			value: output.value,
		}
	}
}

/// Output of signing and input of submission.
///
/// `raw` uses whatever encoding the backend broadcasts; `hash` is the id the
/// transaction will have once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
	pub raw: String,
	pub hash: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tx(value: i64, balance: Option<i64>) -> Transaction {
		Transaction {
			block: 0,
			hash: "h".to_string(),
			value: Amount::from(value),
			account: balance.map(|_| "addr".to_string()),
			balance: balance.map(Amount::from),
			confirmations: 0,
			from: BTreeSet::new(),
			to: Vec::new(),
			fee: Amount::zero(),
		}
	}

	#[test]
	fn test_balance_takes_precedence_over_value() {
		assert!(!tx(100, Some(-100)).is_deposit());
		assert!(tx(-1, Some(5)).is_deposit());
		assert!(tx(7, None).is_deposit());
		assert!(!tx(0, None).is_deposit());
	}

	#[test]
	fn test_mempool_transaction_is_unconfirmed() {
		assert!(!tx(1, None).is_confirmed());
	}
}
