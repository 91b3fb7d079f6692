//! Common types module for the chain gateway.
//!
//! This module defines the data model shared by every blockchain backend:
//! minor-unit amounts, transactions, blocks, key pairs and the currency
//! configuration consumed by the client registry. Keeping these in one crate
//! lets callers stay backend-agnostic.

/// Address and key material produced by backends.
pub mod address;
/// Arbitrary-precision minor-unit amounts.
pub mod amount;
/// Block representation.
pub mod block;
/// Currency configuration entries for the client registry.
pub mod currency;
/// Base trait for self-registering implementations.
pub mod registry;
/// Zeroizing string wrapper for secrets.
pub mod secret_string;
/// Transaction, transfer and signing types.
pub mod transaction;
/// Utility functions for amount formatting and time.
pub mod utils;
/// Configuration validation types for backend arguments.
pub mod validation;

pub use address::AddressKeyPair;
pub use amount::{Amount, AmountError};
pub use block::{Block, BlockTransactions};
pub use currency::{ArgsError, ArgsProducer, ClientArgs, CurrencyConfig};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use transaction::{SignedTx, Transaction, TransferOutput, TxInput, TxOutput};
pub use utils::{current_timestamp, format_minor_units, parse_major_units};
pub use validation::*;
