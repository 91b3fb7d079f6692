//! Address generation output.

use crate::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A freshly generated address with its public and secret key material.
///
/// The shape of `secret` is backend-defined: Bitcoin-like chains usually
/// return `private` and `wif`, others a `seed`. This layer never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressKeyPair {
	/// Encoded address in the network's native format.
	pub address: String,
	/// Public key, encoded as the backend prefers (usually hex).
	pub public: String,
	/// Secret material keyed by kind, e.g. `private`, `wif`, `seed`.
	pub secret: BTreeMap<String, SecretString>,
}

impl AddressKeyPair {
	/// Returns the secret of the given kind, if the backend produced one.
	pub fn secret(&self, kind: &str) -> Option<&SecretString> {
		self.secret.get(kind)
	}
}
