//! Zeroizing wrapper for key material.
//!
//! Private keys, WIF strings and seeds pass through this layer when addresses
//! are generated and when inputs are signed. `SecretString` keeps them out of
//! logs and debug output and wipes the buffer on drop.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// Secret string that zeros its memory on drop and never prints its value.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Exposes the secret.
	///
	/// Callers must not log or persist the returned slice.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	/// Runs `f` with the secret, limiting where it is visible.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({})", REDACTED)
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl PartialEq for SecretString {
	fn eq(&self, other: &Self) -> bool {
		self.0.as_str() == other.0.as_str()
	}
}

impl Eq for SecretString {}

// Serialized output is for diagnostics only, so the value is always redacted.
impl Serialize for SecretString {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(SecretString::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_wif_is_redacted_in_output() {
		let wif = SecretString::from("5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ");
		assert_eq!(format!("{:?}", wif), "SecretString(***REDACTED***)");
		assert_eq!(format!("{}", wif), "***REDACTED***");
		assert_eq!(serde_json::to_string(&wif).unwrap(), "\"***REDACTED***\"");
	}

	#[test]
	fn test_expose_and_compare() {
		let seed = SecretString::from("seed words");
		assert_eq!(seed.expose_secret(), "seed words");
		assert_eq!(seed.with_exposed(|s| s.len()), 10);
		assert_eq!(seed, SecretString::from("seed words"));
		assert_ne!(seed, SecretString::from("other words"));
	}

	#[test]
	fn test_deserialize_keeps_value() {
		let key: SecretString = serde_json::from_str("\"deadbeef\"").unwrap();
		assert_eq!(key.expose_secret(), "deadbeef");
	}
}
