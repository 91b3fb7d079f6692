//! Minor-unit amount representation.
//!
//! Every value that crosses the client contract is expressed in the smallest
//! indivisible unit of the currency (satoshi, wei, drop, ...). Some chains
//! exceed the range of native 64-bit integers, so amounts are backed by an
//! arbitrary-precision signed integer and serialized as decimal strings.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while parsing an amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
	/// The input is not a base-10 integer.
	#[error("Invalid amount '{0}': expected a base-10 integer")]
	Invalid(String),
	/// A major-unit value has more decimal places than the currency allows.
	#[error("Amount '{value}' has more than {fraction} decimal places")]
	TooPrecise { value: String, fraction: u32 },
}

/// Signed arbitrary-precision amount in minor units.
///
/// Positive values denote incoming funds and negative values outgoing funds
/// when used as a per-address balance delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigInt);

impl Amount {
	/// Creates an amount from an arbitrary-precision integer.
	pub fn new(value: BigInt) -> Self {
		Self(value)
	}

	/// Returns a zero amount.
	pub fn zero() -> Self {
		Self(BigInt::zero())
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	/// Returns true when the amount is strictly greater than zero.
	pub fn is_positive(&self) -> bool {
		self.0.sign() == Sign::Plus
	}

	/// Returns true when the amount is strictly less than zero.
	pub fn is_negative(&self) -> bool {
		self.0.sign() == Sign::Minus
	}

	/// Returns the underlying integer.
	pub fn as_bigint(&self) -> &BigInt {
		&self.0
	}

	pub fn into_bigint(self) -> BigInt {
		self.0
	}
}

impl fmt::Display for Amount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for Amount {
	type Err = AmountError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		if trimmed.is_empty() || trimmed.contains('_') {
			return Err(AmountError::Invalid(s.to_string()));
		}
		trimmed
			.parse::<BigInt>()
			.map(Self)
			.map_err(|_| AmountError::Invalid(s.to_string()))
	}
}

impl From<BigInt> for Amount {
	fn from(value: BigInt) -> Self {
		Self(value)
	}
}

impl From<i64> for Amount {
	fn from(value: i64) -> Self {
		Self(BigInt::from(value))
	}
}

impl From<u64> for Amount {
	fn from(value: u64) -> Self {
		Self(BigInt::from(value))
	}
}

impl From<u128> for Amount {
	fn from(value: u128) -> Self {
		Self(BigInt::from(value))
	}
}

impl Add for Amount {
	type Output = Amount;

	fn add(self, rhs: Amount) -> Amount {
		Amount(self.0 + rhs.0)
	}
}

impl<'a> Add<&'a Amount> for &'a Amount {
	type Output = Amount;

	fn add(self, rhs: &'a Amount) -> Amount {
		Amount(&self.0 + &rhs.0)
	}
}

impl Sub for Amount {
	type Output = Amount;

	fn sub(self, rhs: Amount) -> Amount {
		Amount(self.0 - rhs.0)
	}
}

impl<'a> Sub<&'a Amount> for &'a Amount {
	type Output = Amount;

	fn sub(self, rhs: &'a Amount) -> Amount {
		Amount(&self.0 - &rhs.0)
	}
}

impl Neg for Amount {
	type Output = Amount;

	fn neg(self) -> Amount {
		Amount(-self.0)
	}
}

impl Sum for Amount {
	fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
		iter.fold(Amount::zero(), |acc, x| acc + x)
	}
}

impl<'a> Sum<&'a Amount> for Amount {
	fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
		iter.fold(Amount::zero(), |acc, x| Amount(acc.0 + &x.0))
	}
}

// Amounts always travel as decimal strings so that no consumer is tempted
// to read them into a float.
impl Serialize for Amount {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.0.to_string())
	}
}

impl<'de> Deserialize<'de> for Amount {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(AmountVisitor)
	}
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
	type Value = Amount;

	fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("a base-10 integer or a string holding one")
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
		v.parse().map_err(E::custom)
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
		Ok(Amount::from(v))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
		Ok(Amount::from(v))
	}

	fn visit_i128<E: de::Error>(self, v: i128) -> Result<Amount, E> {
		Ok(Amount(BigInt::from(v)))
	}

	fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
		Ok(Amount::from(v))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_beyond_native_range() {
		let raw = "340282366920938463463374607431768211456000";
		let amount: Amount = raw.parse().unwrap();
		assert_eq!(amount.to_string(), raw);
		assert!(amount.is_positive());
		assert!(amount > Amount::from(u128::MAX));
	}

	#[test]
	fn test_sign_checks() {
		assert!(!Amount::zero().is_positive());
		assert!(!Amount::zero().is_negative());
		assert!(Amount::from(-3i64).is_negative());
		assert!(Amount::from(5u64).is_positive());
	}

	#[test]
	fn test_rejects_non_integers() {
		assert!("1.5".parse::<Amount>().is_err());
		assert!("".parse::<Amount>().is_err());
		assert!("abc".parse::<Amount>().is_err());
		assert!("1_000".parse::<Amount>().is_err());
	}

	#[test]
	fn test_arithmetic() {
		let a = Amount::from(10u64);
		let b = Amount::from(4u64);
		assert_eq!(&a - &b, Amount::from(6u64));
		assert_eq!(&b - &a, Amount::from(-6i64));
		let total: Amount = [a, b].iter().sum();
		assert_eq!(total, Amount::from(14u64));
	}

	#[test]
	fn test_json_accepts_strings_and_integers() {
		let from_str: Amount = serde_json::from_str("\"-42\"").unwrap();
		let from_int: Amount = serde_json::from_str("-42").unwrap();
		assert_eq!(from_str, from_int);
		assert_eq!(serde_json::to_string(&from_int).unwrap(), "\"-42\"");
	}
}
