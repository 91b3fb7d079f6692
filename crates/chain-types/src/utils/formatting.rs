//! Amount and identifier formatting.
//!
//! Converts between minor units (as carried by the client contract) and the
//! human-readable major units described by a currency's `fraction` hint.

use crate::{Amount, AmountError};

/// Truncates a hash or address for log output.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.chars().count() <= 8 {
		id.to_string()
	} else {
		format!("{}..", id.chars().take(8).collect::<String>())
	}
}

/// Formats a minor-unit amount as a major-unit decimal string.
///
/// Trailing zeros of the fractional part are dropped, so `150000000` with a
/// fraction of 8 becomes `"1.5"`.
pub fn format_minor_units(amount: &Amount, fraction: u32) -> String {
	let digits = amount.as_bigint().magnitude().to_string();
	let sign = if amount.is_negative() { "-" } else { "" };

	if fraction == 0 {
		return format!("{}{}", sign, digits);
	}

	let decimal_places = fraction as usize;

	// Amounts below one major unit need leading zeros
	let (integer_part, decimal_part) = if digits.len() <= decimal_places {
		(
			"0".to_string(),
			format!("{:0>width$}", digits, width = decimal_places),
		)
	} else {
		let split_pos = digits.len() - decimal_places;
		(
			digits[..split_pos].to_string(),
			digits[split_pos..].to_string(),
		)
	};

	let decimal_trimmed = decimal_part.trim_end_matches('0');
	if decimal_trimmed.is_empty() {
		format!("{}{}", sign, integer_part)
	} else {
		format!("{}{}.{}", sign, integer_part, decimal_trimmed)
	}
}

/// Parses a major-unit decimal string into minor units.
///
/// Rejects values carrying more decimal places than `fraction`, since they
/// cannot be represented without rounding.
pub fn parse_major_units(value: &str, fraction: u32) -> Result<Amount, AmountError> {
	let trimmed = value.trim();
	let (integer_part, decimal_part) = match trimmed.split_once('.') {
		Some((int, dec)) => (int, dec),
		None => (trimmed, ""),
	};

	if !decimal_part.chars().all(|c| c.is_ascii_digit()) {
		return Err(AmountError::Invalid(value.to_string()));
	}

	let unsigned = integer_part.trim_start_matches(['-', '+']);
	if unsigned.is_empty() && decimal_part.is_empty() {
		return Err(AmountError::Invalid(value.to_string()));
	}

	let decimal_part = decimal_part.trim_end_matches('0');
	if decimal_part.len() > fraction as usize {
		return Err(AmountError::TooPrecise {
			value: value.to_string(),
			fraction,
		});
	}

	let integer_part = match integer_part {
		"" | "-" | "+" if !decimal_part.is_empty() || trimmed.contains('.') => {
			format!("{}0", integer_part)
		},
		other => other.to_string(),
	};

	let padded = format!(
		"{}{:0<width$}",
		integer_part,
		decimal_part,
		width = fraction as usize
	);
	padded
		.parse()
		.map_err(|_| AmountError::Invalid(value.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("123456789"), "12345678..");
	}

	#[test]
	fn test_format_minor_units() {
		// 8 decimals (BTC)
		assert_eq!(format_minor_units(&Amount::from(100_000_000u64), 8), "1");
		assert_eq!(format_minor_units(&Amount::from(150_000_000u64), 8), "1.5");
		assert_eq!(format_minor_units(&Amount::from(1u64), 8), "0.00000001");

		// 18 decimals (ETH)
		let wei: Amount = "102000000000000000000".parse().unwrap();
		assert_eq!(format_minor_units(&wei, 18), "102");

		// Negative deltas keep their sign
		assert_eq!(format_minor_units(&Amount::from(-50_000_000i64), 8), "-0.5");

		assert_eq!(format_minor_units(&Amount::from(1000u64), 0), "1000");
	}

	#[test]
	fn test_parse_major_units() {
		assert_eq!(
			parse_major_units("1.5", 8).unwrap(),
			Amount::from(150_000_000u64)
		);
		assert_eq!(parse_major_units("2", 6).unwrap(), Amount::from(2_000_000u64));
		assert_eq!(parse_major_units(".25", 2).unwrap(), Amount::from(25u64));
		assert_eq!(
			parse_major_units("-0.5", 8).unwrap(),
			Amount::from(-50_000_000i64)
		);
		assert_eq!(parse_major_units("1.50", 1).unwrap(), Amount::from(15u64));
	}

	#[test]
	fn test_parse_major_units_rejects_excess_precision() {
		assert!(matches!(
			parse_major_units("0.123", 2),
			Err(AmountError::TooPrecise { fraction: 2, .. })
		));
		assert!(parse_major_units("1.x", 2).is_err());
	}

	#[test]
	fn test_parse_major_units_rejects_blank_input() {
		for input in ["", "  ", "-", "+", ".", "-.", "+."] {
			assert!(
				matches!(parse_major_units(input, 8), Err(AmountError::Invalid(_))),
				"{:?} should not parse",
				input
			);
		}
		assert_eq!(parse_major_units("3.", 2).unwrap(), Amount::from(300u64));
	}
}
