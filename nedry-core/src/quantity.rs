//! Kubernetes quantity parsing
//!
//! Turns human-suffixed sizes such as `512Mi`, `1.5G` or `100000` into a
//! byte count.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)(?:\.([0-9]+))?([a-zA-Z]*)$").expect("quantity regex is valid")
});

/// Errors produced while parsing a quantity
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("malformed quantity: {0}")]
    Malformed(String),

    #[error("unknown suffix '{suffix}' in quantity {input}")]
    UnknownSuffix { input: String, suffix: String },

    #[error("quantity out of range: {0}")]
    Overflow(String),
}

/// Multiplier as numerator / denominator
fn suffix_scale(suffix: &str) -> Option<(u128, u128)> {
    let scale = match suffix {
        "" => (1, 1),
        "m" => (1, 1000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        _ => return None,
    };
    Some(scale)
}

/// Parse a quantity into whole bytes, rounding fractions up
pub fn parse_bytes(input: &str) -> Result<u64, QuantityError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(QuantityError::Empty);
    }

    let caps = QUANTITY
        .captures(trimmed)
        .ok_or_else(|| QuantityError::Malformed(trimmed.to_string()))?;
    let whole = &caps[1];
    let fraction = caps.get(2).map_or("", |m| m.as_str());
    let suffix = &caps[3];

    let (num, den) = suffix_scale(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
        input: trimmed.to_string(),
        suffix: suffix.to_string(),
    })?;

    let overflow = || QuantityError::Overflow(trimmed.to_string());

    // Treat "1.25" as 125 / 100 and fold the fraction into the denominator
    let digits = format!("{}{}", whole, fraction);
    let mantissa: u128 = digits.parse().map_err(|_| overflow())?;
    let fraction_scale = 10u128
        .checked_pow(fraction.len() as u32)
        .ok_or_else(overflow)?;

    let numerator = mantissa.checked_mul(num).ok_or_else(overflow)?;
    let denominator = den.checked_mul(fraction_scale).ok_or_else(overflow)?;
    let bytes = (numerator + denominator - 1) / denominator;

    u64::try_from(bytes).map_err(|_| overflow())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_suffixes() {
        assert_eq!(parse_bytes("512Mi"), Ok(512 * 1024 * 1024));
        assert_eq!(parse_bytes("1Ki"), Ok(1024));
        assert_eq!(parse_bytes("2Gi"), Ok(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_bytes("1.5Gi"), Ok(1536 * 1024 * 1024));
    }

    #[test]
    fn test_decimal_suffixes() {
        assert_eq!(parse_bytes("100"), Ok(100));
        assert_eq!(parse_bytes("1k"), Ok(1000));
        assert_eq!(parse_bytes("128M"), Ok(128_000_000));
        assert_eq!(parse_bytes("0.5G"), Ok(500_000_000));
        assert_eq!(parse_bytes(" 3G "), Ok(3_000_000_000));
    }

    #[test]
    fn test_milli_rounds_up() {
        assert_eq!(parse_bytes("1500m"), Ok(2));
        assert_eq!(parse_bytes("1000m"), Ok(1));
    }

    #[test]
    fn test_invalid_quantities() {
        assert_eq!(parse_bytes(""), Err(QuantityError::Empty));
        assert!(matches!(parse_bytes("lots"), Err(QuantityError::Malformed(_))));
        assert!(matches!(parse_bytes("-5Mi"), Err(QuantityError::Malformed(_))));
        assert!(matches!(
            parse_bytes("5Xi"),
            Err(QuantityError::UnknownSuffix { .. })
        ));
        assert!(matches!(parse_bytes("100Ei"), Err(QuantityError::Overflow(_))));
    }
}
