use std::fmt;

use serde::{Deserialize, Serialize};

/// Money is represented as integer cents to avoid floating-point precision issues.
/// 1 unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = i64;

/// Format cents as a human-readable amount.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
///
/// Digits past the second decimal round half up: "1.005" -> 101.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(ParseCentsError::InvalidFormat);
    }

    let parts: Vec<&str> = input.split('.').collect();
    let cents = match parts.as_slice() {
        [units] => parse_units(units)?
            .checked_mul(100)
            .ok_or(ParseCentsError::Overflow)?,
        [units, decimals] => {
            if units.is_empty() && decimals.is_empty() {
                return Err(ParseCentsError::InvalidFormat);
            }
            let units = if units.is_empty() {
                0
            } else {
                parse_units(units)?
            };

            let decimal_cents: i64 = match decimals.len() {
                0 => 0,
                1 => parse_units(decimals)? * 10,
                2 => parse_units(decimals)?,
                _ => {
                    let round_up = decimals.as_bytes()[2] >= b'5';
                    parse_units(&decimals[..2])? + i64::from(round_up)
                }
            };

            units
                .checked_mul(100)
                .and_then(|c| c.checked_add(decimal_cents))
                .ok_or(ParseCentsError::Overflow)?
        }
        _ => return Err(ParseCentsError::InvalidFormat),
    };

    Ok(if negative { -cents } else { cents })
}

fn parse_units(digits: &str) -> Result<i64, ParseCentsError> {
    digits.parse().map_err(|_| ParseCentsError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Overflow,
    Negative,
    NotFinite,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
            ParseCentsError::Negative => write!(f, "amount must not be negative"),
            ParseCentsError::NotFinite => write!(f, "amount must be a finite number"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

/// An amount as it arrives from a caller: either a numeric string ("12.50")
/// or a plain number (12.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    /// Convert to cents, rejecting negative, non-finite and malformed values.
    pub fn to_cents(&self) -> Result<Cents, ParseCentsError> {
        let cents = match self {
            AmountInput::Text(text) => parse_cents(text)?,
            // Numbers go through their shortest decimal form so both inputs
            // round identically
            AmountInput::Number(value) => {
                if !value.is_finite() {
                    return Err(ParseCentsError::NotFinite);
                }
                parse_cents(&value.to_string())?
            }
        };

        if cents < 0 {
            return Err(ParseCentsError::Negative);
        }
        Ok(cents)
    }
}

impl Default for AmountInput {
    fn default() -> Self {
        AmountInput::Number(0.0)
    }
}

impl From<&str> for AmountInput {
    fn from(value: &str) -> Self {
        AmountInput::Text(value.to_string())
    }
}

impl From<String> for AmountInput {
    fn from(value: String) -> Self {
        AmountInput::Text(value)
    }
}

impl From<f64> for AmountInput {
    fn from(value: f64) -> Self {
        AmountInput::Number(value)
    }
}

impl From<Cents> for AmountInput {
    fn from(cents: Cents) -> Self {
        AmountInput::Text(format_cents(cents))
    }
}
