use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier {value:?} has a non-digit character at byte {position}")]
    NonDigit { value: String, position: usize },
}

/// A time-ordered message identifier kept as decimal text.
///
/// Values can exceed `u64`, so the order is computed on the digits. The
/// stored form has leading zeros stripped, which keeps `Eq` and `Ord` in
/// agreement with numeric magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Snowflake(String);

impl Snowflake {
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let digits = validate(raw)?;
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for Snowflake {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_digits(&self.0, &other.0)
    }
}

impl PartialOrd for Snowflake {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Snowflake {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Snowflake {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Snowflake> for String {
    fn from(value: Snowflake) -> Self {
        value.0
    }
}

/// Compares two decimal identifiers by magnitude.
///
/// Leading zeros are ignored, so `"007"` equals `"7"`.
pub fn compare_ids(a: &str, b: &str) -> Result<Ordering, IdError> {
    let a = validate(a)?;
    let b = validate(b)?;
    Ok(compare_digits(a, b))
}

/// Returns the digits of `raw` without leading zeros (`"0"` stays `"0"`).
fn validate(raw: &str) -> Result<&str, IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty);
    }
    if let Some(position) = raw.bytes().position(|b| !b.is_ascii_digit()) {
        return Err(IdError::NonDigit {
            value: raw.to_string(),
            position,
        });
    }
    let trimmed = raw.trim_start_matches('0');
    if trimmed.is_empty() {
        Ok("0")
    } else {
        Ok(trimmed)
    }
}

// Both inputs are canonical digit strings: a longer one is always larger.
fn compare_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes()))
}
