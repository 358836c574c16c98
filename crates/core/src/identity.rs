//! National ID (RUT) normalization and modulo-11 validation
//!
//! A RUT is written `<body>-<check>` where the body is a run of decimal digits
//! and the check character is a digit or `K`. Input is accepted with or without
//! thousands separators, spaces and the dash.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// A national ID that passed checksum validation, in canonical `<body>-<check>` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits before the separator
    pub fn body(&self) -> &str {
        self.0.rsplit_once('-').map_or(self.0.as_str(), |(body, _)| body)
    }

    /// The verified check character
    pub fn check_char(&self) -> char {
        self.0.chars().last().unwrap_or('0')
    }

    /// Wrap an already-canonical value read back from storage
    pub(crate) fn from_trusted(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NationalId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)
    }
}

impl TryFrom<String> for NationalId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate(&value)
    }
}

impl From<NationalId> for String {
    fn from(id: NationalId) -> Self {
        id.0
    }
}

/// Normalize user input without validating it.
///
/// Periods and spaces are removed and the result upper-cased. When no dash is
/// present a separator is inserted before the final character.
pub fn normalize(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| *c != '.' && *c != ' ')
        .collect::<String>()
        .to_uppercase();

    if !cleaned.contains('-') && cleaned.chars().count() >= 2 {
        let split = cleaned
            .char_indices()
            .last()
            .map(|(i, _)| i)
            .unwrap_or_default();
        cleaned.insert(split, '-');
    }

    cleaned
}

/// Validate a national ID and return its canonical form
pub fn validate(raw: &str) -> Result<NationalId, IdentityError> {
    let cleaned: Vec<char> = raw
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '-'))
        .flat_map(char::to_uppercase)
        .collect();

    if cleaned.len() < 2 {
        return Err(IdentityError::InvalidFormat {
            value: raw.to_string(),
            reason: "too short, expected something like 12345678-K",
        });
    }

    let (body, check) = cleaned.split_at(cleaned.len() - 1);
    let check = check[0];

    if !body.iter().all(char::is_ascii_digit) {
        return Err(IdentityError::InvalidFormat {
            value: raw.to_string(),
            reason: "body must contain only digits",
        });
    }

    let body: String = body.iter().collect();
    let expected = check_digit(&body);
    if check != expected {
        return Err(IdentityError::InvalidChecksum {
            value: raw.to_string(),
            expected,
        });
    }

    Ok(NationalId(format!("{body}-{check}")))
}

/// Compute the modulo-11 check character for a string of ASCII digits.
///
/// Non-digit characters are ignored.
pub fn check_digit(body: &str) -> char {
    let mut sum = 0u32;
    let mut multiplier = 2u32;

    for digit in body.chars().rev().filter_map(|c| c.to_digit(10)) {
        sum += digit * multiplier;
        multiplier += 1;
        if multiplier == 8 {
            multiplier = 2;
        }
    }

    match 11 - sum % 11 {
        11 => '0',
        10 => 'K',
        n => char::from_digit(n, 10).unwrap_or('0'),
    }
}
