use std::fmt;

use serde::Serialize;

use super::{strip_separators, IdentifierError};

/// Card-issuer prefix CMS prepends before running the Luhn check.
const NPI_LUHN_PREFIX: &str = "80840";

/// National Provider Identifier (10 digits, Luhn-valid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Npi(String);

impl Npi {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let cleaned = strip_separators(raw);
        if cleaned.is_empty() {
            return Err(IdentifierError::format("NPI is required"));
        }

        if cleaned.len() != 10 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdentifierError::format("NPI must be exactly 10 digits"));
        }

        if !luhn_valid(&format!("{NPI_LUHN_PREFIX}{cleaned}")) {
            return Err(IdentifierError::Checksum(
                "NPI check digit is invalid (Luhn-10 failure)".to_string(),
            ));
        }

        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Npi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Standard Luhn-10 over an all-digit string.
pub(crate) fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .chars()
        .rev()
        .enumerate()
        .map(|(index, c)| {
            let digit = c.to_digit(10).unwrap_or(0);
            if index % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}
