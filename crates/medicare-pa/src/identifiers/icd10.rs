use std::fmt;

use serde::{Serialize, Serializer};

use super::IdentifierError;

/// ICD-10-CM diagnosis code in its cleaned (dotless, uppercase) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Icd10Code(String);

impl Icd10Code {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect::<String>()
            .to_ascii_uppercase();
        if cleaned.is_empty() {
            return Err(IdentifierError::format("ICD-10 code is required"));
        }

        if !matches_icd10_shape(&cleaned) {
            return Err(IdentifierError::format("Invalid ICD-10 format"));
        }

        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header codes (category only) are not specific enough to bill.
    pub fn is_billable(&self) -> bool {
        self.0.len() >= 4
    }

    /// Dotted presentation, e.g. `C34.90`.
    pub fn formatted(&self) -> String {
        if self.0.len() > 3 {
            format!("{}.{}", &self.0[..3], &self.0[3..])
        } else {
            self.0.clone()
        }
    }
}

/// letter, two digits, then up to four alphanumerics.
fn matches_icd10_shape(code: &str) -> bool {
    let bytes = code.as_bytes();
    if !(3..=7).contains(&bytes.len()) {
        return false;
    }

    bytes[0].is_ascii_uppercase()
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

impl fmt::Display for Icd10Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl Serialize for Icd10Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.formatted())
    }
}
