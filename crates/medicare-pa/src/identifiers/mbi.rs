use std::fmt;

use serde::{Serialize, Serializer};

use super::{strip_separators, IdentifierError};

/// Letters never issued in an MBI; they read too much like 5, 1, 0, 1, 8 and 2.
const EXCLUDED_LETTERS: [char; 6] = ['S', 'L', 'O', 'I', 'B', 'Z'];

#[derive(Clone, Copy)]
enum Slot {
    NonZeroDigit,
    Digit,
    Alpha,
    AlphaNumeric,
}

/// C A AN N A A N A A N N
const LAYOUT: [Slot; 11] = [
    Slot::NonZeroDigit,
    Slot::Alpha,
    Slot::AlphaNumeric,
    Slot::Digit,
    Slot::Alpha,
    Slot::Alpha,
    Slot::Digit,
    Slot::Alpha,
    Slot::Alpha,
    Slot::Digit,
    Slot::Digit,
];

fn is_mbi_letter(c: char) -> bool {
    c.is_ascii_uppercase() && !EXCLUDED_LETTERS.contains(&c)
}

impl Slot {
    fn accepts(self, c: char) -> bool {
        match self {
            Slot::NonZeroDigit => matches!(c, '1'..='9'),
            Slot::Digit => c.is_ascii_digit(),
            Slot::Alpha => is_mbi_letter(c),
            Slot::AlphaNumeric => c.is_ascii_digit() || is_mbi_letter(c),
        }
    }
}

/// Medicare Beneficiary Identifier, stored without separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mbi(String);

impl Mbi {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let cleaned = strip_separators(raw).to_ascii_uppercase();
        if cleaned.is_empty() {
            return Err(IdentifierError::format("MBI is required"));
        }

        let length = cleaned.chars().count();
        if length != LAYOUT.len() {
            return Err(IdentifierError::format(format!(
                "MBI must be 11 characters (got {length})"
            )));
        }

        let matches_layout = cleaned
            .chars()
            .zip(LAYOUT.iter())
            .all(|(c, slot)| slot.accepts(c));
        if !matches_layout {
            return Err(IdentifierError::format(
                "Invalid MBI format. Expected pattern: 1AN-A9AN-AA99 (letters exclude S,L,O,I,B,Z)",
            ));
        }

        Ok(Self(cleaned))
    }

    /// Compact 11-character form, as sent to the eligibility registry.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical display form `XXXX-XXX-XXXX`.
    pub fn formatted(&self) -> String {
        format!("{}-{}-{}", &self.0[..4], &self.0[4..7], &self.0[7..])
    }
}

impl fmt::Display for Mbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl Serialize for Mbi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.formatted())
    }
}
