//! Pure format and checksum validators for the identifiers a case carries.
//!
//! Every constructor here is the validator: holding an `Mbi`, `Npi` or
//! `Icd10Code` means the string passed its syntactic checks. None of these
//! touch the network; registry-backed verification lives in
//! [`crate::workflows::determination::intake`].

mod icd10;
mod mbi;
mod npi;

pub use icd10::Icd10Code;
pub use mbi::Mbi;
pub use npi::Npi;

/// Synchronous validation failure raised before any evaluator runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("{0}")]
    Format(String),
    #[error("{0}")]
    Checksum(String),
}

impl IdentifierError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }
}

/// Drops hyphens and whitespace, the separators intake forms tend to add.
fn strip_separators(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}
