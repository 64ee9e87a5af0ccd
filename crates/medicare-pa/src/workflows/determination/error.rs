use crate::datasets::DatasetError;
use crate::identifiers::IdentifierError;
use crate::registry::RegistryError;

/// Failure taxonomy shared by the validators and evaluators.
///
/// Validators surface `Format`/`Checksum` before any network call. Evaluators
/// fold `Transport`/`NotFound` into their own result slot, so these never abort
/// a sibling evaluator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeterminationError {
    #[error("{0}")]
    Format(String),
    #[error("{0}")]
    Checksum(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Transport(String),
    /// Verification was attempted but is inconclusive (SAD lookups only).
    #[error("{0}")]
    UnknownState(String),
}

impl DeterminationError {
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            DeterminationError::Format(_) | DeterminationError::Checksum(_)
        )
    }
}

impl From<IdentifierError> for DeterminationError {
    fn from(value: IdentifierError) -> Self {
        match value {
            IdentifierError::Format(message) => Self::Format(message),
            IdentifierError::Checksum(message) => Self::Checksum(message),
        }
    }
}

impl From<RegistryError> for DeterminationError {
    fn from(value: RegistryError) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<DatasetError> for DeterminationError {
    fn from(value: DatasetError) -> Self {
        Self::Transport(value.to_string())
    }
}
