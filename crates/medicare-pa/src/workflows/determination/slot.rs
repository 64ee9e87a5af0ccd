use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::warn;

use super::error::DeterminationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EvaluatorKind {
    Eligibility,
    PaRequired,
    Coverage,
    Ncci,
    Sad,
}

impl EvaluatorKind {
    pub const ALL: [EvaluatorKind; 5] = [
        EvaluatorKind::Eligibility,
        EvaluatorKind::PaRequired,
        EvaluatorKind::Coverage,
        EvaluatorKind::Ncci,
        EvaluatorKind::Sad,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EvaluatorKind::Eligibility => "Eligibility check",
            EvaluatorKind::PaRequired => "PA requirement check",
            EvaluatorKind::Coverage => "Coverage lookup",
            EvaluatorKind::Ncci => "NCCI edit check",
            EvaluatorKind::Sad => "SAD exclusion check",
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result slot for one evaluator: pending, a payload, or an error. Never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EvaluationSlot<T> {
    Pending,
    Ready { result: T },
    Failed { error: String },
}

impl<T> Default for EvaluationSlot<T> {
    fn default() -> Self {
        EvaluationSlot::Pending
    }
}

impl<T> EvaluationSlot<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, EvaluationSlot::Pending)
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            EvaluationSlot::Ready { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EvaluationSlot::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl<T> From<Result<T, DeterminationError>> for EvaluationSlot<T> {
    fn from(value: Result<T, DeterminationError>) -> Self {
        match value {
            Ok(result) => EvaluationSlot::Ready { result },
            Err(err) => EvaluationSlot::Failed {
                error: err.to_string(),
            },
        }
    }
}

/// Evaluation task handle that converts panics, cancellation, and overruns
/// into slot errors instead of letting them escape.
pub(crate) struct Supervised<T> {
    label: &'static str,
    timeout: Duration,
    handle: JoinHandle<Result<T, DeterminationError>>,
}

impl<T: Send + 'static> Supervised<T> {
    pub(crate) fn spawn<F>(label: &'static str, timeout: Duration, work: F) -> Self
    where
        F: Future<Output = Result<T, DeterminationError>> + Send + 'static,
    {
        Self {
            label,
            timeout,
            handle: tokio::spawn(work),
        }
    }

    pub(crate) fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    pub(crate) async fn settle(mut self) -> Result<T, DeterminationError> {
        let outcome = tokio::time::timeout(self.timeout, &mut self.handle).await;
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(join)) if join.is_cancelled() => Err(DeterminationError::Transport(format!(
                "{} skipped: evaluation cancelled",
                self.label
            ))),
            Ok(Err(join)) => {
                warn!(evaluator = self.label, error = %join, "evaluator task panicked");
                Err(DeterminationError::Transport(format!(
                    "{} failed unexpectedly",
                    self.label
                )))
            }
            Err(_) => {
                self.handle.abort();
                warn!(evaluator = self.label, timeout = ?self.timeout, "evaluator timed out");
                Err(DeterminationError::Transport(format!(
                    "{} timed out after {:?}",
                    self.label, self.timeout
                )))
            }
        }
    }
}
