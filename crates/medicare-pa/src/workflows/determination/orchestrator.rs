use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info};

use super::case::Case;
use super::coverage::{evaluate_coverage, CoverageOutcome, CoverageRegistry};
use super::eligibility::{check_eligibility, EligibilityOutcome, EligibilityRegistry};
use super::ncci::{evaluate_ncci, NcciOutcome};
use super::pa_required::{check_pa_required, PaRequiredOutcome};
use super::sad::{check_sad_exclusion, SadExclusionSource, SadOutcome};
use super::slot::{EvaluationSlot, EvaluatorKind, Supervised};
use crate::config::EvaluationSettings;
use crate::datasets::ReferenceCache;

/// Extra time granted to evaluators that supervise their own sub-lookups, so
/// the inner timeouts fire first and keep their partial results.
const COMPOSITE_GRACE: Duration = Duration::from_secs(1);

/// One slot per evaluator for a single case.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterminationResults {
    pub eligibility: EvaluationSlot<EligibilityOutcome>,
    pub pa_required: EvaluationSlot<PaRequiredOutcome>,
    pub coverage: EvaluationSlot<CoverageOutcome>,
    pub ncci: EvaluationSlot<NcciOutcome>,
    pub sad: EvaluationSlot<SadOutcome>,
}

impl DeterminationResults {
    pub fn apply(&mut self, update: SlotUpdate) {
        match update {
            SlotUpdate::Eligibility(slot) => self.eligibility = slot,
            SlotUpdate::PaRequired(slot) => self.pa_required = slot,
            SlotUpdate::Coverage(slot) => self.coverage = slot,
            SlotUpdate::Ncci(slot) => self.ncci = slot,
            SlotUpdate::Sad(slot) => self.sad = slot,
        }
    }

    pub fn is_pending(&self, kind: EvaluatorKind) -> bool {
        match kind {
            EvaluatorKind::Eligibility => self.eligibility.is_pending(),
            EvaluatorKind::PaRequired => self.pa_required.is_pending(),
            EvaluatorKind::Coverage => self.coverage.is_pending(),
            EvaluatorKind::Ncci => self.ncci.is_pending(),
            EvaluatorKind::Sad => self.sad.is_pending(),
        }
    }

    pub fn is_settled(&self) -> bool {
        EvaluatorKind::ALL.iter().all(|kind| !self.is_pending(*kind))
    }

    /// True once the eligibility evaluator has reported a Medicare Advantage plan.
    pub fn is_medicare_advantage(&self) -> bool {
        self.eligibility
            .result()
            .map(EligibilityOutcome::is_medicare_advantage)
            .unwrap_or(false)
    }

    pub(crate) fn fail_unreported(&mut self) {
        for kind in EvaluatorKind::ALL {
            if self.is_pending(kind) {
                let error = format!("{} did not report a result", kind.label());
                self.apply(SlotUpdate::failed(kind, error));
            }
        }
    }
}

/// A settled evaluator result on its way to a result set.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotUpdate {
    Eligibility(EvaluationSlot<EligibilityOutcome>),
    PaRequired(EvaluationSlot<PaRequiredOutcome>),
    Coverage(EvaluationSlot<CoverageOutcome>),
    Ncci(EvaluationSlot<NcciOutcome>),
    Sad(EvaluationSlot<SadOutcome>),
}

impl SlotUpdate {
    pub fn kind(&self) -> EvaluatorKind {
        match self {
            SlotUpdate::Eligibility(_) => EvaluatorKind::Eligibility,
            SlotUpdate::PaRequired(_) => EvaluatorKind::PaRequired,
            SlotUpdate::Coverage(_) => EvaluatorKind::Coverage,
            SlotUpdate::Ncci(_) => EvaluatorKind::Ncci,
            SlotUpdate::Sad(_) => EvaluatorKind::Sad,
        }
    }

    fn failed(kind: EvaluatorKind, error: String) -> Self {
        match kind {
            EvaluatorKind::Eligibility => SlotUpdate::Eligibility(EvaluationSlot::Failed { error }),
            EvaluatorKind::PaRequired => SlotUpdate::PaRequired(EvaluationSlot::Failed { error }),
            EvaluatorKind::Coverage => SlotUpdate::Coverage(EvaluationSlot::Failed { error }),
            EvaluatorKind::Ncci => SlotUpdate::Ncci(EvaluationSlot::Failed { error }),
            EvaluatorKind::Sad => SlotUpdate::Sad(EvaluationSlot::Failed { error }),
        }
    }
}

/// Stream of slot updates for one launched case. Ends after every evaluator
/// has reported exactly once.
#[derive(Debug)]
pub struct EvaluationRound {
    updates: mpsc::UnboundedReceiver<SlotUpdate>,
}

impl EvaluationRound {
    pub async fn next(&mut self) -> Option<SlotUpdate> {
        self.updates.recv().await
    }
}

/// Collaborators shared by every evaluation round.
#[derive(Clone)]
pub struct Evaluators {
    pub datasets: Arc<ReferenceCache>,
    pub eligibility: Arc<dyn EligibilityRegistry>,
    pub coverage: Arc<dyn CoverageRegistry>,
    pub sad: Arc<dyn SadExclusionSource>,
}

/// Fans a case out to the five evaluators and collects their slots.
pub struct DeterminationOrchestrator {
    evaluators: Evaluators,
    settings: EvaluationSettings,
}

impl DeterminationOrchestrator {
    pub fn new(evaluators: Evaluators, settings: EvaluationSettings) -> Self {
        Self {
            evaluators,
            settings,
        }
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Starts every evaluator immediately and returns the update stream.
    /// Must be called from within a Tokio runtime.
    pub fn launch(&self, case: Arc<Case>) -> EvaluationRound {
        let (tx, updates) = mpsc::unbounded_channel();
        let timeout = self.settings.evaluator_timeout;
        let Evaluators {
            datasets,
            eligibility,
            coverage,
            sad,
        } = self.evaluators.clone();
        let mut downstream: Vec<AbortHandle> = Vec::with_capacity(4);

        let pa_required = {
            let datasets = datasets.clone();
            let case = case.clone();
            Supervised::spawn(EvaluatorKind::PaRequired.label(), timeout, async move {
                check_pa_required(
                    &datasets,
                    &case.procedure_code,
                    case.provider.practice_state.as_deref(),
                )
                .await
            })
        };
        downstream.push(pa_required.abort_handle());
        forward(tx.clone(), pa_required, SlotUpdate::PaRequired);

        let coverage = Supervised::spawn(
            EvaluatorKind::Coverage.label(),
            timeout + COMPOSITE_GRACE,
            evaluate_coverage(coverage, case.clone(), timeout),
        );
        downstream.push(coverage.abort_handle());
        forward(tx.clone(), coverage, SlotUpdate::Coverage);

        let ncci = Supervised::spawn(
            EvaluatorKind::Ncci.label(),
            timeout + COMPOSITE_GRACE,
            evaluate_ncci(datasets, case.claim_codes(), timeout),
        );
        downstream.push(ncci.abort_handle());
        forward(tx.clone(), ncci, SlotUpdate::Ncci);

        let sad_check = {
            let case = case.clone();
            Supervised::spawn(EvaluatorKind::Sad.label(), timeout, async move {
                check_sad_exclusion(sad.as_ref(), &case.procedure_code).await
            })
        };
        downstream.push(sad_check.abort_handle());
        forward(tx.clone(), sad_check, SlotUpdate::Sad);

        let cancel_on_ma = self.settings.cancel_on_medicare_advantage;
        let eligibility_check = Supervised::spawn(EvaluatorKind::Eligibility.label(), timeout, {
            let case = case.clone();
            async move { check_eligibility(eligibility.as_ref(), &case).await }
        });
        tokio::spawn(async move {
            let result = eligibility_check.settle().await;
            let advantage = matches!(&result, Ok(outcome) if outcome.is_medicare_advantage());
            if advantage && cancel_on_ma {
                info!(
                    procedure = %case.procedure_code,
                    "Medicare Advantage plan detected; cancelling downstream evaluators"
                );
                for handle in &downstream {
                    handle.abort();
                }
            }
            debug!(evaluator = %EvaluatorKind::Eligibility, ok = result.is_ok(), "evaluator settled");
            let _ = tx.send(SlotUpdate::Eligibility(result.into()));
        });

        EvaluationRound { updates }
    }

    /// Runs a case to completion and returns every slot.
    pub async fn evaluate(&self, case: Arc<Case>) -> DeterminationResults {
        let mut round = self.launch(case);
        let mut results = DeterminationResults::default();
        while let Some(update) = round.next().await {
            results.apply(update);
        }
        results.fail_unreported();
        results
    }
}

fn forward<T: Send + 'static>(
    tx: mpsc::UnboundedSender<SlotUpdate>,
    task: Supervised<T>,
    wrap: fn(EvaluationSlot<T>) -> SlotUpdate,
) {
    tokio::spawn(async move {
        let result = task.settle().await;
        let update = wrap(result.into());
        debug!(evaluator = %update.kind(), "evaluator settled");
        let _ = tx.send(update);
    });
}
