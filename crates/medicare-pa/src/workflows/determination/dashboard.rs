//! Presentation gate over a case's result slots.
//!
//! Every evaluator result is computed and kept, but once eligibility reports a
//! Medicare Advantage plan only the eligibility card and the MA alert are shown.

use serde::Serialize;

use super::case::Case;
use super::coverage::{CoverageLookup, CoverageOutcome};
use super::eligibility::{EligibilityOutcome, MedicarePart};
use super::ncci::NcciOutcome;
use super::orchestrator::DeterminationResults;
use super::pa_required::{PaDetermination, PaRequiredOutcome};
use super::sad::{SadOutcome, SadStatus};
use super::session::LetterState;
use super::slot::EvaluationSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Loading,
}

impl CheckStatus {
    pub fn label(self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Warn => "WARN",
            CheckStatus::Info => "INFO",
            CheckStatus::Loading => "LOADING",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckCard<T> {
    pub title: &'static str,
    pub status: CheckStatus,
    pub summary: String,
    #[serde(flatten)]
    pub slot: EvaluationSlot<T>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseHeader {
    pub patient: String,
    pub mbi: String,
    pub npi: String,
    pub diagnosis: String,
    pub procedure_codes: Vec<String>,
}

impl CaseHeader {
    fn from_case(case: &Case) -> Self {
        Self {
            patient: format!("{} {}", case.patient.first_name, case.patient.last_name),
            mbi: case.patient.mbi.formatted(),
            npi: case.provider.npi.as_str().to_string(),
            diagnosis: case.diagnosis.code.formatted(),
            procedure_codes: case.claim_codes(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterCard {
    pub status: CheckStatus,
    #[serde(flatten)]
    pub letter: LetterState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    MedicareAdvantage {
        generation: u64,
        case: CaseHeader,
        eligibility: CheckCard<EligibilityOutcome>,
        alert: String,
    },
    #[serde(rename_all = "camelCase")]
    Determinations {
        generation: u64,
        case: CaseHeader,
        settled: bool,
        eligibility: CheckCard<EligibilityOutcome>,
        pa_required: CheckCard<PaRequiredOutcome>,
        coverage: CheckCard<CoverageOutcome>,
        ncci: CheckCard<NcciOutcome>,
        sad: CheckCard<SadOutcome>,
        letter: LetterCard,
    },
}

impl DashboardView {
    pub fn is_medicare_advantage(&self) -> bool {
        matches!(self, DashboardView::MedicareAdvantage { .. })
    }
}

fn card<T>(
    title: &'static str,
    slot: &EvaluationSlot<T>,
    loading: &str,
    failed: CheckStatus,
    judge: impl Fn(&T) -> (CheckStatus, String),
) -> CheckCard<T>
where
    T: Clone,
{
    let (status, summary) = match slot {
        EvaluationSlot::Pending => (CheckStatus::Loading, loading.to_string()),
        EvaluationSlot::Failed { error } => (failed, error.clone()),
        EvaluationSlot::Ready { result } => judge(result),
    };
    CheckCard {
        title,
        status,
        summary,
        slot: slot.clone(),
    }
}

fn eligibility_card(slot: &EvaluationSlot<EligibilityOutcome>) -> CheckCard<EligibilityOutcome> {
    card("Medicare Eligibility", slot, "Checking eligibility...", CheckStatus::Fail, |outcome| {
        if outcome.is_medicare_advantage() {
            let plan = outcome.ma_plan_name.as_deref().unwrap_or("unnamed plan");
            (CheckStatus::Fail, format!("Medicare Advantage ({plan})"))
        } else if outcome.eligible {
            let parts = outcome
                .parts
                .iter()
                .map(|part| match part {
                    MedicarePart::A => "A",
                    MedicarePart::B => "B",
                })
                .collect::<Vec<_>>()
                .join(" & ");
            (
                CheckStatus::Pass,
                format!("Active Original Medicare (Part {parts})"),
            )
        } else {
            (
                CheckStatus::Fail,
                "No active Medicare coverage found".to_string(),
            )
        }
    })
}

fn pa_card(slot: &EvaluationSlot<PaRequiredOutcome>) -> CheckCard<PaRequiredOutcome> {
    card("Prior Authorization", slot, "Checking PA lists...", CheckStatus::Warn, |outcome| {
        let status = match outcome.determination {
            PaDetermination::Required => CheckStatus::Warn,
            PaDetermination::NotListed | PaDetermination::NotRequiredInState => CheckStatus::Pass,
        };
        (status, outcome.message.clone())
    })
}

fn coverage_card(slot: &EvaluationSlot<CoverageOutcome>) -> CheckCard<CoverageOutcome> {
    card("Coverage Policy", slot, "Searching NCD/LCD...", CheckStatus::Warn, |outcome| {
        let count = |lookup: &Option<CoverageLookup>| {
            lookup.as_ref().map(|l| l.results.len()).unwrap_or(0)
        };
        if outcome.has_policy() {
            (
                CheckStatus::Pass,
                format!(
                    "{} NCD and {} LCD polic(ies) found",
                    count(&outcome.ncd),
                    count(&outcome.lcd)
                ),
            )
        } else if outcome.ncd.is_none() || outcome.lcd.is_none() {
            (
                CheckStatus::Warn,
                format!(
                    "Coverage search incomplete ({}). Verify NCD/LCD manually.",
                    outcome.errors.join("; ")
                ),
            )
        } else {
            (
                CheckStatus::Info,
                "No NCD or LCD found for this code combination".to_string(),
            )
        }
    })
}

fn ncci_card(slot: &EvaluationSlot<NcciOutcome>) -> CheckCard<NcciOutcome> {
    card("NCCI Edits", slot, "Checking NCCI edits...", CheckStatus::Warn, |outcome| {
        let hard_conflict = outcome
            .ptp
            .as_ref()
            .map(|ptp| ptp.conflicts.iter().any(|c| !c.modifier_allowed))
            .unwrap_or(false);
        let any_conflict = outcome.ptp.as_ref().map(|p| p.has_conflicts).unwrap_or(false);

        let mut summary = match &outcome.ptp {
            Some(ptp) => ptp.message.clone(),
            None => "PTP check unavailable".to_string(),
        };
        if let Some(limit) = outcome.mue.as_ref().and_then(|mue| mue.mue_value) {
            summary.push_str(&format!(" MUE limit: {limit} unit(s) per day."));
        }

        let status = if hard_conflict {
            CheckStatus::Fail
        } else if any_conflict || !outcome.errors.is_empty() {
            CheckStatus::Warn
        } else {
            CheckStatus::Pass
        };
        (status, summary)
    })
}

fn sad_card(slot: &EvaluationSlot<SadOutcome>) -> CheckCard<SadOutcome> {
    card("SAD Exclusion", slot, "Checking SAD list...", CheckStatus::Warn, |outcome| {
        let status = match outcome.status {
            SadStatus::Excluded => CheckStatus::Fail,
            SadStatus::NotExcluded => CheckStatus::Pass,
            SadStatus::NotApplicable => CheckStatus::Info,
            SadStatus::Unknown => CheckStatus::Warn,
        };
        (status, outcome.message.clone())
    })
}

fn letter_card(letter: &LetterState) -> LetterCard {
    let status = match letter {
        LetterState::Idle => CheckStatus::Info,
        LetterState::Drafting => CheckStatus::Loading,
        LetterState::Ready { .. } => CheckStatus::Pass,
        LetterState::Failed { .. } => CheckStatus::Fail,
    };
    LetterCard {
        status,
        letter: letter.clone(),
    }
}

fn advantage_alert(eligibility: &EligibilityOutcome) -> String {
    let plan = match &eligibility.ma_plan_name {
        Some(name) => format!(" ({name})"),
        None => String::new(),
    };
    format!(
        "This tool supports Original Medicare FFS only. The patient is enrolled in a Medicare Advantage plan{plan}. Contact the plan directly for its prior authorization requirements."
    )
}

/// Applies the display policy to a result set.
pub fn render_dashboard(
    generation: u64,
    case: &Case,
    results: &DeterminationResults,
    letter: &LetterState,
) -> DashboardView {
    let header = CaseHeader::from_case(case);
    let eligibility = eligibility_card(&results.eligibility);

    if let Some(outcome) = results.eligibility.result() {
        if outcome.is_medicare_advantage() {
            return DashboardView::MedicareAdvantage {
                generation,
                case: header,
                alert: advantage_alert(outcome),
                eligibility,
            };
        }
    }

    DashboardView::Determinations {
        generation,
        case: header,
        settled: results.is_settled(),
        eligibility,
        pa_required: pa_card(&results.pa_required),
        coverage: coverage_card(&results.coverage),
        ncci: ncci_card(&results.ncci),
        sad: sad_card(&results.sad),
        letter: letter_card(letter),
    }
}
