//! Prior-authorization determination pipeline.
//!
//! A validated [`Case`] fans out to five independent evaluators (eligibility,
//! PA-required lists, NCD/LCD coverage, NCCI edits, SAD exclusions). Each
//! evaluator owns one result slot; failures stay inside that slot. The
//! dashboard layer then applies the Medicare Advantage display gate.

pub mod case;
pub mod coverage;
pub mod dashboard;
pub mod eligibility;
pub mod error;
pub mod intake;
pub mod letter;
pub mod ncci;
pub mod orchestrator;
pub mod pa_required;
pub mod router;
pub mod sad;
pub mod session;
pub mod slot;

#[cfg(test)]
mod tests;

pub use case::{Case, CaseIntake};
pub use coverage::{
    Contractor, ContractorLookup, CoverageLookup, CoverageOutcome, CoveragePolicy, CoverageQuery,
    CoverageRegistry,
};
pub use dashboard::{
    render_dashboard, CaseHeader, CheckCard, CheckStatus, DashboardView, LetterCard,
};
pub use eligibility::{
    EligibilityOutcome, EligibilityRegistry, EligibilityRequest, EligibilityResponse,
    InsuranceType, MedicarePart, PayerType, PlanStatus,
};
pub use error::DeterminationError;
pub use intake::{
    DiagnosisVerification, Icd10Match, Icd10Registry, IntakeVerifier, NpiRegistry, ProviderRecord,
};
pub use letter::{Citation, DraftLetter, LetterDrafter, LetterError, LetterFacts};
pub use ncci::{MueOutcome, NcciOutcome, PtpConflict, PtpOutcome};
pub use orchestrator::{
    DeterminationOrchestrator, DeterminationResults, EvaluationRound, Evaluators, SlotUpdate,
};
pub use pa_required::{PaDetermination, PaRequiredOutcome};
pub use router::{determination_router, DeterminationService};
pub use sad::{BillingRoute, DatasetSadSource, SadExclusionSource, SadOutcome, SadRecord, SadStatus};
pub use session::{CaseSession, LetterState, SessionSnapshot, SessionStore};
pub use slot::{EvaluationSlot, EvaluatorKind};
