use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medicare_pa::config::EvaluationSettings;
use medicare_pa::datasets::{DirectorySource, ReferenceCache};
use medicare_pa::registry::RegistryError;
use medicare_pa::workflows::determination::ncci::check_ptp;
use medicare_pa::workflows::determination::pa_required::check_pa_required;
use medicare_pa::workflows::determination::sad::check_sad_exclusion;
use medicare_pa::workflows::determination::{
    BillingRoute, CaseIntake, Contractor, CoveragePolicy, CoverageQuery, CoverageRegistry,
    DatasetSadSource, DeterminationOrchestrator, EligibilityRegistry, EligibilityRequest,
    EligibilityResponse, Evaluators, InsuranceType, PaDetermination, PlanStatus, SadStatus,
};

fn shipped_datasets() -> Arc<ReferenceCache> {
    let root = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data");
    Arc::new(ReferenceCache::new(Arc::new(DirectorySource::new(root))))
}

#[tokio::test]
async fn national_opd_code_requires_authorization_everywhere() {
    let datasets = shipped_datasets();
    let outcome = check_pa_required(&datasets, "64483", Some("AK"))
        .await
        .expect("dataset loads");

    assert_eq!(outcome.determination, PaDetermination::Required);
    assert_eq!(outcome.applicable_lists.len(), 1);
    assert_eq!(outcome.applicable_lists[0].name, "OPD Hospital Outpatient");
    assert_eq!(outcome.matches.len(), 2, "state-scoped rows are still reported");
}

#[tokio::test]
async fn wiser_code_depends_on_practice_state() {
    let datasets = shipped_datasets();

    let texas = check_pa_required(&datasets, "64561", Some("tx"))
        .await
        .expect("dataset loads");
    assert!(texas.required);

    let alaska = check_pa_required(&datasets, "64561", Some("AK"))
        .await
        .expect("dataset loads");
    assert_eq!(alaska.determination, PaDetermination::NotRequiredInState);
    assert!(alaska.message.starts_with("PA NOT REQUIRED in AK"));

    let unknown = check_pa_required(&datasets, "64561", None)
        .await
        .expect("dataset loads");
    assert!(unknown.required, "missing state keeps every list");
}

#[tokio::test]
async fn unlisted_code_needs_no_authorization() {
    let outcome = check_pa_required(&shipped_datasets(), "99213", Some("AK"))
        .await
        .expect("dataset loads");
    assert_eq!(outcome.determination, PaDetermination::NotListed);
    assert!(outcome.matches.is_empty());
}

#[tokio::test]
async fn chemotherapy_claim_reports_every_bundling_pair() {
    let table = shipped_datasets().ptp_edits().await.expect("dataset loads");
    let codes = ["96413", "96360", "36000"].map(String::from);

    let outcome = check_ptp(&table.edits, &codes);
    assert!(outcome.has_conflicts);
    assert_eq!(outcome.conflicts.len(), 2);

    let venous_access = outcome
        .conflicts
        .iter()
        .find(|conflict| conflict.code2 == "36000")
        .expect("venous access edit");
    assert!(!venous_access.modifier_allowed);
    assert!(outcome
        .conflicts
        .iter()
        .any(|conflict| conflict.code2 == "96360" && conflict.modifier_allowed));
}

#[tokio::test]
async fn sad_dataset_routes_self_administered_drugs_to_part_d() {
    let source = DatasetSadSource::new(shipped_datasets());

    let adalimumab = check_sad_exclusion(&source, "j0135").await.expect("checked");
    assert_eq!(adalimumab.status, SadStatus::Excluded);
    assert_eq!(adalimumab.billing_route, Some(BillingRoute::PartD));

    let pembrolizumab = check_sad_exclusion(&source, "J9271").await.expect("checked");
    assert_eq!(pembrolizumab.status, SadStatus::NotExcluded);
    assert_eq!(pembrolizumab.excluded, Some(false));
}

struct ActivePartB;

#[async_trait]
impl EligibilityRegistry for ActivePartB {
    async fn check(
        &self,
        _request: &EligibilityRequest,
    ) -> Result<EligibilityResponse, RegistryError> {
        Ok(EligibilityResponse {
            plan_status: Some(PlanStatus::Active),
            insurance_type: Some(InsuranceType::MedicarePartB),
            part_b: true,
            ..EligibilityResponse::default()
        })
    }
}

struct NoPolicies;

#[async_trait]
impl CoverageRegistry for NoPolicies {
    async fn search(&self, _query: &CoverageQuery) -> Result<Vec<CoveragePolicy>, RegistryError> {
        Ok(Vec::new())
    }

    async fn contractor(&self, _zip: &str) -> Result<Option<Contractor>, RegistryError> {
        Ok(None)
    }
}

#[tokio::test]
async fn oncology_case_runs_end_to_end_on_shipped_data() {
    let datasets = shipped_datasets();
    let orchestrator = DeterminationOrchestrator::new(
        Evaluators {
            datasets: datasets.clone(),
            eligibility: Arc::new(ActivePartB),
            coverage: Arc::new(NoPolicies),
            sad: Arc::new(DatasetSadSource::new(datasets)),
        },
        EvaluationSettings {
            evaluator_timeout: Duration::from_secs(5),
            cancel_on_medicare_advantage: false,
        },
    );

    let case = CaseIntake {
        mbi: "1EG4-TE5-MK73".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        dob: "1948-03-14".to_string(),
        npi: "1245319599".to_string(),
        practice_zip: "99508".to_string(),
        practice_state: Some("AK".to_string()),
        icd10: "C34.90".to_string(),
        cpt: "J9271".to_string(),
        additional_codes: vec!["96413".to_string()],
        ..CaseIntake::default()
    }
    .validate()
    .expect("valid case");

    let results = orchestrator.evaluate(Arc::new(case)).await;
    assert!(results.is_settled());
    assert!(results.eligibility.result().is_some_and(|e| e.eligible));
    assert_eq!(
        results.pa_required.result().map(|pa| pa.determination),
        Some(PaDetermination::NotListed)
    );

    let coverage = results.coverage.result().expect("empty searches are still results");
    assert!(!coverage.has_policy());

    let ncci = results.ncci.result().expect("ncci ran");
    assert_eq!(ncci.mue.as_ref().and_then(|mue| mue.mue_value), Some(400));
    assert!(ncci.ptp.as_ref().is_some_and(|ptp| !ptp.has_conflicts));

    assert_eq!(
        results.sad.result().map(|sad| sad.status),
        Some(SadStatus::NotExcluded)
    );
}
