use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::EvaluationSettings;
use crate::datasets::{DatasetError, DatasetFormat, DatasetKind, DatasetSource, RawDataset, ReferenceCache};
use crate::identifiers::{Icd10Code, Npi};
use crate::registry::RegistryError;
use crate::workflows::determination::{
    Case, CaseIntake, Contractor, CoveragePolicy, CoverageQuery, CoverageRegistry,
    DeterminationOrchestrator, DeterminationService, DraftLetter, EligibilityRegistry,
    EligibilityRequest, EligibilityResponse, Evaluators, Icd10Match, Icd10Registry, InsuranceType,
    IntakeVerifier, LetterDrafter, LetterFacts, NpiRegistry, PlanStatus, ProviderRecord,
    SadExclusionSource, SadRecord, SessionStore,
};

pub(super) struct MemoryDatasets {
    payloads: HashMap<DatasetKind, serde_json::Value>,
}

#[async_trait]
impl DatasetSource for MemoryDatasets {
    async fn fetch(&self, kind: DatasetKind) -> Result<RawDataset, DatasetError> {
        let value = self.payloads.get(&kind).ok_or_else(|| DatasetError::Missing {
            kind,
            location: "memory".to_string(),
        })?;
        Ok(RawDataset {
            format: DatasetFormat::Json,
            bytes: serde_json::to_vec(value).expect("serialize dataset"),
        })
    }
}

pub(super) fn datasets() -> Arc<ReferenceCache> {
    let payloads = HashMap::from([
        (
            DatasetKind::PaRequiredCodes,
            json!({ "codes": [
                { "hcpcs": "64483", "list": "OPD Hospital Outpatient", "effectiveDate": "2023-07-01" },
                { "hcpcs": "J9271", "list": "WISeR Model", "effectiveDate": "2026-01-01", "states": ["WA", "AZ"] }
            ]}),
        ),
        (
            DatasetKind::PtpEdits,
            json!({ "edits": [
                { "col1": "96413", "col2": "J9271", "col1Desc": "Chemo IV infusion", "col2Desc": "Pembrolizumab",
                  "modifier": 1, "context": "oncology", "effectiveDate": "2024-01-01" },
                { "col1": "96413", "col2": "96360", "modifier": 0 }
            ]}),
        ),
        (
            DatasetKind::MueEdits,
            json!({ "edits": [
                { "cpt": "J9271", "mueValue": 100, "adjudicationType": "Date of Service Edit: Clinical" }
            ]}),
        ),
        (
            DatasetKind::SadList,
            json!({ "drugs": [ { "hcpcs": "J0135", "description": "Adalimumab" } ] }),
        ),
    ]);
    Arc::new(ReferenceCache::new(Arc::new(MemoryDatasets { payloads })))
}

pub(super) fn active_ffs() -> EligibilityResponse {
    EligibilityResponse {
        plan_status: Some(PlanStatus::Active),
        insurance_type: Some(InsuranceType::MedicarePartB),
        part_b: true,
        part_b_effective: Some("2013-04-01".to_string()),
        ..EligibilityResponse::default()
    }
}

pub(super) fn advantage() -> EligibilityResponse {
    EligibilityResponse {
        plan_status: Some(PlanStatus::Active),
        insurance_type: Some(InsuranceType::from_code("HM")),
        plan_name: Some("Sunrise Advantage PPO".to_string()),
        ..EligibilityResponse::default()
    }
}

type EligibilityScript =
    dyn Fn(&EligibilityRequest) -> (Duration, Result<EligibilityResponse, RegistryError>) + Send + Sync;

/// Eligibility double whose delay and reply are chosen per request.
pub(super) struct ScriptedEligibility {
    script: Box<EligibilityScript>,
}

impl ScriptedEligibility {
    pub(super) fn new<F>(script: F) -> Self
    where
        F: Fn(&EligibilityRequest) -> (Duration, Result<EligibilityResponse, RegistryError>)
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
        }
    }

    pub(super) fn replying(response: EligibilityResponse) -> Self {
        Self::new(move |_| (Duration::ZERO, Ok(response.clone())))
    }
}

#[async_trait]
impl EligibilityRegistry for ScriptedEligibility {
    async fn check(
        &self,
        request: &EligibilityRequest,
    ) -> Result<EligibilityResponse, RegistryError> {
        let (delay, reply) = (self.script)(request);
        tokio::time::sleep(delay).await;
        reply
    }
}

pub(super) fn policy(id: &str, title: &str) -> CoveragePolicy {
    CoveragePolicy {
        id: id.to_string(),
        title: title.to_string(),
        covered: Some(true),
        ..CoveragePolicy::default()
    }
}

pub(super) fn outage(service: &str) -> RegistryError {
    RegistryError::Status {
        service: service.to_string(),
        status: 503,
    }
}

pub(super) struct FakeCoverage {
    pub(super) ncd: Result<Vec<CoveragePolicy>, RegistryError>,
    pub(super) lcd: Result<Vec<CoveragePolicy>, RegistryError>,
    pub(super) delay: Duration,
}

impl Default for FakeCoverage {
    fn default() -> Self {
        Self {
            ncd: Ok(vec![policy("110.17", "Anti-Cancer Chemotherapy for Colorectal Cancer")]),
            lcd: Ok(vec![policy("L35396", "Biomarkers for Oncology")]),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl CoverageRegistry for FakeCoverage {
    async fn search(&self, query: &CoverageQuery) -> Result<Vec<CoveragePolicy>, RegistryError> {
        tokio::time::sleep(self.delay).await;
        match query {
            CoverageQuery::National { .. } => self.ncd.clone(),
            CoverageQuery::Local { .. } => self.lcd.clone(),
        }
    }

    async fn contractor(&self, _zip: &str) -> Result<Option<Contractor>, RegistryError> {
        Ok(Some(Contractor {
            id: "02102".to_string(),
            name: "Noridian Healthcare Solutions".to_string(),
            jurisdiction: Some("JF".to_string()),
        }))
    }
}

#[derive(Default)]
pub(super) struct FakeSad {
    pub(super) excluded: Vec<&'static str>,
    pub(super) delay: Duration,
}

#[async_trait]
impl SadExclusionSource for FakeSad {
    async fn search(&self, code: &str) -> Result<Vec<SadRecord>, RegistryError> {
        tokio::time::sleep(self.delay).await;
        Ok(self
            .excluded
            .iter()
            .filter(|c| **c == code)
            .map(|c| SadRecord {
                hcpcs: Some(c.to_string()),
                ..SadRecord::default()
            })
            .collect())
    }
}

pub(super) struct FakeNpi;

#[async_trait]
impl NpiRegistry for FakeNpi {
    async fn lookup(&self, npi: &Npi) -> Result<Option<ProviderRecord>, RegistryError> {
        if npi.as_str() != "1245319599" {
            return Ok(None);
        }
        Ok(Some(ProviderRecord {
            npi: npi.as_str().to_string(),
            active: true,
            name: "ANA RIVERA".to_string(),
            credential: Some("MD".to_string()),
            specialty: Some("Medical Oncology".to_string()),
            taxonomy_code: Some("207RX0202X".to_string()),
            state: Some("AK".to_string()),
            address: Some("3200 PROVIDENCE DR, ANCHORAGE, AK 99508".to_string()),
        }))
    }
}

#[derive(Default)]
pub(super) struct FakeIcd10 {
    pub(super) down: bool,
}

#[async_trait]
impl Icd10Registry for FakeIcd10 {
    async fn search(&self, code: &Icd10Code) -> Result<Vec<Icd10Match>, RegistryError> {
        if self.down {
            return Err(outage("ICD-10 lookup"));
        }
        let table = [
            ("C34.90", "Malignant neoplasm of unspecified part of unspecified bronchus or lung"),
            ("C34.91", "Malignant neoplasm of unspecified part of right bronchus or lung"),
            ("C34.92", "Malignant neoplasm of unspecified part of left bronchus or lung"),
            ("C34.1", "Malignant neoplasm of upper lobe, bronchus or lung"),
            ("C34", "Malignant neoplasm of bronchus and lung"),
        ];
        let prefix = &code.as_str()[..3];
        Ok(table
            .iter()
            .filter(|(c, _)| c.starts_with(prefix))
            .map(|(c, d)| Icd10Match {
                code: c.to_string(),
                description: d.to_string(),
            })
            .collect())
    }
}

/// Drafter that records every bundle it receives.
#[derive(Default)]
pub(super) struct RecordingDrafter {
    pub(super) calls: AtomicUsize,
    pub(super) delay: Duration,
    pub(super) bundles: std::sync::Mutex<Vec<LetterFacts>>,
}

impl RecordingDrafter {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LetterDrafter for RecordingDrafter {
    async fn draft(&self, facts: &LetterFacts) -> Result<DraftLetter, RegistryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.bundles.lock().expect("bundle lock").push(facts.clone());
        tokio::time::sleep(self.delay).await;
        Ok(DraftLetter {
            letter_text: format!("Draft {call} for {}", facts.cpt.code),
            model: Some("drafting-model".to_string()),
            usage: None,
        })
    }
}

pub(super) fn intake() -> CaseIntake {
    CaseIntake {
        mbi: "1EG4-TE5-MK73".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        dob: "1948-03-14".to_string(),
        npi: "1245319599".to_string(),
        provider_name: Some("Ana Rivera".to_string()),
        provider_specialty: Some("Medical Oncology".to_string()),
        practice_zip: "99508".to_string(),
        practice_state: Some("AK".to_string()),
        icd10: "C34.90".to_string(),
        icd10_description: Some("Malignant neoplasm of lung".to_string()),
        cpt: "J9271".to_string(),
        additional_codes: vec!["96413".to_string()],
        clinical_summary: Some("Stage IV NSCLC, PD-L1 TPS 60%.".to_string()),
        ..CaseIntake::default()
    }
}

pub(super) fn case() -> Case {
    intake().validate().expect("fixture case is valid")
}

pub(super) fn settings() -> EvaluationSettings {
    EvaluationSettings {
        evaluator_timeout: Duration::from_secs(2),
        cancel_on_medicare_advantage: false,
    }
}

pub(super) fn orchestrator_with(
    eligibility: impl EligibilityRegistry + 'static,
    coverage: FakeCoverage,
    sad: FakeSad,
    settings: EvaluationSettings,
) -> Arc<DeterminationOrchestrator> {
    Arc::new(DeterminationOrchestrator::new(
        Evaluators {
            datasets: datasets(),
            eligibility: Arc::new(eligibility),
            coverage: Arc::new(coverage),
            sad: Arc::new(sad),
        },
        settings,
    ))
}

pub(super) fn orchestrator() -> Arc<DeterminationOrchestrator> {
    orchestrator_with(
        ScriptedEligibility::replying(active_ffs()),
        FakeCoverage::default(),
        FakeSad::default(),
        settings(),
    )
}

pub(super) fn service_with(
    orchestrator: Arc<DeterminationOrchestrator>,
    drafter: Option<Arc<dyn LetterDrafter>>,
) -> Arc<DeterminationService> {
    Arc::new(DeterminationService::new(
        orchestrator.clone(),
        SessionStore::new(orchestrator, drafter),
        IntakeVerifier::new(Arc::new(FakeNpi), Arc::new(FakeIcd10::default())),
    ))
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
