use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::case::Case;
use super::coverage::CoverageLookup;
use super::orchestrator::DeterminationResults;
use crate::registry::RegistryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFacts {
    pub mbi: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFacts {
    pub npi: String,
    pub name: String,
    pub specialty: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFacts {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub pmid: String,
    pub title: String,
    #[serde(default)]
    pub journal: Option<String>,
}

/// Structured input for the external letter-drafting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterFacts {
    pub patient_info: PatientFacts,
    pub provider_info: ProviderFacts,
    pub icd10: CodeFacts,
    pub cpt: CodeFacts,
    pub ncd_text: String,
    pub lcd_text: String,
    pub clinical_summary: String,
    pub citations: Vec<Citation>,
}

impl LetterFacts {
    pub fn assemble(case: &Case, results: &DeterminationResults) -> Self {
        let coverage = results.coverage.result();
        let ncd_text = coverage
            .and_then(|outcome| outcome.ncd.as_ref())
            .and_then(CoverageLookup::first_title)
            .unwrap_or_default()
            .to_string();
        let lcd_text = coverage
            .and_then(|outcome| outcome.lcd.as_ref())
            .and_then(CoverageLookup::first_title)
            .unwrap_or_default()
            .to_string();

        Self {
            patient_info: PatientFacts {
                mbi: case.patient.mbi.formatted(),
                first_name: case.patient.first_name.clone(),
                last_name: case.patient.last_name.clone(),
                dob: case.patient.dob.format("%Y-%m-%d").to_string(),
            },
            provider_info: ProviderFacts {
                npi: case.provider.npi.as_str().to_string(),
                name: case
                    .provider
                    .name
                    .clone()
                    .unwrap_or_else(|| "Provider".to_string()),
                specialty: case.provider.specialty.clone().unwrap_or_default(),
                address: case.provider.address.clone().unwrap_or_default(),
            },
            icd10: CodeFacts {
                code: case.diagnosis.code.formatted(),
                description: case.diagnosis.description.clone().unwrap_or_default(),
            },
            cpt: CodeFacts {
                code: case.procedure_code.clone(),
                description: String::new(),
            },
            ncd_text,
            lcd_text,
            clinical_summary: case.clinical_summary.clone().unwrap_or_default(),
            citations: case.citations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLetter {
    pub letter_text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
}

/// External drafting service. Returned text is passed through untouched.
#[async_trait]
pub trait LetterDrafter: Send + Sync {
    async fn draft(&self, facts: &LetterFacts) -> Result<DraftLetter, RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LetterError {
    #[error("no case has been submitted")]
    NoCase,
    #[error("letter drafting service is not configured")]
    NotConfigured,
    #[error("letters are not drafted for Medicare Advantage patients")]
    MedicareAdvantage,
    #[error("case was replaced while the letter was drafting")]
    Superseded,
    #[error("letter drafting failed: {0}")]
    Drafting(#[from] RegistryError),
}
