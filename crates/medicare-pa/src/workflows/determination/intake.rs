use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::error::DeterminationError;
use crate::identifiers::{Icd10Code, Npi};
use crate::registry::RegistryError;

const HEADER_CODE_NOTE: &str = "This is a header code. Use a more specific code for billing.";
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub npi: String,
    pub active: bool,
    pub name: String,
    pub credential: Option<String>,
    pub specialty: Option<String>,
    pub taxonomy_code: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
}

#[async_trait]
pub trait NpiRegistry: Send + Sync {
    async fn lookup(&self, npi: &Npi) -> Result<Option<ProviderRecord>, RegistryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Icd10Match {
    /// Dotted display form, e.g. `C34.90`.
    pub code: String,
    pub description: String,
}

/// ICD-10 code table. Results are ranked best match first.
#[async_trait]
pub trait Icd10Registry: Send + Sync {
    async fn search(&self, code: &Icd10Code) -> Result<Vec<Icd10Match>, RegistryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisVerification {
    pub code: String,
    pub valid: bool,
    /// `None` when the code table could not be reached.
    pub billable: Option<bool>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Icd10Match>,
}

/// Pre-submission checks for provider and diagnosis fields. Format problems
/// are raised before any registry is contacted.
#[derive(Clone)]
pub struct IntakeVerifier {
    npi: Arc<dyn NpiRegistry>,
    icd10: Arc<dyn Icd10Registry>,
}

impl IntakeVerifier {
    pub fn new(npi: Arc<dyn NpiRegistry>, icd10: Arc<dyn Icd10Registry>) -> Self {
        Self { npi, icd10 }
    }

    pub async fn verify_provider(&self, raw: &str) -> Result<ProviderRecord, DeterminationError> {
        let npi = Npi::parse(raw)?;
        match self.npi.lookup(&npi).await? {
            Some(record) => Ok(record),
            None => Err(DeterminationError::NotFound(format!(
                "NPI {npi} not found in NPPES registry"
            ))),
        }
    }

    pub async fn verify_diagnosis(
        &self,
        raw: &str,
    ) -> Result<DiagnosisVerification, DeterminationError> {
        let code = Icd10Code::parse(raw)?;
        let display = code.formatted();

        let matches = match self.icd10.search(&code).await {
            Ok(matches) => matches,
            Err(err) => {
                return Ok(DiagnosisVerification {
                    code: display,
                    valid: true,
                    billable: None,
                    description: None,
                    message: Some(format!("Could not verify code online: {err}")),
                    suggestions: Vec::new(),
                })
            }
        };

        let exact = matches
            .iter()
            .find(|candidate| candidate.code.replace('.', "").eq_ignore_ascii_case(code.as_str()));

        Ok(match exact {
            Some(found) => {
                let billable = code.is_billable();
                DiagnosisVerification {
                    code: found.code.clone(),
                    valid: true,
                    billable: Some(billable),
                    description: Some(found.description.clone()),
                    message: (!billable).then(|| HEADER_CODE_NOTE.to_string()),
                    suggestions: Vec::new(),
                }
            }
            None => DiagnosisVerification {
                code: display,
                valid: false,
                billable: Some(false),
                description: None,
                message: Some("Code not found in ICD-10-CM".to_string()),
                suggestions: matches.into_iter().take(MAX_SUGGESTIONS).collect(),
            },
        })
    }
}
