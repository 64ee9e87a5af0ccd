use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::DeterminationError;
use super::letter::Citation;
use crate::identifiers::{Icd10Code, Mbi, Npi};

/// Raw intake form as submitted by the front end. Nothing here is trusted until
/// [`CaseIntake::validate`] turns it into a [`Case`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseIntake {
    pub mbi: String,
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub dob: String,
    pub npi: String,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub provider_specialty: Option<String>,
    #[serde(default)]
    pub provider_address: Option<String>,
    pub practice_zip: String,
    #[serde(default)]
    pub practice_state: Option<String>,
    pub icd10: String,
    #[serde(default)]
    pub icd10_description: Option<String>,
    pub cpt: String,
    #[serde(default)]
    pub additional_codes: Vec<String>,
    #[serde(default)]
    pub place_of_service: Option<String>,
    #[serde(default)]
    pub clinical_summary: Option<String>,
    /// Literature references forwarded to the letter drafter.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentity {
    pub mbi: Mbi,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderIdentity {
    pub npi: Npi,
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub address: Option<String>,
    pub practice_zip: String,
    pub practice_state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub code: Icd10Code,
    pub description: Option<String>,
}

/// One validated evaluation request. Immutable once handed to the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub patient: PatientIdentity,
    pub provider: ProviderIdentity,
    pub diagnosis: Diagnosis,
    pub procedure_code: String,
    pub additional_procedure_codes: Vec<String>,
    pub place_of_service: Option<String>,
    pub clinical_summary: Option<String>,
    pub citations: Vec<Citation>,
}

impl Case {
    /// Every procedure code proposed for the claim, primary code first.
    pub fn claim_codes(&self) -> Vec<String> {
        std::iter::once(self.procedure_code.clone())
            .chain(self.additional_procedure_codes.iter().cloned())
            .collect()
    }
}

pub(crate) fn clean_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CaseIntake {
    /// Intake gate: first failing field wins and no evaluator is started.
    pub fn validate(self) -> Result<Case, DeterminationError> {
        let mbi = Mbi::parse(&self.mbi)?;
        let npi = Npi::parse(&self.npi)?;
        let diagnosis = Icd10Code::parse(&self.icd10)?;

        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(DeterminationError::Format(
                "Patient first and last name are required".to_string(),
            ));
        }

        let dob = NaiveDate::parse_from_str(self.dob.trim(), "%Y-%m-%d").map_err(|_| {
            DeterminationError::Format(format!(
                "Date of birth '{}' must be YYYY-MM-DD",
                self.dob.trim()
            ))
        })?;

        let procedure_code = clean_code(&self.cpt);
        if procedure_code.is_empty() {
            return Err(DeterminationError::Format(
                "No procedure code provided".to_string(),
            ));
        }

        let practice_zip = self.practice_zip.trim().to_string();
        if practice_zip.len() != 5 || !practice_zip.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeterminationError::Format(
                "Practice ZIP must be 5 digits".to_string(),
            ));
        }

        let practice_state = non_blank(self.practice_state).map(|s| s.to_ascii_uppercase());
        if let Some(state) = &practice_state {
            if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(DeterminationError::Format(format!(
                    "Practice state '{state}' must be a two-letter abbreviation"
                )));
            }
        }

        let additional_procedure_codes = self
            .additional_codes
            .iter()
            .map(|code| clean_code(code))
            .filter(|code| !code.is_empty())
            .collect();

        Ok(Case {
            patient: PatientIdentity {
                mbi,
                first_name,
                last_name,
                dob,
            },
            provider: ProviderIdentity {
                npi,
                name: non_blank(self.provider_name),
                specialty: non_blank(self.provider_specialty),
                address: non_blank(self.provider_address),
                practice_zip,
                practice_state,
            },
            diagnosis: Diagnosis {
                code: diagnosis,
                description: non_blank(self.icd10_description),
            },
            procedure_code,
            additional_procedure_codes,
            place_of_service: non_blank(self.place_of_service),
            clinical_summary: non_blank(self.clinical_summary),
            citations: self.citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake() -> CaseIntake {
        CaseIntake {
            mbi: "1EG4-TE5-MK73".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            dob: "1948-03-14".to_string(),
            npi: "1234567893".to_string(),
            practice_zip: "99501".to_string(),
            practice_state: Some(" ak ".to_string()),
            icd10: "c34.90".to_string(),
            cpt: " j9271 ".to_string(),
            additional_codes: vec!["96413".to_string(), "  ".to_string()],
            ..CaseIntake::default()
        }
    }

    #[test]
    fn validate_normalizes_codes_and_state() {
        let case = intake().validate().expect("valid intake");
        assert_eq!(case.procedure_code, "J9271");
        assert_eq!(case.provider.practice_state.as_deref(), Some("AK"));
        assert_eq!(case.diagnosis.code.formatted(), "C34.90");
        assert_eq!(case.claim_codes(), vec!["J9271", "96413"]);
    }

    #[test]
    fn validate_fails_fast_on_identifier_errors() {
        let mut bad_mbi = intake();
        bad_mbi.mbi = "1SG4TE5MK73".to_string();
        assert!(matches!(
            bad_mbi.validate(),
            Err(DeterminationError::Format(_))
        ));

        let mut bad_npi = intake();
        bad_npi.npi = "1234567890".to_string();
        assert!(matches!(
            bad_npi.validate(),
            Err(DeterminationError::Checksum(_))
        ));
    }

    #[test]
    fn validate_rejects_missing_procedure_and_bad_zip() {
        let mut no_code = intake();
        no_code.cpt = "   ".to_string();
        assert_eq!(
            no_code.validate().unwrap_err(),
            DeterminationError::Format("No procedure code provided".to_string())
        );

        let mut bad_zip = intake();
        bad_zip.practice_zip = "9950".to_string();
        assert!(bad_zip.validate().is_err());

        let mut bad_dob = intake();
        bad_dob.dob = "03/14/1948".to_string();
        assert!(bad_dob.validate().is_err());
    }
}
