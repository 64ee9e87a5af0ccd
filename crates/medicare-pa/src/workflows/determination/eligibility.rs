use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use super::case::Case;
use super::error::DeterminationError;
use crate::identifiers::{Mbi, Npi};
use crate::registry::RegistryError;

/// Plan status reported by the 271 response. Kept apart from
/// [`InsuranceType`] even though both use short alphanumeric codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Inactive,
    Other(String),
}

impl PlanStatus {
    pub fn from_code(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "1" || raw.eq_ignore_ascii_case("active") {
            PlanStatus::Active
        } else if raw == "6" || raw.eq_ignore_ascii_case("inactive") {
            PlanStatus::Inactive
        } else {
            PlanStatus::Other(raw.to_string())
        }
    }
}

/// X12 insurance type code. Only `MA` (Part A) and `MB` (Part B) denote
/// Original Medicare; anything else is treated as a Medicare Advantage plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceType {
    MedicarePartA,
    MedicarePartB,
    Other(String),
}

impl InsuranceType {
    pub fn from_code(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MA" => InsuranceType::MedicarePartA,
            "MB" => InsuranceType::MedicarePartB,
            other => InsuranceType::Other(other.to_string()),
        }
    }

    pub fn is_original_medicare(&self) -> bool {
        !matches!(self, InsuranceType::Other(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayerType {
    #[serde(rename = "FFS")]
    FeeForService,
    #[serde(rename = "MA")]
    MedicareAdvantage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MedicarePart {
    A,
    B,
}

/// Canonical eligibility reply, produced by the registry adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityResponse {
    pub plan_status: Option<PlanStatus>,
    pub insurance_type: Option<InsuranceType>,
    pub part_a: bool,
    pub part_b: bool,
    pub part_a_effective: Option<String>,
    pub part_b_effective: Option<String>,
    pub secondary_payer: Option<String>,
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityRequest {
    pub mbi: Mbi,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub provider_npi: Npi,
    pub provider_name: Option<String>,
}

impl EligibilityRequest {
    pub fn for_case(case: &Case) -> Self {
        Self {
            mbi: case.patient.mbi.clone(),
            first_name: case.patient.first_name.clone(),
            last_name: case.patient.last_name.clone(),
            dob: case.patient.dob,
            provider_npi: case.provider.npi.clone(),
            provider_name: case.provider.name.clone(),
        }
    }
}

/// 270/271 eligibility lookup.
#[async_trait]
pub trait EligibilityRegistry: Send + Sync {
    async fn check(
        &self,
        request: &EligibilityRequest,
    ) -> Result<EligibilityResponse, RegistryError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveDates {
    pub part_a: Option<String>,
    pub part_b: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityOutcome {
    pub eligible: bool,
    pub payer_type: PayerType,
    pub parts: Vec<MedicarePart>,
    pub effective_dates: EffectiveDates,
    pub secondary_payer: Option<String>,
    pub ma_plan_name: Option<String>,
}

impl EligibilityOutcome {
    pub fn is_medicare_advantage(&self) -> bool {
        self.payer_type == PayerType::MedicareAdvantage
    }
}

pub fn classify(response: &EligibilityResponse) -> EligibilityOutcome {
    let eligible = matches!(response.plan_status, Some(PlanStatus::Active));

    let payer_type = match &response.insurance_type {
        Some(kind) if !kind.is_original_medicare() => PayerType::MedicareAdvantage,
        _ => PayerType::FeeForService,
    };

    let mut parts = Vec::new();
    if response.part_a || response.insurance_type == Some(InsuranceType::MedicarePartA) {
        parts.push(MedicarePart::A);
    }
    if response.part_b || response.insurance_type == Some(InsuranceType::MedicarePartB) {
        parts.push(MedicarePart::B);
    }
    if eligible && parts.is_empty() {
        parts = vec![MedicarePart::A, MedicarePart::B];
    }

    let ma_plan_name = match payer_type {
        PayerType::MedicareAdvantage => response.plan_name.clone(),
        PayerType::FeeForService => None,
    };

    EligibilityOutcome {
        eligible,
        payer_type,
        parts,
        effective_dates: EffectiveDates {
            part_a: response.part_a_effective.clone(),
            part_b: response.part_b_effective.clone(),
        },
        secondary_payer: response.secondary_payer.clone(),
        ma_plan_name,
    }
}

pub async fn check_eligibility(
    registry: &dyn EligibilityRegistry,
    case: &Case,
) -> Result<EligibilityOutcome, DeterminationError> {
    let request = EligibilityRequest::for_case(case);
    let response = registry.check(&request).await?;
    Ok(classify(&response))
}
