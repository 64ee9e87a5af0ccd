use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::{send_json, text, RegistryError};
use crate::workflows::determination::{
    EligibilityRegistry, EligibilityRequest, EligibilityResponse, InsuranceType, PlanStatus,
};

const SERVICE: &str = "Eligibility API";
const TRADING_PARTNER: &str = "CMS";
/// X12 service type 30: health benefit plan coverage.
const SERVICE_TYPE_PLAN_COVERAGE: &str = "30";

/// Real-time 270/271 eligibility client.
#[derive(Debug, Clone)]
pub struct StediEligibilityClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl StediEligibilityClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityInquiry<'a> {
    control_number: String,
    trading_partner_service_id: &'static str,
    provider: InquiryProvider<'a>,
    subscriber: InquirySubscriber,
    encounter: InquiryEncounter,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InquiryProvider<'a> {
    organization_name: &'a str,
    npi: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InquirySubscriber {
    member_id: String,
    first_name: String,
    last_name: String,
    /// `YYYYMMDD`
    date_of_birth: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InquiryEncounter {
    service_type_codes: [&'static str; 1],
}

fn control_number() -> String {
    format!("{:09}", Utc::now().timestamp_millis().rem_euclid(1_000_000_000))
}

impl<'a> EligibilityInquiry<'a> {
    fn from_request(request: &'a EligibilityRequest) -> Self {
        Self {
            control_number: control_number(),
            trading_partner_service_id: TRADING_PARTNER,
            provider: InquiryProvider {
                organization_name: request.provider_name.as_deref().unwrap_or("Provider"),
                npi: request.provider_npi.as_str(),
            },
            subscriber: InquirySubscriber {
                member_id: request.mbi.as_str().to_string(),
                first_name: request.first_name.to_uppercase(),
                last_name: request.last_name.to_uppercase(),
                date_of_birth: request.dob.format("%Y%m%d").to_string(),
            },
            encounter: InquiryEncounter {
                service_type_codes: [SERVICE_TYPE_PLAN_COVERAGE],
            },
        }
    }
}

#[async_trait]
impl EligibilityRegistry for StediEligibilityClient {
    async fn check(
        &self,
        request: &EligibilityRequest,
    ) -> Result<EligibilityResponse, RegistryError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RegistryError::NotConfigured {
                service: SERVICE.to_string(),
            })?;

        let inquiry = EligibilityInquiry::from_request(request);
        let http = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, format!("Key {api_key}"))
            .json(&inquiry);
        let body: Value = send_json(SERVICE, http).await?;
        Ok(parse_271(&body))
    }
}

/// Reads a field from the top level first, then from `subscriber`.
fn field<'v>(body: &'v Value, name: &str) -> Option<&'v Value> {
    body.get(name)
        .filter(|v| !v.is_null())
        .or_else(|| body.get("subscriber").and_then(|s| s.get(name)))
        .filter(|v| !v.is_null())
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "y" | "yes" | "true" | "1"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn code(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        other => text(Some(other)),
    }
}

/// Maps a 271 reply onto [`EligibilityResponse`].
pub(crate) fn parse_271(body: &Value) -> EligibilityResponse {
    let insurance_type = code(field(body, "insuranceTypeCode")).map(|c| InsuranceType::from_code(&c));
    EligibilityResponse {
        plan_status: code(field(body, "planStatus")).map(|c| PlanStatus::from_code(&c)),
        part_a: flag(field(body, "partA")),
        part_b: flag(field(body, "partB")),
        part_a_effective: text(field(body, "partAEffective")),
        part_b_effective: text(field(body, "partBEffective")),
        secondary_payer: text(field(body, "secondaryPayer")),
        plan_name: text(field(body, "planName")).or_else(|| text(field(body, "payerName"))),
        insurance_type,
    }
}
