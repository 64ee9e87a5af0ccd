use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::case::clean_code;
use super::error::DeterminationError;
use crate::datasets::{DatasetKind, ReferenceCache};
use crate::registry::RegistryError;

/// One record returned by an exclusion-list search. Upstream rows name the
/// code either `hcpcs` or `code`; everything else is kept for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SadRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcpcs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl SadRecord {
    pub fn matches(&self, code: &str) -> bool {
        [self.hcpcs.as_deref(), self.code.as_deref()]
            .into_iter()
            .flatten()
            .any(|value| value.trim().eq_ignore_ascii_case(code))
    }
}

#[async_trait]
pub trait SadExclusionSource: Send + Sync {
    async fn search(&self, code: &str) -> Result<Vec<SadRecord>, RegistryError>;
}

/// Exclusion lookups answered from the cached SAD list dataset.
#[derive(Debug, Clone)]
pub struct DatasetSadSource {
    datasets: Arc<ReferenceCache>,
}

impl DatasetSadSource {
    pub fn new(datasets: Arc<ReferenceCache>) -> Self {
        Self { datasets }
    }
}

#[async_trait]
impl SadExclusionSource for DatasetSadSource {
    async fn search(&self, code: &str) -> Result<Vec<SadRecord>, RegistryError> {
        let table = self
            .datasets
            .sad_list()
            .await
            .map_err(|err| RegistryError::Transport {
                service: DatasetKind::SadList.to_string(),
                message: err.to_string(),
            })?;

        Ok(table
            .drugs
            .iter()
            .filter(|entry| entry.hcpcs.trim().eq_ignore_ascii_case(code))
            .map(|entry| {
                let mut details = serde_json::Map::new();
                if let Some(description) = &entry.description {
                    details.insert("description".into(), description.clone().into());
                }
                if let Some(contractor) = &entry.contractor {
                    details.insert("contractor".into(), contractor.clone().into());
                }
                if let Some(effective) = &entry.effective_date {
                    details.insert("effectiveDate".into(), effective.clone().into());
                }
                SadRecord {
                    hcpcs: Some(entry.hcpcs.clone()),
                    code: None,
                    details,
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SadStatus {
    NotApplicable,
    Excluded,
    NotExcluded,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BillingRoute {
    #[serde(rename = "partB")]
    PartB,
    #[serde(rename = "partD")]
    PartD,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SadOutcome {
    pub code: String,
    pub status: SadStatus,
    /// `null` when the lookup was inconclusive.
    pub excluded: Option<bool>,
    pub billing_route: Option<BillingRoute>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<SadRecord>,
}

/// Drug and biological codes: `J` or `Q` followed by exactly four digits.
pub fn is_drug_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 5
        && matches!(bytes[0], b'J' | b'Q')
        && bytes[1..].iter().all(u8::is_ascii_digit)
}

async fn lookup_exclusion(
    source: &dyn SadExclusionSource,
    code: &str,
) -> Result<Option<SadRecord>, DeterminationError> {
    let records = source.search(code).await.map_err(|err| {
        DeterminationError::UnknownState(format!("SAD check failed: {err}"))
    })?;
    Ok(records.into_iter().find(|record| record.matches(code)))
}

pub async fn check_sad_exclusion(
    source: &dyn SadExclusionSource,
    code: &str,
) -> Result<SadOutcome, DeterminationError> {
    let code = clean_code(code);
    if code.is_empty() {
        return Err(DeterminationError::Format(
            "HCPCS code is required".to_string(),
        ));
    }

    if !is_drug_code(&code) {
        return Ok(SadOutcome {
            message: format!(
                "Code {code} is not a drug/biological code. SAD exclusion check not applicable."
            ),
            code,
            status: SadStatus::NotApplicable,
            excluded: Some(false),
            billing_route: Some(BillingRoute::PartB),
            error: None,
            details: None,
        });
    }

    let outcome = match lookup_exclusion(source, &code).await {
        Ok(Some(record)) => SadOutcome {
            message: format!(
                "EXCLUDED: Code {code} is on the CMS Self-Administered Drug exclusion list. Bill under Part D, not Part B."
            ),
            code,
            status: SadStatus::Excluded,
            excluded: Some(true),
            billing_route: Some(BillingRoute::PartD),
            error: None,
            details: Some(record),
        },
        Ok(None) => SadOutcome {
            message: format!(
                "NOT EXCLUDED: Code {code} is not on the SAD list. Eligible for Part B billing."
            ),
            code,
            status: SadStatus::NotExcluded,
            excluded: Some(false),
            billing_route: Some(BillingRoute::PartB),
            error: None,
            details: None,
        },
        Err(err) => SadOutcome {
            message: "Could not verify SAD status. Check manually.".to_string(),
            code,
            status: SadStatus::Unknown,
            excluded: None,
            billing_route: None,
            error: Some(err.to_string()),
            details: None,
        },
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ListSource {
        excluded: Vec<&'static str>,
        down: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SadExclusionSource for ListSource {
        async fn search(&self, code: &str) -> Result<Vec<SadRecord>, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down {
                return Err(RegistryError::Status {
                    service: "CMS SAD".to_string(),
                    status: 503,
                });
            }
            Ok(self
                .excluded
                .iter()
                .filter(|c| **c == code)
                .map(|c| SadRecord {
                    code: Some(c.to_string()),
                    ..SadRecord::default()
                })
                .collect())
        }
    }

    #[test]
    fn record_matches_on_either_code_field() {
        let record = SadRecord {
            hcpcs: Some(String::new()),
            code: Some("J9999".to_string()),
            ..SadRecord::default()
        };
        assert!(record.matches("J9999"));

        let record = SadRecord {
            hcpcs: Some("J0135".to_string()),
            code: Some("J9999".to_string()),
            ..SadRecord::default()
        };
        assert!(record.matches("J0135"));
        assert!(record.matches("J9999"));
        assert!(!SadRecord::default().matches("J9999"));
    }

    #[test]
    fn drug_code_pattern() {
        assert!(is_drug_code("J9271"));
        assert!(is_drug_code("Q5101"));
        assert!(!is_drug_code("99213"));
        assert!(!is_drug_code("J92710"));
        assert!(!is_drug_code("A9271"));
    }

    #[tokio::test]
    async fn non_drug_code_skips_lookup() {
        let source = ListSource::default();
        let outcome = check_sad_exclusion(&source, "99213").await.expect("evaluates");
        assert_eq!(outcome.status, SadStatus::NotApplicable);
        assert_eq!(outcome.billing_route, Some(BillingRoute::PartB));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listed_drug_bills_under_part_d() {
        let source = ListSource {
            excluded: vec!["J9999"],
            ..ListSource::default()
        };
        let outcome = check_sad_exclusion(&source, "j9999").await.expect("evaluates");
        assert_eq!(outcome.status, SadStatus::Excluded);
        assert_eq!(outcome.excluded, Some(true));
        assert_eq!(outcome.billing_route, Some(BillingRoute::PartD));
    }

    #[tokio::test]
    async fn unlisted_drug_bills_under_part_b() {
        let source = ListSource {
            excluded: vec!["J9999"],
            ..ListSource::default()
        };
        let outcome = check_sad_exclusion(&source, "J0000").await.expect("evaluates");
        assert_eq!(outcome.status, SadStatus::NotExcluded);
        assert_eq!(outcome.excluded, Some(false));
    }

    #[tokio::test]
    async fn registry_outage_is_unknown_not_false() {
        let source = ListSource {
            down: true,
            ..ListSource::default()
        };
        let outcome = check_sad_exclusion(&source, "J9999").await.expect("evaluates");
        assert_eq!(outcome.status, SadStatus::Unknown);
        assert_eq!(outcome.excluded, None);
        assert_eq!(outcome.billing_route, None);

        let json = serde_json::to_value(&outcome).expect("serialize");
        assert!(json["excluded"].is_null());
        assert!(json["error"]
            .as_str()
            .expect("error text")
            .starts_with("SAD check failed"));
    }
}
