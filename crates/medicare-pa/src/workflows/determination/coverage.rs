use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::case::Case;
use super::error::DeterminationError;
use super::slot::Supervised;
use crate::registry::RegistryError;

/// Canonical coverage policy record, whatever the upstream field names were.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveragePolicy {
    pub id: String,
    pub title: String,
    pub covered: Option<bool>,
    pub criteria: Vec<String>,
    pub doc_requirements: Vec<String>,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageQuery {
    /// NCD search keyed by diagnosis and procedure.
    National { diagnosis: String, procedure: String },
    /// LCD search keyed by procedure and practice ZIP.
    Local { procedure: String, zip: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contractor {
    pub id: String,
    pub name: String,
    pub jurisdiction: Option<String>,
}

#[async_trait]
pub trait CoverageRegistry: Send + Sync {
    async fn search(&self, query: &CoverageQuery) -> Result<Vec<CoveragePolicy>, RegistryError>;

    /// Medicare Administrative Contractor serving a ZIP code.
    async fn contractor(&self, zip: &str) -> Result<Option<Contractor>, RegistryError>;
}

/// Outcome of one NCD or LCD search. Failures are carried, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageLookup {
    pub found: bool,
    pub results: Vec<CoveragePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CoverageLookup {
    fn from_registry(result: Result<Vec<CoveragePolicy>, RegistryError>) -> Self {
        match result {
            Ok(results) => Self {
                found: !results.is_empty(),
                results,
                error: None,
            },
            Err(err) => Self {
                found: false,
                results: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }

    pub fn first_title(&self) -> Option<&str> {
        self.results.first().map(|policy| policy.title.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorLookup {
    pub found: bool,
    pub contractor: Option<Contractor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn search_ncd(
    registry: &dyn CoverageRegistry,
    diagnosis: &str,
    procedure: &str,
) -> CoverageLookup {
    let query = CoverageQuery::National {
        diagnosis: diagnosis.to_string(),
        procedure: procedure.to_string(),
    };
    CoverageLookup::from_registry(registry.search(&query).await)
}

pub async fn search_lcd(registry: &dyn CoverageRegistry, procedure: &str, zip: &str) -> CoverageLookup {
    let query = CoverageQuery::Local {
        procedure: procedure.to_string(),
        zip: zip.to_string(),
    };
    CoverageLookup::from_registry(registry.search(&query).await)
}

pub async fn find_contractor(registry: &dyn CoverageRegistry, zip: &str) -> ContractorLookup {
    match registry.contractor(zip).await {
        Ok(contractor) => ContractorLookup {
            found: contractor.is_some(),
            contractor,
            error: None,
        },
        Err(err) => ContractorLookup {
            found: false,
            contractor: None,
            error: Some(err.to_string()),
        },
    }
}

/// Both coverage searches for a case. A `None` side means that search did not
/// produce a usable result; why is recorded in `errors`. Its sibling is
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageOutcome {
    pub ncd: Option<CoverageLookup>,
    pub lcd: Option<CoverageLookup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl CoverageOutcome {
    pub fn has_policy(&self) -> bool {
        [&self.ncd, &self.lcd]
            .into_iter()
            .flatten()
            .any(|lookup| lookup.found)
    }

    fn usable(
        side: &str,
        settled: Result<CoverageLookup, DeterminationError>,
        errors: &mut Vec<String>,
    ) -> Option<CoverageLookup> {
        let error = match settled {
            Ok(lookup) => match &lookup.error {
                Some(error) if lookup.results.is_empty() => error.clone(),
                _ => return Some(lookup),
            },
            Err(err) => err.to_string(),
        };
        debug!(side, error = %error, "coverage search failed");
        errors.push(format!("{side}: {error}"));
        None
    }
}

/// Runs the NCD and LCD searches side by side. The aggregate only fails when
/// neither side produced a usable result.
pub async fn evaluate_coverage(
    registry: Arc<dyn CoverageRegistry>,
    case: Arc<Case>,
    timeout: Duration,
) -> Result<CoverageOutcome, DeterminationError> {
    let ncd = {
        let registry = registry.clone();
        let case = case.clone();
        Supervised::spawn("NCD search", timeout, async move {
            Ok(search_ncd(
                registry.as_ref(),
                case.diagnosis.code.as_str(),
                &case.procedure_code,
            )
            .await)
        })
    };
    let lcd = Supervised::spawn("LCD search", timeout, async move {
        Ok(search_lcd(
            registry.as_ref(),
            &case.procedure_code,
            &case.provider.practice_zip,
        )
        .await)
    });

    let (ncd, lcd) = tokio::join!(ncd.settle(), lcd.settle());
    let mut errors = Vec::new();
    let ncd = CoverageOutcome::usable("NCD", ncd, &mut errors);
    let lcd = CoverageOutcome::usable("LCD", lcd, &mut errors);
    let outcome = CoverageOutcome { ncd, lcd, errors };

    if outcome.ncd.is_none() && outcome.lcd.is_none() {
        return Err(DeterminationError::Transport(
            "Coverage lookup failed".to_string(),
        ));
    }
    Ok(outcome)
}
