use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{send_json, text, RegistryError};
use crate::workflows::determination::{
    Contractor, CoveragePolicy, CoverageQuery, CoverageRegistry, SadExclusionSource, SadRecord,
};

const NCD_SERVICE: &str = "CMS NCD";
const LCD_SERVICE: &str = "CMS LCD";
const CONTRACTOR_SERVICE: &str = "CMS contractor";
const SAD_SERVICE: &str = "CMS SAD";

/// CMS Medicare Coverage Database search client. Answers NCD, LCD,
/// contractor, and SAD exclusion queries.
#[derive(Debug, Clone)]
pub struct CmsCoverageClient {
    client: reqwest::Client,
    base_url: String,
}

impl CmsCoverageClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn search_records(
        &self,
        service: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<Value>, RegistryError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("format", "json")]);
        let envelope: SearchEnvelope = send_json(service, request).await?;
        Ok(envelope.into_records())
    }
}

#[async_trait]
impl CoverageRegistry for CmsCoverageClient {
    async fn search(&self, query: &CoverageQuery) -> Result<Vec<CoveragePolicy>, RegistryError> {
        let records = match query {
            CoverageQuery::National {
                diagnosis,
                procedure,
            } => {
                let terms = format!("{diagnosis} {procedure}");
                self.search_records(NCD_SERVICE, &[("q", terms.as_str()), ("type", "NCD")])
                    .await?
            }
            CoverageQuery::Local { procedure, zip } => {
                self.search_records(
                    LCD_SERVICE,
                    &[("q", procedure.as_str()), ("type", "LCD"), ("zip", zip.as_str())],
                )
                .await?
            }
        };
        Ok(normalize_policies(records))
    }

    async fn contractor(&self, zip: &str) -> Result<Option<Contractor>, RegistryError> {
        let terms = format!("MAC {zip}");
        let records = self
            .search_records(
                CONTRACTOR_SERVICE,
                &[("q", terms.as_str()), ("type", "contractor")],
            )
            .await?;
        Ok(records.iter().find_map(normalize_contractor))
    }
}

#[async_trait]
impl SadExclusionSource for CmsCoverageClient {
    async fn search(&self, code: &str) -> Result<Vec<SadRecord>, RegistryError> {
        let terms = format!("SAD {code}");
        let records = self
            .search_records(SAD_SERVICE, &[("q", terms.as_str()), ("type", "SAD")])
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect())
    }
}

/// Search responses arrive wrapped in `data`, in `results`, or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchEnvelope {
    Data { data: Vec<Value> },
    Results { results: Vec<Value> },
    Bare(Vec<Value>),
}

impl SearchEnvelope {
    fn into_records(self) -> Vec<Value> {
        match self {
            SearchEnvelope::Data { data } => data,
            SearchEnvelope::Results { results } => results,
            SearchEnvelope::Bare(records) => records,
        }
    }
}

/// Current MCD record shape. LCD results also name their contractor.
#[derive(Debug, Deserialize)]
struct CurrentRecord {
    id: Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    covered: Option<Value>,
    #[serde(default)]
    criteria: Vec<String>,
    #[serde(default, alias = "docRequirements")]
    documentation_requirements: Vec<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "contractor_id")]
    mac_id: Option<Value>,
}

/// Older NCD export shape.
#[derive(Debug, Deserialize)]
struct LegacyNcdRecord {
    ncd_id: Value,
    #[serde(default, alias = "ncd_title", alias = "document_title")]
    title: Option<String>,
    #[serde(default, alias = "covered_indication")]
    covered: Option<Value>,
    #[serde(default, alias = "indications")]
    criteria: Vec<String>,
    #[serde(default, alias = "documentation")]
    documentation_requirements: Vec<String>,
    #[serde(default, alias = "ncd_url", alias = "document_url")]
    url: Option<String>,
}

/// Older LCD export shape.
#[derive(Debug, Deserialize)]
struct LegacyLcdRecord {
    lcd_id: Value,
    #[serde(default, alias = "lcd_title")]
    title: Option<String>,
    #[serde(default, alias = "contractor_id")]
    mac_id: Option<Value>,
    #[serde(default, alias = "coverage_indications")]
    criteria: Vec<String>,
    #[serde(default)]
    documentation_requirements: Vec<String>,
    #[serde(default, alias = "lcd_url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CoverageRecord {
    Current(CurrentRecord),
    LegacyNcd(LegacyNcdRecord),
    LegacyLcd(LegacyLcdRecord),
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn covered_flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(flag) => Some(*flag),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "covered" => Some(true),
            "n" | "no" | "false" | "not covered" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn titled(title: Option<String>, prefix: &str, id: &str) -> String {
    title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("{prefix} {id}"))
}

impl From<CoverageRecord> for CoveragePolicy {
    fn from(record: CoverageRecord) -> Self {
        match record {
            CoverageRecord::Current(r) => {
                let id = id_text(&r.id);
                CoveragePolicy {
                    title: titled(r.title, "Policy", &id),
                    id,
                    covered: covered_flag(r.covered.as_ref()),
                    criteria: r.criteria,
                    doc_requirements: r.documentation_requirements,
                    url: r.url,
                    contractor_id: r.mac_id.as_ref().map(id_text),
                }
            }
            CoverageRecord::LegacyNcd(r) => {
                let id = id_text(&r.ncd_id);
                CoveragePolicy {
                    title: titled(r.title, "NCD", &id),
                    id,
                    covered: covered_flag(r.covered.as_ref()),
                    criteria: r.criteria,
                    doc_requirements: r.documentation_requirements,
                    url: r.url,
                    contractor_id: None,
                }
            }
            CoverageRecord::LegacyLcd(r) => {
                let id = id_text(&r.lcd_id);
                CoveragePolicy {
                    title: titled(r.title, "LCD", &id),
                    id,
                    covered: None,
                    criteria: r.criteria,
                    doc_requirements: r.documentation_requirements,
                    url: r.url,
                    contractor_id: r.mac_id.as_ref().map(id_text),
                }
            }
        }
    }
}

fn normalize_policies(records: Vec<Value>) -> Vec<CoveragePolicy> {
    records
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<CoverageRecord>(raw) {
            Ok(record) => Some(CoveragePolicy::from(record)),
            Err(err) => {
                debug!(error = %err, "skipping unrecognized coverage record");
                None
            }
        })
        .collect()
}

fn normalize_contractor(record: &Value) -> Option<Contractor> {
    let id = record
        .get("id")
        .or_else(|| record.get("contractor_id"))
        .map(id_text)?;
    let name = text(record.get("name"))
        .or_else(|| text(record.get("contractor_name")))
        .unwrap_or_default();
    Some(Contractor {
        id,
        name,
        jurisdiction: text(record.get("jurisdiction")),
    })
}
