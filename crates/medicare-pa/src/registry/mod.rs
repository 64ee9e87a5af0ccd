//! HTTP adapters for the external registries.
//!
//! Each adapter implements one of the evaluator ports and owns the mapping
//! from that registry's wire shape to the canonical record types.

mod clinical_tables;
mod cms;
mod letter_service;
mod nppes;
mod stedi;

pub use clinical_tables::ClinicalTablesClient;
pub use cms::CmsCoverageClient;
pub use letter_service::LetterServiceClient;
pub use nppes::NppesClient;
pub use stedi::StediEligibilityClient;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::{RegistryConfig, SadSourceKind};
use crate::datasets::ReferenceCache;
use crate::workflows::determination::{
    CoverageRegistry, DatasetSadSource, EligibilityRegistry, Icd10Registry, LetterDrafter,
    NpiRegistry, SadExclusionSource,
};

const USER_AGENT: &str = concat!("medicare-pa/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{service} request failed: {message}")]
    Transport { service: String, message: String },
    #[error("{service} API error ({status})")]
    Status { service: String, status: u16 },
    #[error("{service} returned an unreadable response: {message}")]
    Decode { service: String, message: String },
    #[error("{service} is not configured")]
    NotConfigured { service: String },
}

impl RegistryError {
    pub(crate) fn transport(service: &str, err: reqwest::Error) -> Self {
        RegistryError::Transport {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

/// Sends a request and decodes a JSON body, mapping every failure onto
/// [`RegistryError`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, RegistryError> {
    let response = request
        .send()
        .await
        .map_err(|err| RegistryError::transport(service, err))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RegistryError::Status {
            service: service.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|err| RegistryError::transport(service, err))?;
    serde_json::from_slice(&body).map_err(|err| RegistryError::Decode {
        service: service.to_string(),
        message: err.to_string(),
    })
}

pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Concrete registry adapters wired from configuration.
#[derive(Clone)]
pub struct RegistryClients {
    pub eligibility: Arc<dyn EligibilityRegistry>,
    pub coverage: Arc<dyn CoverageRegistry>,
    pub sad: Arc<dyn SadExclusionSource>,
    pub npi: Arc<dyn NpiRegistry>,
    pub icd10: Arc<dyn Icd10Registry>,
    pub letter: Option<Arc<dyn LetterDrafter>>,
}

impl RegistryClients {
    pub fn from_config(
        config: &RegistryConfig,
        client: reqwest::Client,
        datasets: Arc<ReferenceCache>,
    ) -> Self {
        let coverage = Arc::new(CmsCoverageClient::new(
            client.clone(),
            config.coverage_base_url.clone(),
        ));
        let sad: Arc<dyn SadExclusionSource> = match config.sad_source {
            SadSourceKind::Registry => coverage.clone(),
            SadSourceKind::Dataset => Arc::new(DatasetSadSource::new(datasets)),
        };
        let letter = config.letter_service_url.as_ref().map(|url| {
            Arc::new(LetterServiceClient::new(
                client.clone(),
                url.clone(),
                config.letter_timeout,
            )) as Arc<dyn LetterDrafter>
        });

        Self {
            eligibility: Arc::new(StediEligibilityClient::new(
                client.clone(),
                config.eligibility_url.clone(),
                config.eligibility_api_key.clone(),
            )),
            coverage,
            sad,
            npi: Arc::new(NppesClient::new(client.clone(), config.nppes_base_url.clone())),
            icd10: Arc::new(ClinicalTablesClient::new(client, config.icd10_url.clone())),
            letter,
        }
    }
}

/// Non-empty trimmed string from an optional JSON string.
pub(crate) fn text(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
