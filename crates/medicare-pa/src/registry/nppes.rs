use async_trait::async_trait;
use serde::Deserialize;

use super::{send_json, RegistryError};
use crate::identifiers::Npi;
use crate::workflows::determination::{NpiRegistry, ProviderRecord};

const SERVICE: &str = "NPPES";
const API_VERSION: &str = "2.1";

/// NPPES NPI registry client.
#[derive(Debug, Clone)]
pub struct NppesClient {
    client: reqwest::Client,
    base_url: String,
}

impl NppesClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl NpiRegistry for NppesClient {
    async fn lookup(&self, npi: &Npi) -> Result<Option<ProviderRecord>, RegistryError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("number", npi.as_str()), ("version", API_VERSION)]);
        let response: NppesResponse = send_json(SERVICE, request).await?;
        Ok(response
            .results
            .into_iter()
            .next()
            .map(|result| result.into_record(npi)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct NppesResponse {
    #[serde(default)]
    results: Vec<NppesResult>,
}

#[derive(Debug, Default, Deserialize)]
struct NppesResult {
    #[serde(default)]
    enumeration_type: Option<String>,
    #[serde(default)]
    basic: NppesBasic,
    #[serde(default)]
    taxonomies: Vec<NppesTaxonomy>,
    #[serde(default)]
    addresses: Vec<NppesAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NppesBasic {
    #[serde(default)]
    organization_name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    credential: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NppesTaxonomy {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Default, Deserialize)]
struct NppesAddress {
    #[serde(default)]
    address_purpose: Option<String>,
    #[serde(default)]
    address_1: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
}

impl NppesAddress {
    /// `"123 Main St, Anchorage, AK 99501"`, ZIP truncated to five digits.
    fn display(&self) -> String {
        let zip: String = self
            .postal_code
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(5)
            .collect();
        format!(
            "{}, {}, {} {}",
            self.address_1.as_deref().unwrap_or_default(),
            self.city.as_deref().unwrap_or_default(),
            self.state.as_deref().unwrap_or_default(),
            zip
        )
        .trim()
        .to_string()
    }
}

impl NppesResult {
    fn into_record(self, npi: &Npi) -> ProviderRecord {
        let is_organization = self.enumeration_type.as_deref() == Some("NPI-2");
        let name = if is_organization {
            self.basic.organization_name.clone().unwrap_or_default()
        } else {
            [self.basic.first_name.as_deref(), self.basic.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        };

        let taxonomy = self
            .taxonomies
            .iter()
            .find(|t| t.primary)
            .or_else(|| self.taxonomies.first());
        let address = self
            .addresses
            .iter()
            .find(|a| a.address_purpose.as_deref() == Some("LOCATION"))
            .or_else(|| self.addresses.first());

        ProviderRecord {
            npi: npi.as_str().to_string(),
            active: self.basic.status.as_deref() == Some("A"),
            name,
            credential: self.basic.credential.clone(),
            specialty: taxonomy.and_then(|t| t.desc.clone()),
            taxonomy_code: taxonomy.and_then(|t| t.code.clone()),
            state: taxonomy
                .and_then(|t| t.state.clone())
                .or_else(|| address.and_then(|a| a.state.clone())),
            address: address.map(NppesAddress::display),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn npi() -> Npi {
        Npi::parse("1245319599").expect("valid npi")
    }

    #[test]
    fn individual_provider_uses_primary_taxonomy_and_location_address() {
        let response: NppesResponse = serde_json::from_value(json!({
            "result_count": 1,
            "results": [{
                "enumeration_type": "NPI-1",
                "basic": { "first_name": "ANA", "last_name": "RIVERA", "credential": "MD", "status": "A" },
                "taxonomies": [
                    { "code": "207R00000X", "desc": "Internal Medicine", "state": "WA", "primary": false },
                    { "code": "207RX0202X", "desc": "Medical Oncology", "state": "AK", "primary": true }
                ],
                "addresses": [
                    { "address_purpose": "MAILING", "address_1": "PO BOX 1", "city": "SEATTLE", "state": "WA", "postal_code": "98101" },
                    { "address_purpose": "LOCATION", "address_1": "3200 PROVIDENCE DR", "city": "ANCHORAGE", "state": "AK", "postal_code": "995084615" }
                ]
            }]
        }))
        .expect("decodes");

        let record = response
            .results
            .into_iter()
            .next()
            .expect("one result")
            .into_record(&npi());
        assert!(record.active);
        assert_eq!(record.name, "ANA RIVERA");
        assert_eq!(record.specialty.as_deref(), Some("Medical Oncology"));
        assert_eq!(record.state.as_deref(), Some("AK"));
        assert_eq!(
            record.address.as_deref(),
            Some("3200 PROVIDENCE DR, ANCHORAGE, AK 99508")
        );
    }

    #[test]
    fn organization_uses_legal_name() {
        let result: NppesResult = serde_json::from_value(json!({
            "enumeration_type": "NPI-2",
            "basic": { "organization_name": "NORTHWIND ONCOLOGY LLC", "status": "D" }
        }))
        .expect("decodes");

        let record = result.into_record(&npi());
        assert_eq!(record.name, "NORTHWIND ONCOLOGY LLC");
        assert!(!record.active);
        assert_eq!(record.address, None);
    }
}
