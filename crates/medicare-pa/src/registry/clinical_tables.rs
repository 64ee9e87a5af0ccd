use async_trait::async_trait;
use serde_json::Value;

use super::{send_json, RegistryError};
use crate::identifiers::Icd10Code;
use crate::workflows::determination::{Icd10Match, Icd10Registry};

const SERVICE: &str = "ICD-10 lookup";
const MAX_RESULTS: &str = "5";

/// NLM Clinical Tables ICD-10-CM search client.
#[derive(Debug, Clone)]
pub struct ClinicalTablesClient {
    client: reqwest::Client,
    url: String,
}

impl ClinicalTablesClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Icd10Registry for ClinicalTablesClient {
    async fn search(&self, code: &Icd10Code) -> Result<Vec<Icd10Match>, RegistryError> {
        let formatted = code.formatted();
        let request = self.client.get(&self.url).query(&[
            ("sf", "code"),
            ("terms", formatted.as_str()),
            ("maxList", MAX_RESULTS),
        ]);
        let body: Value = send_json(SERVICE, request).await?;
        parse_matches(&body)
    }
}

/// The response is a positional array: `[total, codes, extra, display]`,
/// where each display row is `[code, name]`.
fn parse_matches(body: &Value) -> Result<Vec<Icd10Match>, RegistryError> {
    let rows = body
        .as_array()
        .ok_or_else(|| RegistryError::Decode {
            service: SERVICE.to_string(),
            message: "expected a JSON array".to_string(),
        })?;

    let codes = rows.get(1).and_then(Value::as_array);
    let display = rows.get(3).and_then(Value::as_array);

    let Some(codes) = codes else {
        return Ok(Vec::new());
    };

    Ok(codes
        .iter()
        .enumerate()
        .filter_map(|(index, code)| {
            let code = code.as_str()?.to_string();
            let description = display
                .and_then(|rows| rows.get(index))
                .and_then(Value::as_array)
                .and_then(|row| row.get(1))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Icd10Match { code, description })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_positional_payload() {
        let body = json!([
            2,
            ["C34.90", "C34.91"],
            null,
            [
                ["C34.90", "Malignant neoplasm of unspecified part of unspecified bronchus or lung"],
                ["C34.91", "Malignant neoplasm of unspecified part of right bronchus or lung"]
            ]
        ]);
        let matches = parse_matches(&body).expect("parses");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].code, "C34.91");
        assert!(matches[0].description.starts_with("Malignant neoplasm"));
    }

    #[test]
    fn empty_hit_list_is_not_an_error() {
        let matches = parse_matches(&json!([0, [], null, []])).expect("parses");
        assert!(matches.is_empty());
    }

    #[test]
    fn non_array_body_is_a_decode_error() {
        assert!(matches!(
            parse_matches(&json!({ "error": "bad" })),
            Err(RegistryError::Decode { .. })
        ));
    }
}
