use std::time::Duration;

use async_trait::async_trait;

use super::{send_json, RegistryError};
use crate::workflows::determination::{DraftLetter, LetterDrafter, LetterFacts};

const SERVICE: &str = "Letter service";

/// Posts the fact bundle to the drafting service and returns its reply as-is.
/// Each call carries its own timeout, overriding the shared client's.
#[derive(Debug, Clone)]
pub struct LetterServiceClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl LetterServiceClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    fn request(&self, facts: &LetterFacts) -> reqwest::RequestBuilder {
        self.client.post(&self.url).timeout(self.timeout).json(facts)
    }
}

#[async_trait]
impl LetterDrafter for LetterServiceClient {
    async fn draft(&self, facts: &LetterFacts) -> Result<DraftLetter, RegistryError> {
        send_json(SERVICE, self.request(facts)).await
    }
}
