use std::path::PathBuf;

use async_trait::async_trait;

use super::{DatasetError, DatasetKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Json,
    Csv,
}

/// Undecoded dataset payload as fetched from its source.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub format: DatasetFormat,
    pub bytes: Vec<u8>,
}

/// Where reference tables come from. Implementations only fetch bytes; decoding
/// and memoization live in [`super::ReferenceCache`].
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch(&self, kind: DatasetKind) -> Result<RawDataset, DatasetError>;
}

/// Reads `<stem>.json`, falling back to `<stem>.csv`, from a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DatasetSource for DirectorySource {
    async fn fetch(&self, kind: DatasetKind) -> Result<RawDataset, DatasetError> {
        for (extension, format) in [("json", DatasetFormat::Json), ("csv", DatasetFormat::Csv)] {
            let path = self.root.join(format!("{}.{extension}", kind.file_stem()));
            match tokio::fs::read(&path).await {
                Ok(bytes) => return Ok(RawDataset { format, bytes }),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(DatasetError::Io { kind, source }),
            }
        }

        Err(DatasetError::Missing {
            kind,
            location: self.root.display().to_string(),
        })
    }
}

/// Fetches `<base_url>/<stem>.json` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, kind: DatasetKind) -> String {
        format!(
            "{}/{}.json",
            self.base_url.trim_end_matches('/'),
            kind.file_stem()
        )
    }
}

#[async_trait]
impl DatasetSource for HttpSource {
    async fn fetch(&self, kind: DatasetKind) -> Result<RawDataset, DatasetError> {
        let url = self.url_for(kind);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| DatasetError::Transport {
                kind,
                message: err.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DatasetError::Missing {
                kind,
                location: url,
            });
        }
        if !status.is_success() {
            return Err(DatasetError::Transport {
                kind,
                message: format!("HTTP {} from {url}", status.as_u16()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| DatasetError::Transport {
                kind,
                message: err.to_string(),
            })?;

        Ok(RawDataset {
            format: DatasetFormat::Json,
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_source_joins_base_url_without_double_slash() {
        let source = HttpSource::new(reqwest::Client::new(), "https://example.test/data/");
        assert_eq!(
            source.url_for(DatasetKind::PtpEdits),
            "https://example.test/data/ncci-ptp.json"
        );
    }

    #[tokio::test]
    async fn directory_source_reports_missing_dataset() {
        let source = DirectorySource::new("./definitely-not-a-data-dir");
        match source.fetch(DatasetKind::MueEdits).await {
            Err(DatasetError::Missing { kind, .. }) => assert_eq!(kind, DatasetKind::MueEdits),
            other => panic!("expected missing dataset, got {other:?}"),
        }
    }
}
