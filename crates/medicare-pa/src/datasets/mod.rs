//! Static CMS reference tables (PA-required lists, NCCI PTP/MUE edits, SAD list).
//!
//! Each table is fetched once per cache instance and shared read-only by every
//! evaluator afterwards. Concurrent first access awaits a single in-flight load;
//! a failed load leaves the slot empty so the next access retries.

mod records;
mod source;

pub use records::{
    MueDataset, MueEdit, PaRequiredDataset, PaRequiredEntry, PtpDataset, PtpEdit, SadListDataset,
    SadListEntry,
};
pub use source::{DatasetFormat, DatasetSource, DirectorySource, HttpSource, RawDataset};

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    PaRequiredCodes,
    PtpEdits,
    MueEdits,
    SadList,
}

impl DatasetKind {
    pub fn file_stem(self) -> &'static str {
        match self {
            DatasetKind::PaRequiredCodes => "pa-required-codes",
            DatasetKind::PtpEdits => "ncci-ptp",
            DatasetKind::MueEdits => "ncci-mue",
            DatasetKind::SadList => "sad-exclusions",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DatasetKind::PaRequiredCodes => "PA required codes",
            DatasetKind::PtpEdits => "NCCI PTP",
            DatasetKind::MueEdits => "NCCI MUE",
            DatasetKind::SadList => "SAD exclusion list",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to load {kind} data: not found at {location}")]
    Missing { kind: DatasetKind, location: String },
    #[error("Failed to load {kind} data: {source}")]
    Io {
        kind: DatasetKind,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load {kind} data: {message}")]
    Transport { kind: DatasetKind, message: String },
    #[error("Failed to parse {kind} data: {message}")]
    Decode { kind: DatasetKind, message: String },
    #[error("{kind} data cannot be read from {format:?}")]
    UnsupportedFormat {
        kind: DatasetKind,
        format: DatasetFormat,
    },
}

/// A decodable reference table.
trait ReferenceTable: DeserializeOwned + Send + Sync + 'static {
    const KIND: DatasetKind;

    fn len(&self) -> usize;

    fn from_csv(_bytes: &[u8]) -> Result<Self, DatasetError> {
        Err(DatasetError::UnsupportedFormat {
            kind: Self::KIND,
            format: DatasetFormat::Csv,
        })
    }
}

impl ReferenceTable for PaRequiredDataset {
    const KIND: DatasetKind = DatasetKind::PaRequiredCodes;

    fn len(&self) -> usize {
        self.codes.len()
    }
}

impl ReferenceTable for PtpDataset {
    const KIND: DatasetKind = DatasetKind::PtpEdits;

    fn len(&self) -> usize {
        self.edits.len()
    }

    fn from_csv(bytes: &[u8]) -> Result<Self, DatasetError> {
        Ok(Self {
            edits: csv_rows(Self::KIND, bytes)?,
        })
    }
}

impl ReferenceTable for MueDataset {
    const KIND: DatasetKind = DatasetKind::MueEdits;

    fn len(&self) -> usize {
        self.edits.len()
    }

    fn from_csv(bytes: &[u8]) -> Result<Self, DatasetError> {
        Ok(Self {
            edits: csv_rows(Self::KIND, bytes)?,
        })
    }
}

impl ReferenceTable for SadListDataset {
    const KIND: DatasetKind = DatasetKind::SadList;

    fn len(&self) -> usize {
        self.drugs.len()
    }

    fn from_csv(bytes: &[u8]) -> Result<Self, DatasetError> {
        Ok(Self {
            drugs: csv_rows(Self::KIND, bytes)?,
        })
    }
}

fn csv_rows<T: DeserializeOwned>(kind: DatasetKind, bytes: &[u8]) -> Result<Vec<T>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    reader
        .deserialize::<T>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| DatasetError::Decode {
            kind,
            message: err.to_string(),
        })
}

fn decode<T: ReferenceTable>(raw: RawDataset) -> Result<T, DatasetError> {
    match raw.format {
        DatasetFormat::Json => {
            serde_json::from_slice(&raw.bytes).map_err(|err| DatasetError::Decode {
                kind: T::KIND,
                message: err.to_string(),
            })
        }
        DatasetFormat::Csv => T::from_csv(&raw.bytes),
    }
}

/// Injectable, process-lifetime memo of the reference tables.
pub struct ReferenceCache {
    source: Arc<dyn DatasetSource>,
    pa_required: OnceCell<Arc<PaRequiredDataset>>,
    ptp: OnceCell<Arc<PtpDataset>>,
    mue: OnceCell<Arc<MueDataset>>,
    sad: OnceCell<Arc<SadListDataset>>,
}

impl ReferenceCache {
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self {
            source,
            pa_required: OnceCell::new(),
            ptp: OnceCell::new(),
            mue: OnceCell::new(),
            sad: OnceCell::new(),
        }
    }

    pub async fn pa_required(&self) -> Result<Arc<PaRequiredDataset>, DatasetError> {
        self.cached(&self.pa_required).await
    }

    pub async fn ptp_edits(&self) -> Result<Arc<PtpDataset>, DatasetError> {
        self.cached(&self.ptp).await
    }

    pub async fn mue_edits(&self) -> Result<Arc<MueDataset>, DatasetError> {
        self.cached(&self.mue).await
    }

    pub async fn sad_list(&self) -> Result<Arc<SadListDataset>, DatasetError> {
        self.cached(&self.sad).await
    }

    async fn cached<T: ReferenceTable>(
        &self,
        cell: &OnceCell<Arc<T>>,
    ) -> Result<Arc<T>, DatasetError> {
        cell.get_or_try_init(|| self.load::<T>())
            .await
            .map(Arc::clone)
    }

    async fn load<T: ReferenceTable>(&self) -> Result<Arc<T>, DatasetError> {
        let result = match self.source.fetch(T::KIND).await {
            Ok(raw) => decode::<T>(raw),
            Err(err) => Err(err),
        };

        match result {
            Ok(table) => {
                info!(dataset = %T::KIND, records = table.len(), "reference dataset loaded");
                Ok(Arc::new(table))
            }
            Err(err) => {
                warn!(dataset = %T::KIND, error = %err, "reference dataset load failed");
                Err(err)
            }
        }
    }
}

impl fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("pa_required_loaded", &self.pa_required.initialized())
            .field("ptp_loaded", &self.ptp.initialized())
            .field("mue_loaded", &self.mue.initialized())
            .field("sad_loaded", &self.sad.initialized())
            .finish()
    }
}
