use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub datasets: DatasetConfig,
    pub registries: RegistryConfig,
    pub evaluation: EvaluationSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let datasets = DatasetConfig {
            data_dir: PathBuf::from(env::var("PA_DATA_DIR").unwrap_or_else(|_| "./data".into())),
            base_url: optional_var("PA_DATA_BASE_URL"),
        };

        let registries = RegistryConfig {
            coverage_base_url: env::var("CMS_COVERAGE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_COVERAGE_URL.to_string()),
            nppes_base_url: env::var("NPPES_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_NPPES_URL.to_string()),
            icd10_url: env::var("ICD10_API_URL").unwrap_or_else(|_| DEFAULT_ICD10_URL.to_string()),
            eligibility_url: env::var("ELIGIBILITY_API_URL")
                .unwrap_or_else(|_| DEFAULT_ELIGIBILITY_URL.to_string()),
            eligibility_api_key: optional_var("STEDI_API_KEY"),
            letter_service_url: optional_var("LETTER_SERVICE_URL"),
            letter_timeout: Duration::from_secs(timeout_secs(
                "LETTER_TIMEOUT_SECS",
                DEFAULT_LETTER_TIMEOUT_SECS,
            )?),
            sad_source: match optional_var("SAD_SOURCE") {
                Some(raw) => SadSourceKind::parse(&raw)?,
                None => SadSourceKind::Registry,
            },
        };

        let evaluator_secs =
            timeout_secs("EVALUATOR_TIMEOUT_SECS", DEFAULT_EVALUATOR_TIMEOUT_SECS)?;
        let cancel_on_medicare_advantage = match optional_var("CANCEL_ON_MEDICARE_ADVANTAGE") {
            Some(raw) => parse_flag("CANCEL_ON_MEDICARE_ADVANTAGE", &raw)?,
            None => false,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            datasets,
            registries,
            evaluation: EvaluationSettings {
                evaluator_timeout: Duration::from_secs(evaluator_secs),
                cancel_on_medicare_advantage,
            },
        })
    }
}

pub const DEFAULT_COVERAGE_URL: &str = "https://www.cms.gov/medicare-coverage-database/search";
pub const DEFAULT_NPPES_URL: &str = "https://npiregistry.cms.hhs.gov/api/";
pub const DEFAULT_ICD10_URL: &str = "https://clinicaltables.nlm.nih.gov/api/icd10cm/v3/search";
pub const DEFAULT_ELIGIBILITY_URL: &str =
    "https://healthcare.us.stedi.com/2024-04-01/change/medicalnetwork/eligibility/v3";
const DEFAULT_EVALUATOR_TIMEOUT_SECS: u64 = 20;
const DEFAULT_LETTER_TIMEOUT_SECS: u64 = 120;

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn timeout_secs(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional_var(key) {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout { key }),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the static CMS reference tables are read from.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub data_dir: PathBuf,
    /// When set, datasets are fetched over HTTP instead of read from `data_dir`.
    pub base_url: Option<String>,
}

/// Endpoints and credentials for the external registries.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub coverage_base_url: String,
    pub nppes_base_url: String,
    pub icd10_url: String,
    pub eligibility_url: String,
    pub eligibility_api_key: Option<String>,
    pub letter_service_url: Option<String>,
    /// Drafting calls are slower than registry lookups and get their own budget.
    pub letter_timeout: Duration,
    pub sad_source: SadSourceKind,
}

/// Selects which backend answers SAD exclusion lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SadSourceKind {
    Registry,
    Dataset,
}

impl SadSourceKind {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_ascii_lowercase().as_str() {
            "registry" | "cms" => Ok(Self::Registry),
            "dataset" | "static" => Ok(Self::Dataset),
            _ => Err(ConfigError::InvalidSadSource {
                value: raw.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub evaluator_timeout: Duration,
    pub cancel_on_medicare_advantage: bool,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            evaluator_timeout: Duration::from_secs(DEFAULT_EVALUATOR_TIMEOUT_SECS),
            cancel_on_medicare_advantage: false,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout { key: &'static str },
    InvalidFlag { key: &'static str },
    InvalidSadSource { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout { key } => write!(f, "{key} must be a positive integer"),
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::InvalidSadSource { value } => {
                write!(f, "SAD_SOURCE must be 'registry' or 'dataset' (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
