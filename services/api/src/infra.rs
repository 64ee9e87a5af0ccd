use medicare_pa::config::AppConfig;
use medicare_pa::datasets::{DatasetSource, DirectorySource, HttpSource, ReferenceCache};
use medicare_pa::registry::{http_client, RegistryClients};
use medicare_pa::workflows::determination::{
    DeterminationOrchestrator, DeterminationService, Evaluators, IntakeVerifier, SessionStore,
};
use medicare_pa::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Shared collaborators built once from configuration.
pub(crate) struct Pipeline {
    pub(crate) datasets: Arc<ReferenceCache>,
    pub(crate) registries: RegistryClients,
    pub(crate) orchestrator: Arc<DeterminationOrchestrator>,
}

impl Pipeline {
    pub(crate) fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let client = http_client(config.evaluation.evaluator_timeout)?;

        let source: Arc<dyn DatasetSource> = match &config.datasets.base_url {
            Some(base_url) => Arc::new(HttpSource::new(client.clone(), base_url.clone())),
            None => Arc::new(DirectorySource::new(config.datasets.data_dir.clone())),
        };
        let datasets = Arc::new(ReferenceCache::new(source));
        let registries =
            RegistryClients::from_config(&config.registries, client, datasets.clone());

        if config.registries.eligibility_api_key.is_none() {
            warn!("STEDI_API_KEY not set; eligibility checks will report as not configured");
        }

        let orchestrator = Arc::new(DeterminationOrchestrator::new(
            Evaluators {
                datasets: datasets.clone(),
                eligibility: registries.eligibility.clone(),
                coverage: registries.coverage.clone(),
                sad: registries.sad.clone(),
            },
            config.evaluation.clone(),
        ));

        Ok(Self {
            datasets,
            registries,
            orchestrator,
        })
    }

    pub(crate) fn service(&self) -> Arc<DeterminationService> {
        Arc::new(DeterminationService::new(
            self.orchestrator.clone(),
            SessionStore::new(self.orchestrator.clone(), self.registries.letter.clone()),
            IntakeVerifier::new(self.registries.npi.clone(), self.registries.icd10.clone()),
        ))
    }

    /// Loads every reference table up front. Failures are logged and left for
    /// the evaluators to report; a later request retries the load.
    pub(crate) async fn warm_datasets(&self) {
        let datasets = &self.datasets;
        let (pa, ptp, mue, sad) = tokio::join!(
            datasets.pa_required(),
            datasets.ptp_edits(),
            datasets.mue_edits(),
            datasets.sad_list()
        );

        let failures = [
            pa.err().map(|err| err.to_string()),
            ptp.err().map(|err| err.to_string()),
            mue.err().map(|err| err.to_string()),
            sad.err().map(|err| err.to_string()),
        ];
        let mut healthy = true;
        for failure in failures.into_iter().flatten() {
            healthy = false;
            warn!(error = %failure, "reference dataset unavailable at startup");
        }
        if healthy {
            info!("reference datasets loaded");
        }
    }
}
