use crate::cli::ServeArgs;
use crate::infra::{AppState, Pipeline};
use crate::routes::with_determination_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use medicare_pa::config::AppConfig;
use medicare_pa::telemetry;
use medicare_pa::AppError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pipeline = Pipeline::from_config(&config)?;
    let app = with_determination_routes(pipeline.service())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    pipeline.warm_datasets().await;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        evaluator_timeout = ?config.evaluation.evaluator_timeout,
        cancel_on_medicare_advantage = config.evaluation.cancel_on_medicare_advantage,
        "prior authorization determination service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
