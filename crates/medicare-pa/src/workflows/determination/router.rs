use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::warn;

use super::case::CaseIntake;
use super::dashboard::render_dashboard;
use super::error::DeterminationError;
use super::intake::IntakeVerifier;
use super::letter::LetterError;
use super::orchestrator::DeterminationOrchestrator;
use super::session::{LetterState, SessionStore};

/// Everything the determination endpoints need.
pub struct DeterminationService {
    orchestrator: Arc<DeterminationOrchestrator>,
    sessions: SessionStore,
    intake: IntakeVerifier,
}

impl DeterminationService {
    pub fn new(
        orchestrator: Arc<DeterminationOrchestrator>,
        sessions: SessionStore,
        intake: IntakeVerifier,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            intake,
        }
    }

    pub fn orchestrator(&self) -> &Arc<DeterminationOrchestrator> {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn intake(&self) -> &IntakeVerifier {
        &self.intake
    }
}

/// Router builder exposing the determination, session, and lookup endpoints.
pub fn determination_router(service: Arc<DeterminationService>) -> Router {
    Router::new()
        .route("/api/v1/determinations", post(evaluate_handler))
        .route(
            "/api/v1/sessions/:session_id/case",
            post(submit_case_handler)
                .get(case_status_handler)
                .delete(clear_case_handler),
        )
        .route(
            "/api/v1/sessions/:session_id/case/letter",
            post(letter_handler),
        )
        .route("/api/v1/providers/:npi", get(provider_handler))
        .route("/api/v1/diagnoses/:code", get(diagnosis_handler))
        .with_state(service)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn determination_error(error: DeterminationError) -> Response {
    let status = match &error {
        DeterminationError::Format(_) | DeterminationError::Checksum(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DeterminationError::NotFound(_) => StatusCode::NOT_FOUND,
        DeterminationError::Transport(_) | DeterminationError::UnknownState(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    error_body(status, error.to_string())
}

pub(crate) async fn evaluate_handler(
    State(service): State<Arc<DeterminationService>>,
    Json(intake): Json<CaseIntake>,
) -> Response {
    let case = match intake.validate() {
        Ok(case) => Arc::new(case),
        Err(error) => return determination_error(error),
    };

    let results = service.orchestrator.evaluate(case.clone()).await;
    let view = render_dashboard(0, &case, &results, &LetterState::Idle);
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn submit_case_handler(
    State(service): State<Arc<DeterminationService>>,
    Path(session_id): Path<String>,
    Json(intake): Json<CaseIntake>,
) -> Response {
    let case = match intake.validate() {
        Ok(case) => case,
        Err(error) => return determination_error(error),
    };

    let session = service.sessions.open(&session_id);
    let generation = session.submit(case);
    let payload = json!({
        "sessionId": session_id,
        "generation": generation,
    });
    (StatusCode::ACCEPTED, Json(payload)).into_response()
}

pub(crate) async fn case_status_handler(
    State(service): State<Arc<DeterminationService>>,
    Path(session_id): Path<String>,
) -> Response {
    let snapshot = service
        .sessions
        .get(&session_id)
        .and_then(|session| session.snapshot());

    match snapshot {
        Some(snapshot) => {
            let view = render_dashboard(
                snapshot.generation,
                &snapshot.case,
                &snapshot.results,
                &snapshot.letter,
            );
            (StatusCode::OK, Json(view)).into_response()
        }
        None => error_body(StatusCode::NOT_FOUND, "no case submitted for this session"),
    }
}

pub(crate) async fn clear_case_handler(
    State(service): State<Arc<DeterminationService>>,
    Path(session_id): Path<String>,
) -> Response {
    service.sessions.remove(&session_id);
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn letter_handler(
    State(service): State<Arc<DeterminationService>>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = service.sessions.get(&session_id) else {
        return error_body(StatusCode::NOT_FOUND, LetterError::NoCase.to_string());
    };

    match session.generate_letter().await {
        Ok(letter) => (StatusCode::OK, Json(letter)).into_response(),
        Err(error) => {
            let status = match &error {
                LetterError::NoCase => StatusCode::NOT_FOUND,
                LetterError::MedicareAdvantage | LetterError::Superseded => StatusCode::CONFLICT,
                LetterError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                LetterError::Drafting(_) => {
                    warn!(session = %session_id, error = %error, "letter drafting failed");
                    StatusCode::BAD_GATEWAY
                }
            };
            error_body(status, error.to_string())
        }
    }
}

pub(crate) async fn provider_handler(
    State(service): State<Arc<DeterminationService>>,
    Path(npi): Path<String>,
) -> Response {
    match service.intake.verify_provider(&npi).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => determination_error(error),
    }
}

pub(crate) async fn diagnosis_handler(
    State(service): State<Arc<DeterminationService>>,
    Path(code): Path<String>,
) -> Response {
    match service.intake.verify_diagnosis(&code).await {
        Ok(verification) => (StatusCode::OK, Json(verification)).into_response(),
        Err(error) => determination_error(error),
    }
}
