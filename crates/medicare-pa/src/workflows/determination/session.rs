use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::case::Case;
use super::letter::{DraftLetter, LetterDrafter, LetterError, LetterFacts};
use super::orchestrator::{DeterminationOrchestrator, DeterminationResults, SlotUpdate};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LetterState {
    #[default]
    Idle,
    Drafting,
    Ready {
        letter: DraftLetter,
    },
    Failed {
        error: String,
    },
}

#[derive(Default)]
struct SessionState {
    generation: u64,
    case: Option<Arc<Case>>,
    results: DeterminationResults,
    letter: LetterState,
}

impl SessionState {
    /// Commits an update only if it belongs to the live generation.
    fn commit(&mut self, generation: u64, update: SlotUpdate) -> bool {
        if generation != self.generation {
            return false;
        }
        self.results.apply(update);
        true
    }
}

/// Point-in-time copy of a session's live case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub generation: u64,
    pub case: Case,
    pub results: DeterminationResults,
    pub letter: LetterState,
}

/// Holds the single live case for one user session.
///
/// Every submission starts a new generation. Results still arriving from an
/// older generation are dropped, so a resubmitted case never mixes with the
/// case it replaced.
pub struct CaseSession {
    id: String,
    orchestrator: Arc<DeterminationOrchestrator>,
    drafter: Option<Arc<dyn LetterDrafter>>,
    state: Arc<Mutex<SessionState>>,
    changed: Arc<Notify>,
    letter_turn: tokio::sync::Mutex<()>,
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CaseSession {
    pub fn new(
        id: impl Into<String>,
        orchestrator: Arc<DeterminationOrchestrator>,
        drafter: Option<Arc<dyn LetterDrafter>>,
    ) -> Self {
        Self {
            id: id.into(),
            orchestrator,
            drafter,
            state: Arc::new(Mutex::new(SessionState::default())),
            changed: Arc::new(Notify::new()),
            letter_turn: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces the live case and launches its evaluation. Returns the new
    /// generation number.
    pub fn submit(&self, case: Case) -> u64 {
        let case = Arc::new(case);
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.case = Some(case.clone());
            state.results = DeterminationResults::default();
            state.letter = LetterState::Idle;
            state.generation
        };
        info!(session = %self.id, generation, procedure = %case.procedure_code, "case submitted");

        let mut round = self.orchestrator.launch(case);
        let state = self.state.clone();
        let changed = self.changed.clone();
        let session = self.id.clone();
        tokio::spawn(async move {
            while let Some(update) = round.next().await {
                let kind = update.kind();
                if !lock(&state).commit(generation, update) {
                    debug!(session = %session, generation, evaluator = %kind, "discarding stale result");
                }
                changed.notify_waiters();
            }
            {
                let mut current = lock(&state);
                if current.generation == generation {
                    current.results.fail_unreported();
                }
            }
            changed.notify_waiters();
        });

        generation
    }

    /// Drops the live case. In-flight results for it will be discarded.
    pub fn clear(&self) {
        {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.case = None;
            state.results = DeterminationResults::default();
            state.letter = LetterState::Idle;
        }
        info!(session = %self.id, "case cleared");
        self.changed.notify_waiters();
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = lock(&self.state);
        state.case.as_ref().map(|case| SessionSnapshot {
            generation: state.generation,
            case: case.as_ref().clone(),
            results: state.results.clone(),
            letter: state.letter.clone(),
        })
    }

    /// Waits until every evaluator of the live case has reported.
    /// Returns `None` if there is no live case.
    pub async fn settled(&self) -> Option<SessionSnapshot> {
        loop {
            let notified = self.changed.notified();
            let settled = {
                let state = lock(&self.state);
                state.case.as_ref().map(|_| state.results.is_settled())
            };
            match settled {
                None => return None,
                Some(true) => return self.snapshot(),
                Some(false) => notified.await,
            }
        }
    }

    /// Drafts the appeal letter for the live case. Requests are served one at
    /// a time; a request that arrives after a draft completed for the same
    /// generation gets that draft back instead of a new one.
    pub async fn generate_letter(&self) -> Result<DraftLetter, LetterError> {
        let drafter = self.drafter.clone().ok_or(LetterError::NotConfigured)?;
        let _turn = self.letter_turn.lock().await;

        let (generation, facts) = {
            let mut state = lock(&self.state);
            let case = state.case.clone().ok_or(LetterError::NoCase)?;
            if state.results.is_medicare_advantage() {
                return Err(LetterError::MedicareAdvantage);
            }
            if let LetterState::Ready { letter } = &state.letter {
                return Ok(letter.clone());
            }
            state.letter = LetterState::Drafting;
            (state.generation, LetterFacts::assemble(&case, &state.results))
        };
        self.changed.notify_waiters();

        info!(session = %self.id, generation, "drafting letter");
        let outcome = drafter.draft(&facts).await;

        let mut state = lock(&self.state);
        if state.generation != generation {
            warn!(session = %self.id, generation, "letter finished after case was replaced");
            return Err(LetterError::Superseded);
        }
        let result = match outcome {
            Ok(letter) => {
                state.letter = LetterState::Ready {
                    letter: letter.clone(),
                };
                Ok(letter)
            }
            Err(err) => {
                state.letter = LetterState::Failed {
                    error: err.to_string(),
                };
                Err(LetterError::from(err))
            }
        };
        drop(state);
        self.changed.notify_waiters();
        result
    }
}

/// Sessions keyed by caller-supplied id.
pub struct SessionStore {
    orchestrator: Arc<DeterminationOrchestrator>,
    drafter: Option<Arc<dyn LetterDrafter>>,
    sessions: Mutex<HashMap<String, Arc<CaseSession>>>,
}

impl SessionStore {
    pub fn new(
        orchestrator: Arc<DeterminationOrchestrator>,
        drafter: Option<Arc<dyn LetterDrafter>>,
    ) -> Self {
        Self {
            orchestrator,
            drafter,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(&self, id: &str) -> Arc<CaseSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                Arc::new(CaseSession::new(
                    id,
                    self.orchestrator.clone(),
                    self.drafter.clone(),
                ))
            })
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<CaseSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Drops the session and clears it, so results still in flight for it
    /// are discarded on arrival.
    pub fn remove(&self, id: &str) -> Option<Arc<CaseSession>> {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if let Some(session) = &removed {
            session.clear();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
