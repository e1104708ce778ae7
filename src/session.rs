//! Conversation orchestration.
//!
//! A [`Session`] owns everything mutable about one conversation: the
//! transcript and the termination flags. Each user line starts a round:
//!
//! 1. the line is appended as a user turn and evaluated (a typed approval
//!    ends the session before anything is generated)
//! 2. the selection strategy names the next role; the backend generates its
//!    message; the turn is appended, surfaced to [`SessionEvents`], then
//!    evaluated
//! 3. the round ends when the strategy has nobody left, the turn cap is
//!    hit, or the backend fails
//!
//! On approval the cached artifact (possibly none) goes to the publisher and
//! the session is closed: no further turns are ever appended.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::backend::GenerationBackend;
use crate::errors::BackendError;
use crate::publish::{PublishResult, Publisher};
use crate::roles::{Role, Roster};
use crate::selection::{Rotation, SelectionStrategy};
use crate::termination::{TerminationEvaluator, TerminationState, Verdict};
use crate::transcript::{Transcript, Turn};

/// Line that ends the session between rounds (case-insensitive).
pub const EXIT_COMMAND: &str = "exit";

pub const DEFAULT_MAX_TURNS_PER_ROUND: usize = 6;

/// Observer for everything the user should see while a round runs.
///
/// Every generated turn reaches `turn` before it is evaluated.
pub trait SessionEvents: Send + Sync {
    fn generating(&self, _role: &str) {}
    fn turn(&self, turn: &Turn);
    fn backend_failed(&self, role: &str, error: &BackendError);
    fn round_limit_reached(&self, _limit: usize) {}
    fn approved(&self, _has_artifact: bool) {}
    fn published(&self, result: &PublishResult);
}

/// Discards all events.
pub struct SilentEvents;

impl SessionEvents for SilentEvents {
    fn turn(&self, _turn: &Turn) {}
    fn backend_failed(&self, _role: &str, _error: &BackendError) {}
    fn published(&self, _result: &PublishResult) {}
}

/// Source of user lines, e.g. stdin.
#[async_trait]
pub trait InputSource: Send {
    /// Next line, or `None` once input is exhausted.
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;
}

/// How a single round ended.
#[derive(Debug)]
pub enum RoundOutcome {
    /// The round completed without approval; waiting for the next user line.
    AwaitingUser,
    /// The user approved; the publisher has run.
    Approved(PublishResult),
    /// The backend failed; the round was abandoned, state is untouched.
    BackendFailed(BackendError),
    /// The session was already approved; the line was ignored.
    Closed,
}

/// How the whole session ended.
#[derive(Debug)]
pub enum SessionResult {
    Approved(PublishResult),
    /// The user typed the exit command. Nothing was published.
    Exited,
    /// Input ran out before approval. Nothing was published.
    InputClosed,
}

pub struct Session {
    id: Uuid,
    roster: Roster,
    transcript: Transcript,
    state: TerminationState,
    evaluator: TerminationEvaluator,
    selector: Box<dyn SelectionStrategy>,
    backend: Arc<dyn GenerationBackend>,
    publisher: Publisher,
    events: Box<dyn SessionEvents>,
    max_turns_per_round: usize,
    generation_timeout: Option<Duration>,
}

impl Session {
    pub fn new(roster: Roster, backend: Arc<dyn GenerationBackend>, publisher: Publisher) -> Self {
        Self {
            id: Uuid::new_v4(),
            roster,
            transcript: Transcript::new(),
            state: TerminationState::new(),
            evaluator: TerminationEvaluator::default(),
            selector: Box::new(Rotation::default()),
            backend,
            publisher,
            events: Box::new(SilentEvents),
            max_turns_per_round: DEFAULT_MAX_TURNS_PER_ROUND,
            generation_timeout: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: TerminationEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_selection(mut self, selector: Box<dyn SelectionStrategy>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_events(mut self, events: Box<dyn SessionEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_max_turns_per_round(mut self, max: usize) -> Self {
        self.max_turns_per_round = max.max(1);
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &TerminationState {
        &self.state
    }

    /// Drive the conversation until approval, exit, or end of input.
    ///
    /// `initial` is treated exactly like the first line read from `input`.
    pub async fn run_session(
        &mut self,
        initial: Option<&str>,
        input: &mut dyn InputSource,
    ) -> std::io::Result<SessionResult> {
        let mut pending = initial.map(str::to_string);
        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => match input.next_line().await? {
                    Some(line) => line,
                    None => {
                        info!(session = %self.id, "Input closed before approval");
                        return Ok(SessionResult::InputClosed);
                    }
                },
            };

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text.eq_ignore_ascii_case(EXIT_COMMAND) {
                info!(session = %self.id, turns = self.transcript.len(), "User exited");
                return Ok(SessionResult::Exited);
            }

            match self.submit(text).await {
                RoundOutcome::Approved(result) => return Ok(SessionResult::Approved(result)),
                RoundOutcome::AwaitingUser | RoundOutcome::BackendFailed(_) => {}
                RoundOutcome::Closed => {
                    warn!(session = %self.id, "Line submitted to a closed session");
                }
            }
        }
    }

    /// Run one round for a user line.
    pub async fn submit(&mut self, text: &str) -> RoundOutcome {
        let span = info_span!("round", session = %self.id, round_start = self.transcript.len());
        self.run_round(text).instrument(span).await
    }

    async fn run_round(&mut self, text: &str) -> RoundOutcome {
        if self.state.is_approved() {
            return RoundOutcome::Closed;
        }

        self.transcript.push(Turn::user(text));
        debug!(turns = self.transcript.len(), "User turn appended");
        if self.evaluate() == Verdict::TerminateApproved {
            return RoundOutcome::Approved(self.finish().await);
        }

        let mut generated = 0;
        loop {
            if generated >= self.max_turns_per_round {
                info!(limit = self.max_turns_per_round, "Turn cap reached; round complete");
                self.events.round_limit_reached(self.max_turns_per_round);
                return RoundOutcome::AwaitingUser;
            }

            let next = match self
                .selector
                .next_role(&self.roster, &self.transcript, self.backend.as_ref())
                .await
            {
                Ok(next) => next,
                Err(error) => {
                    warn!(error = %error, "Role selection failed; abandoning round");
                    self.events.backend_failed("selection", &error);
                    return RoundOutcome::BackendFailed(error);
                }
            };
            let Some(role) = next.and_then(|name| self.roster.get(&name).cloned()) else {
                debug!(generated, strategy = self.selector.name(), "Round complete");
                return RoundOutcome::AwaitingUser;
            };

            self.events.generating(&role.name);
            let body = match self.generate(&role).await {
                Ok(body) => body,
                Err(error) => {
                    warn!(role = %role.name, error = %error, "Generation failed; abandoning round");
                    self.events.backend_failed(&role.name, &error);
                    return RoundOutcome::BackendFailed(error);
                }
            };

            let turn = self.transcript.push(Turn::role(role.name.clone(), body));
            self.events.turn(turn);
            generated += 1;
            debug!(role = %role.name, turns = self.transcript.len(), "Role turn appended");

            if self.evaluate() == Verdict::TerminateApproved {
                return RoundOutcome::Approved(self.finish().await);
            }
        }
    }

    async fn generate(&self, role: &Role) -> Result<String, BackendError> {
        let request = self.backend.generate(role, &self.roster, &self.transcript);
        match self.generation_timeout {
            Some(after) => tokio::time::timeout(after, request)
                .await
                .map_err(|_| BackendError::Timeout {
                    role: role.name.clone(),
                    after,
                })?,
            None => request.await,
        }
    }

    fn evaluate(&mut self) -> Verdict {
        self.evaluator
            .evaluate(&mut self.state, &self.roster, &self.transcript)
    }

    async fn finish(&self) -> PublishResult {
        let artifact = self.state.extracted_artifact();
        self.events.approved(artifact.is_some());
        let result = self.publisher.publish(artifact).await;
        info!(outcome = %result.summary(), "Session approved");
        self.events.published(&result);
        result
    }
}
