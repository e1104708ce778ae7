//! Role selection strategies.
//!
//! A round starts when the user speaks and ends when the strategy returns
//! `None`. Two strategies ship:
//!
//! | Strategy   | Next speaker                                  | Round ends                         |
//! |------------|-----------------------------------------------|------------------------------------|
//! | `Rotation` | roster order, starting from the first role    | after `passes` trips round the roster |
//! | `Dynamic`  | whoever the backend names                     | when the backend hands back to the user |
//!
//! The session additionally caps every round at `max_turns_per_round`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{GenerationBackend, NextSpeaker};
use crate::errors::{BackendError, ConfigError};
use crate::roles::Roster;
use crate::transcript::Transcript;

/// Picks the next role to speak in the current round.
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    /// Name of the next role, or `None` when the round is complete.
    async fn next_role(
        &self,
        roster: &Roster,
        transcript: &Transcript,
        backend: &dyn GenerationBackend,
    ) -> Result<Option<String>, BackendError>;

    fn name(&self) -> &'static str;
}

/// Which strategy a session uses, as spelled in config and on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    #[default]
    Rotation,
    Dynamic,
}

impl std::fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionKind::Rotation => write!(f, "rotation"),
            SelectionKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl std::str::FromStr for SelectionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rotation" | "round-robin" | "sequential" => Ok(SelectionKind::Rotation),
            "dynamic" => Ok(SelectionKind::Dynamic),
            _ => Err(ConfigError::InvalidSelection(s.to_string())),
        }
    }
}

impl SelectionKind {
    pub fn build(self, rotation_passes: usize) -> Box<dyn SelectionStrategy> {
        match self {
            SelectionKind::Rotation => Box::new(Rotation::new(rotation_passes)),
            SelectionKind::Dynamic => Box::new(Dynamic),
        }
    }
}

/// Fixed-order rotation through the roster.
///
/// Stateless: position is derived from how many roles have spoken since the
/// last user turn, so a backend failure mid-round needs no bookkeeping.
#[derive(Debug, Clone)]
pub struct Rotation {
    passes: usize,
}

impl Rotation {
    pub fn new(passes: usize) -> Self {
        Self {
            passes: passes.max(1),
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl SelectionStrategy for Rotation {
    async fn next_role(
        &self,
        roster: &Roster,
        transcript: &Transcript,
        _backend: &dyn GenerationBackend,
    ) -> Result<Option<String>, BackendError> {
        let spoken = transcript.role_turns_since_user();
        if roster.is_empty() || spoken >= roster.len() * self.passes {
            return Ok(None);
        }
        Ok(Some(roster.roles()[spoken % roster.len()].name.clone()))
    }

    fn name(&self) -> &'static str {
        "rotation"
    }
}

/// The backend names the next speaker. Undecided or unknown answers fall
/// back to the role after the last speaker in roster order.
#[derive(Debug, Clone, Default)]
pub struct Dynamic;

fn successor(roster: &Roster, transcript: &Transcript) -> Option<String> {
    let next_index = transcript
        .last_role_turn()
        .and_then(|t| t.speaker.role_name())
        .and_then(|name| roster.position(name))
        .map(|pos| (pos + 1) % roster.len())
        .unwrap_or(0);
    roster.roles().get(next_index).map(|r| r.name.clone())
}

#[async_trait]
impl SelectionStrategy for Dynamic {
    async fn next_role(
        &self,
        roster: &Roster,
        transcript: &Transcript,
        backend: &dyn GenerationBackend,
    ) -> Result<Option<String>, BackendError> {
        match backend.choose_next(roster, transcript).await? {
            NextSpeaker::Role(name) if roster.get(&name).is_some() => Ok(Some(name)),
            NextSpeaker::User => {
                debug!("Backend handed the round back to the user");
                Ok(None)
            }
            other => {
                debug!(choice = ?other, "No usable choice; falling back to roster order");
                Ok(successor(roster, transcript))
            }
        }
    }

    fn name(&self) -> &'static str {
        "dynamic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{BUSINESS_ANALYST, PRODUCT_OWNER, Role, SOFTWARE_ENGINEER};
    use crate::transcript::Turn;

    /// Backend double that only answers selection questions.
    struct Moderator(NextSpeaker);

    #[async_trait]
    impl GenerationBackend for Moderator {
        async fn generate(
            &self,
            _role: &Role,
            _roster: &Roster,
            _transcript: &Transcript,
        ) -> Result<String, BackendError> {
            Ok(String::new())
        }

        async fn choose_next(
            &self,
            _roster: &Roster,
            _transcript: &Transcript,
        ) -> Result<NextSpeaker, BackendError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_rotation_single_pass() {
        let roster = Roster::default();
        let backend = Moderator(NextSpeaker::Undecided);
        let rotation = Rotation::default();
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("build a calculator"));

        let mut order = Vec::new();
        while let Some(name) = rotation.next_role(&roster, &transcript, &backend).await.unwrap() {
            transcript.push(Turn::role(name.clone(), "..."));
            order.push(name);
        }
        assert_eq!(order, vec![BUSINESS_ANALYST, SOFTWARE_ENGINEER, PRODUCT_OWNER]);
    }

    #[tokio::test]
    async fn test_rotation_restarts_after_user_turn() {
        let roster = Roster::default();
        let backend = Moderator(NextSpeaker::Undecided);
        let rotation = Rotation::default();
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("first"));
        transcript.push(Turn::role(BUSINESS_ANALYST, "a"));
        transcript.push(Turn::user("actually, add a dark mode"));
        let next = rotation.next_role(&roster, &transcript, &backend).await.unwrap();
        assert_eq!(next.as_deref(), Some(BUSINESS_ANALYST));
    }

    #[tokio::test]
    async fn test_rotation_multiple_passes() {
        let roster = Roster::default();
        let backend = Moderator(NextSpeaker::Undecided);
        let rotation = Rotation::new(2);
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("go"));
        let mut count = 0;
        while let Some(name) = rotation.next_role(&roster, &transcript, &backend).await.unwrap() {
            transcript.push(Turn::role(name, "..."));
            count += 1;
        }
        assert_eq!(count, 6);
        assert_eq!(
            transcript.latest().unwrap().speaker.role_name(),
            Some(PRODUCT_OWNER)
        );
    }

    #[tokio::test]
    async fn test_dynamic_follows_backend_choice() {
        let roster = Roster::default();
        let backend = Moderator(NextSpeaker::Role(PRODUCT_OWNER.to_string()));
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("go"));
        let next = Dynamic.next_role(&roster, &transcript, &backend).await.unwrap();
        assert_eq!(next.as_deref(), Some(PRODUCT_OWNER));
    }

    #[tokio::test]
    async fn test_dynamic_user_choice_ends_round() {
        let roster = Roster::default();
        let backend = Moderator(NextSpeaker::User);
        let next = Dynamic
            .next_role(&roster, &Transcript::new(), &backend)
            .await
            .unwrap();
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_dynamic_unknown_role_falls_back_to_successor() {
        let roster = Roster::default();
        let backend = Moderator(NextSpeaker::Role("Intern".to_string()));
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("go"));
        transcript.push(Turn::role(PRODUCT_OWNER, "back to you"));
        let next = Dynamic.next_role(&roster, &transcript, &backend).await.unwrap();
        assert_eq!(next.as_deref(), Some(BUSINESS_ANALYST));
    }

    #[tokio::test]
    async fn test_dynamic_undecided_starts_with_first_role() {
        let roster = Roster::default();
        let backend = Moderator(NextSpeaker::Undecided);
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("go"));
        let next = Dynamic.next_role(&roster, &transcript, &backend).await.unwrap();
        assert_eq!(next.as_deref(), Some(BUSINESS_ANALYST));
    }

    #[test]
    fn test_selection_kind_parsing() {
        assert_eq!("rotation".parse::<SelectionKind>().unwrap(), SelectionKind::Rotation);
        assert_eq!("Dynamic".parse::<SelectionKind>().unwrap(), SelectionKind::Dynamic);
        assert_eq!("round-robin".parse::<SelectionKind>().unwrap(), SelectionKind::Rotation);
        let err = "random".parse::<SelectionKind>().unwrap_err();
        assert!(err.to_string().contains("random"));
    }

    #[test]
    fn test_selection_kind_builds_named_strategy() {
        assert_eq!(SelectionKind::Rotation.build(1).name(), "rotation");
        assert_eq!(SelectionKind::Dynamic.build(1).name(), "dynamic");
    }
}
