//! Generation backend abstraction.
//!
//! The session never talks to a model directly. It asks a
//! [`GenerationBackend`] for the next message of a given role, and (for
//! dynamic selection) which role should speak next.
//!
//! Real implementation: [`AzureOpenAiBackend`]. Tests use scripted doubles.

mod azure;

pub use azure::{AzureOpenAiBackend, BackendSettings, DEFAULT_API_VERSION};

use async_trait::async_trait;

use crate::errors::BackendError;
use crate::roles::{Role, Roster};
use crate::transcript::Transcript;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce the next message body for `role`, given everything said so far.
    async fn generate(
        &self,
        role: &Role,
        roster: &Roster,
        transcript: &Transcript,
    ) -> Result<String, BackendError>;

    /// Decide who speaks next. Only consulted by dynamic selection.
    async fn choose_next(
        &self,
        _roster: &Roster,
        _transcript: &Transcript,
    ) -> Result<NextSpeaker, BackendError> {
        Ok(NextSpeaker::Undecided)
    }
}

/// A backend's answer to "who speaks next?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextSpeaker {
    /// A role from the roster.
    Role(String),
    /// The team is waiting on the user; the round is over.
    User,
    /// No usable answer; the caller picks.
    Undecided,
}
