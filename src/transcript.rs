//! Conversation transcript.
//!
//! The transcript is the single ordered record of a session: user lines and
//! role replies, appended in the order they happen. Insertion order is what
//! "latest message" means everywhere else in the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Speaker {
    /// The human at the terminal.
    User,
    /// A named role from the roster.
    Role(String),
}

impl Speaker {
    /// Role name, present iff the speaker is a role.
    pub fn role_name(&self) -> Option<&str> {
        match self {
            Speaker::User => None,
            Speaker::Role(name) => Some(name.as_str()),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Speaker::User)
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::User => write!(f, "USER"),
            Speaker::Role(name) => write!(f, "{}", name),
        }
    }
}

/// A single message in the transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub body: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(body: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            body: body.into(),
            at: Utc::now(),
        }
    }

    pub fn role(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Role(name.into()),
            body: body.into(),
            at: Utc::now(),
        }
    }
}

/// Append-only, ordered sequence of turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return a reference to it as stored.
    pub fn push(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn latest(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn spoken by any role (skips user turns).
    pub fn last_role_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| !t.speaker.is_user())
    }

    /// Number of role turns since the most recent user turn.
    pub fn role_turns_since_user(&self) -> usize {
        self.turns
            .iter()
            .rev()
            .take_while(|t| !t.speaker.is_user())
            .count()
    }
}
