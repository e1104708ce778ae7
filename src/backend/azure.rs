//! Azure OpenAI chat-completions client.
//!
//! Each role is a separate "agent" sharing one deployment: the role brief is
//! the system message and the transcript is replayed as chat history. The
//! role's own earlier turns become `assistant` messages; user turns and the
//! other roles' turns become `user` messages tagged with the speaker's name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GenerationBackend, NextSpeaker};
use crate::errors::BackendError;
use crate::roles::{Role, Roster};
use crate::transcript::{Speaker, Transcript};

pub const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Connection settings for one Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, name: Option<&str>, content: &str) -> Self {
        Self {
            role: role.to_string(),
            name: name.map(sanitize_name),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// The `name` field only accepts `[A-Za-z0-9_-]`.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn system_prompt(role: &Role, roster: &Roster) -> String {
    let teammates: Vec<&str> = roster
        .roles()
        .iter()
        .filter(|r| r.name != role.name)
        .map(|r| r.name.as_str())
        .collect();
    if teammates.is_empty() {
        role.brief.clone()
    } else {
        format!(
            "{}\n\nYour name is {}. You are working with: {}.",
            role.brief,
            role.name,
            teammates.join(", ")
        )
    }
}

/// Replay the transcript as chat history from `role`'s point of view.
pub fn build_messages(role: &Role, roster: &Roster, transcript: &Transcript) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(ChatMessage::new("system", None, &system_prompt(role, roster)));
    for turn in transcript.turns() {
        let message = match &turn.speaker {
            Speaker::User => ChatMessage::new("user", None, &turn.body),
            Speaker::Role(name) if *name == role.name => {
                ChatMessage::new("assistant", Some(name), &turn.body)
            }
            Speaker::Role(name) => ChatMessage::new("user", Some(name), &turn.body),
        };
        messages.push(message);
    }
    messages
}

fn selection_messages(roster: &Roster, transcript: &Transcript) -> Vec<ChatMessage> {
    let names: Vec<&str> = roster.roles().iter().map(|r| r.name.as_str()).collect();
    let history: Vec<String> = transcript
        .turns()
        .iter()
        .map(|t| format!("{}: {}", t.speaker, t.body))
        .collect();
    let instructions = format!(
        "You moderate a conversation between these participants: {}.\n\
         Decide who should speak next so the team makes progress on the user's request.\n\
         The engineer implements after requirements are written; the reviewer ({}) reviews after code is shared.\n\
         If the team needs an answer or an approval from the customer, reply with USER.\n\
         Otherwise reply with the participant's name only.",
        names.join(", "),
        roster.reviewer().name
    );
    vec![
        ChatMessage::new("system", None, &instructions),
        ChatMessage::new("user", None, &history.join("\n\n")),
    ]
}

/// A bare "USER" hands the round back; otherwise the earliest roster name
/// mentioned in the moderator's reply wins. Names starting at the same
/// position resolve to the longest, so `DevOps` is never read as `Dev`.
fn parse_choice(reply: &str, roster: &Roster) -> NextSpeaker {
    let trimmed = reply.trim().trim_end_matches('.');
    if trimmed.eq_ignore_ascii_case("user") {
        return NextSpeaker::User;
    }
    roster
        .roles()
        .iter()
        .filter_map(|r| reply.find(r.name.as_str()).map(|idx| (idx, r)))
        .min_by_key(|(idx, r)| (*idx, std::cmp::Reverse(r.name.len())))
        .map(|(_, r)| NextSpeaker::Role(r.name.clone()))
        .unwrap_or(NextSpeaker::Undecided)
}

pub struct AzureOpenAiBackend {
    settings: BackendSettings,
    http: reqwest::Client,
}

impl AzureOpenAiBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment,
            self.settings.api_version
        )
    }

    async fn complete(&self, messages: &[ChatMessage], label: &str) -> Result<String, BackendError> {
        let body = ChatRequest {
            messages,
            max_tokens: self.settings.max_tokens,
        };
        debug!(
            deployment = %self.settings.deployment,
            messages = messages.len(),
            label,
            "Sending chat completion request"
        );

        let resp = self
            .http
            .post(self.completions_url())
            .header("api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), label, "Chat completion request rejected");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| BackendError::EmptyReply {
                role: label.to_string(),
            })
    }
}

#[async_trait]
impl GenerationBackend for AzureOpenAiBackend {
    async fn generate(
        &self,
        role: &Role,
        roster: &Roster,
        transcript: &Transcript,
    ) -> Result<String, BackendError> {
        let messages = build_messages(role, roster, transcript);
        self.complete(&messages, &role.name).await
    }

    async fn choose_next(
        &self,
        roster: &Roster,
        transcript: &Transcript,
    ) -> Result<NextSpeaker, BackendError> {
        let messages = selection_messages(roster, transcript);
        let reply = self.complete(&messages, "selection").await?;
        let choice = parse_choice(&reply, roster);
        if choice == NextSpeaker::Undecided {
            debug!(reply = %reply, "Selection reply named no known role");
        }
        Ok(choice)
    }
}
