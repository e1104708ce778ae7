//! Layered configuration for crewloop.
//!
//! Settings come from three layers, later layers winning:
//! 1. `crewloop.toml` in the project directory (optional)
//! 2. environment (`.env` is loaded by the binary before this runs)
//! 3. CLI flags
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! endpoint = "https://my-resource.openai.azure.com/"
//! deployment = "gpt-4o"
//! api_version = "2024-06-01"
//!
//! [session]
//! selection = "rotation"      # or "dynamic"
//! rotation_passes = 1
//! max_turns_per_round = 6
//! generation_timeout_secs = 120
//!
//! [markers]
//! approval_token = "APPROVED"
//! readiness_marker = "READY FOR USER APPROVAL"
//! artifact_tag = "html"
//!
//! [publish]
//! output_path = "output/index.html"
//! command = "bash ./push_to_github.sh"
//!
//! [[roles]]
//! name = "BusinessAnalyst"
//! brief = "..."
//!
//! [[roles]]
//! name = "ProductOwner"
//! brief = "..."
//! reviewer = true
//! ```
//!
//! The API key is never read from the file; it comes from
//! `AZURE_OPENAI_API_KEY` or `--api-key`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendSettings, DEFAULT_API_VERSION};
use crate::errors::ConfigError;
use crate::extract::{ArtifactExtractor, DEFAULT_ARTIFACT_TAG};
use crate::publish::{DEFAULT_OUTPUT_PATH, DEFAULT_PUBLISH_COMMAND, Publisher};
use crate::roles::{Role, Roster};
use crate::selection::SelectionKind;
use crate::session::DEFAULT_MAX_TURNS_PER_ROUND;
use crate::termination::{DEFAULT_APPROVAL_TOKEN, DEFAULT_READINESS_MARKER, TerminationEvaluator};

pub const CONFIG_FILE_NAME: &str = "crewloop.toml";

/// Per-project state directory (logs).
pub const STATE_DIR: &str = ".crewloop";

pub fn log_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(STATE_DIR).join("logs")
}

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: default_api_version(),
            max_tokens: None,
        }
    }
}

/// Turn-taking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default)]
    pub selection: SelectionKind,
    /// Trips round the roster per user message (rotation only)
    #[serde(default = "default_rotation_passes")]
    pub rotation_passes: usize,
    /// Hard cap on generated turns per user message
    #[serde(default = "default_max_turns_per_round")]
    pub max_turns_per_round: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_timeout_secs: Option<u64>,
}

fn default_rotation_passes() -> usize {
    1
}

fn default_max_turns_per_round() -> usize {
    DEFAULT_MAX_TURNS_PER_ROUND
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            selection: SelectionKind::default(),
            rotation_passes: default_rotation_passes(),
            max_turns_per_round: default_max_turns_per_round(),
            generation_timeout_secs: None,
        }
    }
}

/// Literal tokens the termination check looks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkersSection {
    #[serde(default = "default_approval_token")]
    pub approval_token: String,
    #[serde(default = "default_readiness_marker")]
    pub readiness_marker: String,
    #[serde(default = "default_artifact_tag")]
    pub artifact_tag: String,
}

fn default_approval_token() -> String {
    DEFAULT_APPROVAL_TOKEN.to_string()
}

fn default_readiness_marker() -> String {
    DEFAULT_READINESS_MARKER.to_string()
}

fn default_artifact_tag() -> String {
    DEFAULT_ARTIFACT_TAG.to_string()
}

impl MarkersSection {
    /// Every marker must be non-blank: an empty token matches any text.
    pub fn check(&self) -> Result<(), ConfigError> {
        let markers = [
            ("approval_token", &self.approval_token),
            ("readiness_marker", &self.readiness_marker),
            ("artifact_tag", &self.artifact_tag),
        ];
        match markers.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(ConfigError::InvalidMarker(*name)),
            None => Ok(()),
        }
    }
}

impl Default for MarkersSection {
    fn default() -> Self {
        Self {
            approval_token: default_approval_token(),
            readiness_marker: default_readiness_marker(),
            artifact_tag: default_artifact_tag(),
        }
    }
}

/// Where the artifact goes and how it is pushed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSection {
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Shell command run after saving; empty disables the push
    #[serde(default = "default_publish_command")]
    pub command: String,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_publish_command() -> String {
    DEFAULT_PUBLISH_COMMAND.to_string()
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            command: default_publish_command(),
        }
    }
}

/// One entry of a roster override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    pub name: String,
    pub brief: String,
    #[serde(default)]
    pub reviewer: bool,
}

/// The complete crewloop.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub markers: MarkersSection,
    #[serde(default)]
    pub publish: PublishSection,
    /// Replaces the built-in roster when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleEntry>,
}

impl CrewToml {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `crewloop.toml` from `project_dir`, or defaults when absent.
    pub fn load_or_default(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = project_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        let content = toml::to_string_pretty(self).context("Failed to serialize crewloop.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Build the roster: the `[[roles]]` override if present, else the default team.
    pub fn roster(&self) -> Result<Roster, ConfigError> {
        if self.roles.is_empty() {
            return Ok(Roster::default());
        }
        let reviewers: Vec<&RoleEntry> = self.roles.iter().filter(|r| r.reviewer).collect();
        let reviewer = match reviewers.as_slice() {
            [only] => only.name.clone(),
            [] => {
                return Err(ConfigError::InvalidRoster(
                    "no role is marked `reviewer = true`".to_string(),
                ));
            }
            _ => {
                return Err(ConfigError::InvalidRoster(
                    "more than one role is marked `reviewer = true`".to_string(),
                ));
            }
        };
        let roles = self
            .roles
            .iter()
            .map(|r| Role::new(r.name.clone(), r.brief.clone()))
            .collect();
        Roster::new(roles, reviewer)
    }

    /// Non-fatal problems worth telling the user about.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let roster = match self.roster() {
            Ok(roster) => Some(roster),
            Err(e) => {
                warnings.push(e.to_string());
                None
            }
        };
        if let Err(e) = self.markers.check() {
            warnings.push(e.to_string());
        }
        if self.session.max_turns_per_round == 0 {
            warnings.push("session.max_turns_per_round is 0; treated as 1".to_string());
        }
        if let Some(roster) = roster {
            let cap = self.session.max_turns_per_round.max(1);
            let passes = self.session.rotation_passes.max(1);
            if let Err(e) = check_turn_cap(self.session.selection, cap, roster.len()) {
                warnings.push(e.to_string());
            } else if self.session.selection == SelectionKind::Rotation
                && cap < roster.len() * passes
            {
                warnings.push(format!(
                    "session.max_turns_per_round ({}) cuts rotation short of {} turns",
                    cap,
                    roster.len() * passes
                ));
            }
        }
        if self.publish.command.trim().is_empty() {
            warnings.push("publish.command is empty; artifacts will be saved but not pushed".to_string());
        }
        warnings
    }
}

/// Rotation restarts at the first role after every user line, so a cap below
/// the roster size means the last roles (the reviewer, by default) never speak.
fn check_turn_cap(selection: SelectionKind, cap: usize, roles: usize) -> Result<(), ConfigError> {
    if selection == SelectionKind::Rotation && cap < roles {
        return Err(ConfigError::TurnCapTooLow { cap, roles });
    }
    Ok(())
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub selection: Option<SelectionKind>,
    pub max_turns_per_round: Option<usize>,
    pub generation_timeout_secs: Option<u64>,
    pub output_path: Option<PathBuf>,
    pub no_push: bool,
}

/// Effective configuration after layering.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    /// The file the settings were read from, if any
    pub config_file: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: String,
    pub max_tokens: Option<u32>,
    pub roster: Roster,
    pub selection: SelectionKind,
    pub rotation_passes: usize,
    pub max_turns_per_round: usize,
    pub generation_timeout: Option<Duration>,
    pub approval_token: String,
    pub readiness_marker: String,
    pub artifact_tag: String,
    pub output_path: PathBuf,
    pub publish_command: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load from `project_dir` using the process environment.
    pub fn load(project_dir: &Path, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve(project_dir, |key| std::env::var(key).ok(), overrides)
    }

    /// Load with an explicit environment lookup.
    pub fn resolve(
        project_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let file_path = project_dir.join(CONFIG_FILE_NAME);
        let config_file = file_path.exists().then_some(file_path);
        let toml = match &config_file {
            Some(path) => CrewToml::load(path)?,
            None => CrewToml::default(),
        };
        let roster = toml.roster()?;
        toml.markers.check()?;

        let selection = overrides.selection.unwrap_or(toml.session.selection);
        let max_turns_per_round = overrides
            .max_turns_per_round
            .unwrap_or(toml.session.max_turns_per_round)
            .max(1);
        check_turn_cap(selection, max_turns_per_round, roster.len())?;

        let endpoint = non_empty(overrides.endpoint)
            .or_else(|| non_empty(env(ENV_ENDPOINT)))
            .or_else(|| non_empty(toml.backend.endpoint.clone()));
        let api_key = non_empty(overrides.api_key).or_else(|| non_empty(env(ENV_API_KEY)));
        let deployment = non_empty(overrides.deployment)
            .or_else(|| non_empty(env(ENV_DEPLOYMENT)))
            .or_else(|| non_empty(toml.backend.deployment.clone()));

        let publish_command = if overrides.no_push {
            None
        } else {
            non_empty(Some(toml.publish.command.clone()))
        };

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config_file,
            endpoint,
            api_key,
            deployment,
            api_version: toml.backend.api_version.clone(),
            max_tokens: toml.backend.max_tokens,
            roster,
            selection,
            rotation_passes: toml.session.rotation_passes.max(1),
            max_turns_per_round,
            generation_timeout: overrides
                .generation_timeout_secs
                .or(toml.session.generation_timeout_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            approval_token: toml.markers.approval_token,
            readiness_marker: toml.markers.readiness_marker,
            artifact_tag: toml.markers.artifact_tag,
            output_path: overrides.output_path.unwrap_or(toml.publish.output_path),
            publish_command,
        })
    }

    /// Backend settings, failing if any of the three required values is missing.
    pub fn backend_settings(&self) -> Result<BackendSettings, ConfigError> {
        let endpoint = self.endpoint.clone().ok_or(ConfigError::MissingValue {
            name: "endpoint",
            env: ENV_ENDPOINT,
            flag: "--endpoint",
        })?;
        let api_key = self.api_key.clone().ok_or(ConfigError::MissingValue {
            name: "api key",
            env: ENV_API_KEY,
            flag: "--api-key",
        })?;
        let deployment = self.deployment.clone().ok_or(ConfigError::MissingValue {
            name: "deployment",
            env: ENV_DEPLOYMENT,
            flag: "--deployment",
        })?;
        Ok(BackendSettings {
            endpoint,
            api_key,
            deployment,
            api_version: self.api_version.clone(),
            max_tokens: self.max_tokens,
        })
    }

    pub fn evaluator(&self) -> TerminationEvaluator {
        TerminationEvaluator::new(
            &self.approval_token,
            &self.readiness_marker,
            ArtifactExtractor::new(&self.artifact_tag),
        )
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(
            &self.project_dir,
            &self.output_path,
            self.publish_command.clone(),
        )
    }

    /// Directory for log files, relative to the project.
    pub fn log_dir(&self) -> PathBuf {
        log_dir(&self.project_dir)
    }

    /// API key with all but the last four characters masked.
    pub fn redacted_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let visible: String = key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if key.chars().count() <= 4 {
                "****".to_string()
            } else {
                format!("****{}", visible)
            }
        })
    }
}
