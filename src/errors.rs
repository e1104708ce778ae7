//! Typed error hierarchy for crewloop.
//!
//! Two enums cover the two places a session can fail before or during a
//! round:
//! - `ConfigError`: startup-fatal; the session never starts
//! - `BackendError`: per-round; the round is abandoned, the session lives on
//!
//! Publish failures are not errors here: they come back as
//! [`crate::publish::PublishResult`] values so that "not saved" and "saved
//! but not pushed" stay distinguishable.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration problems detected before a session starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {name} (set {env} or pass {flag})")]
    MissingValue {
        name: &'static str,
        env: &'static str,
        flag: &'static str,
    },

    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid roster: {0}")]
    InvalidRoster(String),

    #[error("Invalid selection strategy '{0}'. Valid values: rotation, dynamic")]
    InvalidSelection(String),

    #[error("markers.{0} must not be empty")]
    InvalidMarker(&'static str),

    #[error(
        "max_turns_per_round ({cap}) is below the roster size ({roles}); rotation would never reach every role"
    )]
    TurnCapTooLow { cap: usize, roles: usize },
}

/// Failures of the generation backend. Recoverable: the current round is
/// aborted and the session waits for the next user line.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Generation request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode generation response: {0}")]
    Decode(String),

    #[error("Generation backend returned an empty reply for {role}")]
    EmptyReply { role: String },

    #[error("Generation for {role} timed out after {}s", .after.as_secs())]
    Timeout { role: String, after: Duration },
}

impl BackendError {
    /// Authentication and quota failures will not clear up by themselves.
    pub fn is_auth_or_quota(&self) -> bool {
        matches!(self, BackendError::Status { status, .. } if *status == 401 || *status == 403 || *status == 429)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_value_names_env_and_flag() {
        let err = ConfigError::MissingValue {
            name: "endpoint",
            env: "AZURE_OPENAI_ENDPOINT",
            flag: "--endpoint",
        };
        let msg = err.to_string();
        assert!(msg.contains("endpoint"));
        assert!(msg.contains("AZURE_OPENAI_ENDPOINT"));
        assert!(msg.contains("--endpoint"));
    }

    #[test]
    fn config_error_read_carries_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::Read {
            path: PathBuf::from("/work/crewloop.toml"),
            source: io_err,
        };
        match &err {
            ConfigError::Read { path, source } => {
                assert_eq!(path, &PathBuf::from("/work/crewloop.toml"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Read"),
        }
    }

    #[test]
    fn backend_error_timeout_reports_seconds() {
        let err = BackendError::Timeout {
            role: "SoftwareEngineer".to_string(),
            after: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "Generation for SoftwareEngineer timed out after 30s"
        );
    }

    #[test]
    fn backend_error_auth_and_quota_are_classified() {
        let auth = BackendError::Status {
            status: 401,
            body: "bad key".into(),
        };
        let quota = BackendError::Status {
            status: 429,
            body: "slow down".into(),
        };
        let server = BackendError::Status {
            status: 500,
            body: "oops".into(),
        };
        assert!(auth.is_auth_or_quota());
        assert!(quota.is_auth_or_quota());
        assert!(!server.is_auth_or_quota());
        assert!(!BackendError::Decode("x".into()).is_auth_or_quota());
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigError::InvalidRoster("x".into()));
        assert_std_error(&BackendError::EmptyReply { role: "x".into() });
    }
}
