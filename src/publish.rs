//! Artifact persistence and publishing.
//!
//! Publishing is two sequential, non-transactional steps:
//! 1. write the artifact to the output path (overwriting, no versioning)
//! 2. run the publish command (`sh -c <command>`) from the project directory
//!
//! A failed push leaves the file on disk. The result type keeps "not saved"
//! and "saved but not pushed" apart so a human can retry the push by hand
//! (`crewloop publish`).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

pub const DEFAULT_OUTPUT_PATH: &str = "output/index.html";
pub const DEFAULT_PUBLISH_COMMAND: &str = "bash ./push_to_github.sh";

/// Outcome of a publish attempt.
#[derive(Debug)]
pub enum PublishResult {
    /// Written; no publish command configured.
    Saved { path: PathBuf },
    /// Written and the publish command exited 0.
    SavedAndPushed { path: PathBuf, output: String },
    /// Nothing to publish; no filesystem or process action was taken.
    NoArtifact,
    /// The write failed; nothing was pushed.
    SaveFailed {
        path: PathBuf,
        error: std::io::Error,
    },
    /// The file is on disk but the publish command failed.
    PushFailed { path: PathBuf, diagnostic: String },
}

impl PublishResult {
    /// Whether the artifact is on disk after this attempt.
    pub fn is_saved(&self) -> bool {
        matches!(
            self,
            PublishResult::Saved { .. }
                | PublishResult::SavedAndPushed { .. }
                | PublishResult::PushFailed { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PublishResult::Saved { .. } | PublishResult::SavedAndPushed { .. }
        )
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            PublishResult::Saved { path } => format!("HTML saved to {}", path.display()),
            PublishResult::SavedAndPushed { path, .. } => {
                format!("HTML saved to {} and published", path.display())
            }
            PublishResult::NoArtifact => {
                "No HTML code found to save or publish, even though approval was given".to_string()
            }
            PublishResult::SaveFailed { path, error } => {
                format!("Failed to save HTML to {}: {}", path.display(), error)
            }
            PublishResult::PushFailed { path, diagnostic } => format!(
                "HTML saved to {} but publishing failed: {}",
                path.display(),
                diagnostic
            ),
        }
    }
}

/// Writes the artifact and runs the publish command.
#[derive(Debug, Clone)]
pub struct Publisher {
    project_dir: PathBuf,
    output_path: PathBuf,
    command: Option<String>,
}

impl Publisher {
    /// `output_path` is resolved against `project_dir` when relative. A blank
    /// `command` disables the push step.
    pub fn new(
        project_dir: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
        command: Option<String>,
    ) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        let output_path = output_path.as_ref();
        let output_path = if output_path.is_absolute() {
            output_path.to_path_buf()
        } else {
            project_dir.join(output_path)
        };
        Self {
            project_dir,
            output_path,
            command: command.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Persist `artifact` and push it.
    pub async fn publish(&self, artifact: Option<&str>) -> PublishResult {
        let Some(artifact) = artifact.filter(|a| !a.is_empty()) else {
            warn!("Approval given but no artifact was extracted");
            return PublishResult::NoArtifact;
        };

        if let Err(error) = self.save(artifact).await {
            warn!(path = %self.output_path.display(), error = %error, "Failed to save artifact");
            return PublishResult::SaveFailed {
                path: self.output_path.clone(),
                error,
            };
        }
        info!(path = %self.output_path.display(), bytes = artifact.len(), "Artifact saved");

        self.push().await
    }

    /// Re-run the push step for an artifact already on disk.
    pub async fn publish_existing(&self) -> PublishResult {
        match tokio::fs::metadata(&self.output_path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => self.push().await,
            _ => PublishResult::NoArtifact,
        }
    }

    async fn save(&self, artifact: &str) -> std::io::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.output_path, artifact).await
    }

    async fn push(&self) -> PublishResult {
        let path = self.output_path.clone();
        let Some(command) = &self.command else {
            return PublishResult::Saved { path };
        };

        info!(command = %command, "Running publish command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let combined = [stdout.trim(), stderr.trim()]
                    .iter()
                    .filter(|s| !s.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join("\n");

                if output.status.success() {
                    info!("Publish command succeeded");
                    PublishResult::SavedAndPushed {
                        path,
                        output: combined,
                    }
                } else {
                    let code = output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    warn!(exit = %code, "Publish command failed");
                    let diagnostic = if combined.is_empty() {
                        format!("`{}` exited with {}", command, code)
                    } else {
                        format!("`{}` exited with {}: {}", command, code, combined)
                    };
                    PublishResult::PushFailed { path, diagnostic }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to spawn publish command");
                PublishResult::PushFailed {
                    path,
                    diagnostic: format!("Failed to run `{}`: {}", command, e),
                }
            }
        }
    }
}
