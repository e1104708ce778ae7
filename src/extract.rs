//! Artifact extraction from free-form role output.
//!
//! Finds the first fenced code block tagged with the artifact format, e.g.
//!
//! ````text
//! ```html
//! <div>calc</div>
//! ```
//! ````
//!
//! and returns its trimmed interior. The opening tag is case-sensitive and
//! the content may start on the same line as the tag.

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_ARTIFACT_TAG: &str = "html";

static HTML_FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| fence_regex(DEFAULT_ARTIFACT_TAG));

fn fence_regex(tag: &str) -> Regex {
    let pattern = format!(r"(?s)```{}\s*(.*?)```", regex::escape(tag));
    Regex::new(&pattern).expect("fence pattern with an escaped tag is valid")
}

/// Extractor for one artifact format.
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    tag: String,
    fence: Regex,
}

impl ArtifactExtractor {
    pub fn new(tag: &str) -> Self {
        let fence = if tag == DEFAULT_ARTIFACT_TAG {
            HTML_FENCE_REGEX.clone()
        } else {
            fence_regex(tag)
        };
        Self {
            tag: tag.to_string(),
            fence,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Trimmed content of the first well-formed fenced block, or `None`.
    ///
    /// An empty block yields `Some("")`; callers that need an artifact check
    /// for non-empty content.
    pub fn extract(&self, body: &str) -> Option<String> {
        first_fenced(&self.fence, body)
    }
}

impl Default for ArtifactExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_TAG)
    }
}

/// Extract the first ```` ```html ```` block from `body`.
pub fn extract_html(body: &str) -> Option<String> {
    first_fenced(&HTML_FENCE_REGEX, body)
}

fn first_fenced(fence: &Regex, body: &str) -> Option<String> {
    fence
        .captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
}
