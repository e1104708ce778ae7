//! Terminal rendering of a chat session: spinner, role turns, and publish outcomes.

use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::errors::BackendError;
use crate::publish::PublishResult;
use crate::roles::Roster;
use crate::session::{EXIT_COMMAND, SessionEvents};
use crate::transcript::Turn;
use crate::ui::icons::{CHECK, CROSS, FILE_NEW, HOURGLASS, ROCKET, SPARKLE, SPEECH, WARN};

const FENCE: &str = "```";
const MAX_WIDTH: usize = 120;
const FALLBACK_WIDTH: usize = 100;
const BODY_INDENT: &str = "  ";

/// Terminal renderer for a chat session.
///
/// A spinner runs while a role is generating; it is cleared before the turn
/// is printed so output never interleaves with the animation.
pub struct ChatUI {
    spinner: Mutex<Option<ProgressBar>>,
    width: usize,
}

impl ChatUI {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
            width: terminal_width(),
        }
    }

    /// Print the session banner.
    pub fn welcome(&self, roster: &Roster, selection: &str, approval_token: &str) {
        println!();
        println!("{}{}", SPARKLE, style("crewloop").bold());
        println!(
            "Team: {} (reviewer: {}, selection: {})",
            roster
                .roles()
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            style(&roster.reviewer().name).cyan(),
            selection
        );
        println!(
            "{}",
            style(format!(
                "Describe the app you want. Type '{}' to publish the reviewed result, or '{}' to quit.",
                approval_token, EXIT_COMMAND
            ))
            .dim()
        );
        println!();
    }

    fn stop_spinner(&self) {
        if let Some(bar) = self.spinner.lock().ok().and_then(|mut s| s.take()) {
            bar.finish_and_clear();
        }
    }
}

impl Default for ChatUI {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents for ChatUI {
    fn generating(&self, role: &str) {
        self.stop_spinner();
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .expect("spinner template is a valid static string"),
        );
        bar.set_message(format!("{}{} is thinking...", HOURGLASS, style(role).cyan()));
        bar.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut spinner) = self.spinner.lock() {
            *spinner = Some(bar);
        }
    }

    fn turn(&self, turn: &Turn) {
        self.stop_spinner();
        if turn.speaker.is_user() {
            return;
        }
        println!("{}{}", SPEECH, style(format!("{}:", turn.speaker)).bold().cyan());
        println!("{}", render_body(&turn.body, self.width));
        println!();
    }

    fn backend_failed(&self, role: &str, error: &BackendError) {
        self.stop_spinner();
        eprintln!(
            "{}{} {}",
            CROSS,
            style(format!("Generation failed while {} was speaking:", role)).red(),
            error
        );
        if error.is_auth_or_quota() {
            eprintln!(
                "{}",
                style("  Check AZURE_OPENAI_API_KEY and the deployment's quota.").yellow()
            );
        }
        eprintln!(
            "{}",
            style("  The round was abandoned. Type your next message to continue.").dim()
        );
        println!();
    }

    fn round_limit_reached(&self, limit: usize) {
        self.stop_spinner();
        println!(
            "{}",
            style(format!("Turn limit ({}) reached; over to you.", limit)).dim()
        );
        println!();
    }

    fn approved(&self, has_artifact: bool) {
        self.stop_spinner();
        println!("{}{}", CHECK, style("Approval received").green().bold());
        if !has_artifact {
            println!(
                "{}{}",
                WARN,
                style("No HTML code was found in the reviewer's approved messages.").yellow()
            );
        }
    }

    fn published(&self, result: &PublishResult) {
        print_publish_result(result);
    }
}

/// Print a publish outcome, including any push output.
pub fn print_publish_result(result: &PublishResult) {
    match result {
        PublishResult::Saved { .. } => {
            println!("{}{}", FILE_NEW, result.summary());
        }
        PublishResult::SavedAndPushed { output, .. } => {
            println!("{}{}", ROCKET, style(result.summary()).green());
            if !output.is_empty() {
                println!("{}", style(indent(output)).dim());
            }
        }
        PublishResult::NoArtifact => {
            println!("{}{}", WARN, style(result.summary()).yellow());
        }
        PublishResult::SaveFailed { .. } | PublishResult::PushFailed { .. } => {
            eprintln!("{}{}", CROSS, style(result.summary()).red());
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", BODY_INDENT, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(FALLBACK_WIDTH)
        .min(MAX_WIDTH)
}

/// Wrap prose to `width` and indent it. Lines inside code fences are kept
/// verbatim so generated code stays copyable.
pub fn render_body(body: &str, width: usize) -> String {
    let options = textwrap::Options::new(width.max(20))
        .initial_indent(BODY_INDENT)
        .subsequent_indent(BODY_INDENT);

    let mut in_fence = false;
    let mut out = Vec::new();
    for line in body.lines() {
        let fences = line.matches(FENCE).count();
        if in_fence || fences > 0 {
            out.push(format!("{}{}", BODY_INDENT, line));
        } else if line.trim().is_empty() {
            out.push(String::new());
        } else {
            out.push(textwrap::fill(line, &options));
        }
        if fences % 2 == 1 {
            in_fence = !in_fence;
        }
    }
    out.join("\n")
}
