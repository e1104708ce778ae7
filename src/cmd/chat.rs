//! Interactive session command: `crewloop chat`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tracing::{Instrument, info, info_span};

use crewloop::backend::AzureOpenAiBackend;
use crewloop::config::Config;
use crewloop::selection::SelectionKind;
use crewloop::session::{Session, SessionResult};
use crewloop::telemetry::init_tracing;
use crewloop::ui::{ChatUI, StdinInput};

use super::super::Cli;
use super::cli_overrides;

/// Flags specific to `chat`.
pub struct ChatOptions {
    pub prompt: Option<String>,
    pub no_push: bool,
    pub selection: Option<SelectionKind>,
    pub max_turns: Option<usize>,
    pub timeout_secs: Option<u64>,
}

pub async fn cmd_chat(project_dir: &Path, cli: &Cli, options: ChatOptions) -> Result<()> {
    let mut overrides = cli_overrides(cli);
    overrides.selection = options.selection;
    overrides.max_turns_per_round = options.max_turns;
    overrides.generation_timeout_secs = options.timeout_secs;
    overrides.no_push = options.no_push;

    let config = Config::load(project_dir, overrides)?;
    // Fail before any session state exists.
    let settings = config.backend_settings()?;

    let _guard = init_tracing(Some(&config.log_dir()), cli.log_json, cli.verbose);

    let backend = AzureOpenAiBackend::new(settings);
    let ui = ChatUI::new();
    ui.welcome(
        &config.roster,
        &config.selection.to_string(),
        &config.approval_token,
    );

    let mut session = Session::new(config.roster.clone(), Arc::new(backend), config.publisher())
        .with_evaluator(config.evaluator())
        .with_selection(config.selection.build(config.rotation_passes))
        .with_max_turns_per_round(config.max_turns_per_round)
        .with_generation_timeout(config.generation_timeout)
        .with_events(Box::new(ui));

    let span = info_span!("session", id = %session.id());
    info!(
        parent: &span,
        roles = config.roster.len(),
        selection = %config.selection,
        config_file = ?config.config_file,
        "Session started"
    );

    let mut input = StdinInput::new();
    let result = session
        .run_session(options.prompt.as_deref(), &mut input)
        .instrument(span)
        .await
        .context("Failed to read user input")?;

    match result {
        SessionResult::Approved(publish) => {
            if !publish.is_success() && publish.is_saved() {
                println!(
                    "{}",
                    style("Fix the problem and run `crewloop publish` to retry the push.").dim()
                );
            }
        }
        SessionResult::Exited => {
            println!("Goodbye.");
        }
        SessionResult::InputClosed => {
            println!();
            println!("Input closed before approval; nothing was published.");
        }
    }

    Ok(())
}
