//! Manual publish retry: `crewloop publish`.

use std::path::Path;

use anyhow::Result;

use crewloop::config::Config;
use crewloop::publish::PublishResult;
use crewloop::telemetry::init_tracing;
use crewloop::ui::print_publish_result;

use super::super::Cli;
use super::cli_overrides;

pub async fn cmd_publish(project_dir: &Path, cli: &Cli, no_push: bool) -> Result<()> {
    let mut overrides = cli_overrides(cli);
    overrides.no_push = no_push;
    let config = Config::load(project_dir, overrides)?;
    let _guard = init_tracing(Some(&config.log_dir()), cli.log_json, cli.verbose);

    let publisher = config.publisher();
    let result = publisher.publish_existing().await;
    match &result {
        PublishResult::NoArtifact => {
            println!(
                "No artifact at {}. Run `crewloop chat` and approve a reviewed app first.",
                publisher.output_path().display()
            );
        }
        other => print_publish_result(other),
    }

    if matches!(result, PublishResult::PushFailed { .. }) {
        anyhow::bail!("Publish command failed");
    }
    Ok(())
}
