//! Configuration view, validation and scaffolding: `crewloop config`.

use std::path::Path;

use anyhow::Result;

use crewloop::config::{CONFIG_FILE_NAME, Config, CrewToml};

use super::super::{Cli, ConfigCommands};
use super::cli_overrides;

pub fn cmd_config(project_dir: &Path, cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);

    match command {
        None | Some(ConfigCommands::Show) => {
            let config = Config::load(project_dir, cli_overrides(cli))?;

            println!();
            println!("crewloop configuration");
            println!("======================");
            println!();
            match &config.config_file {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No {} found; using defaults.", CONFIG_FILE_NAME),
            }
            println!();

            println!("[backend]");
            println!("  endpoint = {}", display_or_unset(config.endpoint.as_deref()));
            println!("  deployment = {}", display_or_unset(config.deployment.as_deref()));
            println!("  api_key = {}", display_or_unset(config.redacted_api_key().as_deref()));
            println!("  api_version = \"{}\"", config.api_version);
            if let Some(max_tokens) = config.max_tokens {
                println!("  max_tokens = {}", max_tokens);
            }
            println!();

            println!("[session]");
            println!("  selection = \"{}\"", config.selection);
            println!("  rotation_passes = {}", config.rotation_passes);
            println!("  max_turns_per_round = {}", config.max_turns_per_round);
            match config.generation_timeout {
                Some(timeout) => println!("  generation_timeout_secs = {}", timeout.as_secs()),
                None => println!("  generation_timeout_secs = (none)"),
            }
            println!();

            println!("[markers]");
            println!("  approval_token = \"{}\"", config.approval_token);
            println!("  readiness_marker = \"{}\"", config.readiness_marker);
            println!("  artifact_tag = \"{}\"", config.artifact_tag);
            println!();

            println!("[publish]");
            println!("  output_path = \"{}\"", config.output_path.display());
            println!(
                "  command = {}",
                display_or_unset(config.publish_command.as_deref())
            );
            println!();

            println!(
                "Roles: {} (reviewer: {})",
                config
                    .roster
                    .roles()
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                config.roster.reviewer().name
            );
            println!();

            if config.backend_settings().is_err() {
                println!("Backend settings are incomplete; `crewloop chat` will refuse to start.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let toml = CrewToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                use dialoguer::Confirm;

                let overwrite = Confirm::new()
                    .with_prompt(format!(
                        "{} already exists. Overwrite it with defaults?",
                        CONFIG_FILE_NAME
                    ))
                    .default(false)
                    .interact()
                    .unwrap_or(false);

                if !overwrite {
                    println!("Keeping existing {}", config_path.display());
                    return Ok(());
                }
            }

            std::fs::create_dir_all(project_dir)?;
            CrewToml::default().save(&config_path)?;
            println!("Created {}", config_path.display());
            println!();
            println!("Set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_KEY and");
            println!("AZURE_OPENAI_DEPLOYMENT_NAME (or put them in .env) before running `crewloop chat`.");
        }
    }

    Ok(())
}

fn display_or_unset(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("\"{}\"", v),
        None => "(not set)".to_string(),
    }
}
