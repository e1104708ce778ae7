use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crewloop::selection::SelectionKind;

mod cmd;

#[derive(Parser)]
#[command(name = "crewloop")]
#[command(
    version,
    about = "A business analyst, engineer and product owner build an HTML app until you approve it"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Write log files as newline-delimited JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Azure OpenAI endpoint, e.g. https://my-resource.openai.azure.com/
    #[arg(long, global = true, env = "AZURE_OPENAI_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Azure OpenAI API key
    #[arg(long, global = true, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat-completions deployment name
    #[arg(long, global = true, env = "AZURE_OPENAI_DEPLOYMENT_NAME")]
    pub deployment: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session with the team
    Chat {
        /// First message; skips the initial prompt
        #[arg(short, long)]
        prompt: Option<String>,

        /// Save the approved artifact without running the publish command
        #[arg(long)]
        no_push: bool,

        /// How the next speaker is chosen (rotation or dynamic)
        #[arg(long)]
        selection: Option<SelectionKind>,

        /// Maximum generated turns per user message
        #[arg(long)]
        max_turns: Option<usize>,

        /// Per-turn generation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Re-run the publish command for the artifact already on disk
    Publish {
        /// Only check that the artifact exists
        #[arg(long)]
        no_push: bool,
    },
    /// Show the team and which role reviews
    Roles,
    /// View, validate or create crewloop.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    Show,
    Validate,
    Init {
        /// Overwrite an existing file without asking
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    // A project-local .env never overrides what is already set.
    dotenvy::from_path(project_dir.join(".env")).ok();

    match &cli.command {
        Commands::Chat {
            prompt,
            no_push,
            selection,
            max_turns,
            timeout,
        } => {
            let options = cmd::ChatOptions {
                prompt: prompt.clone(),
                no_push: *no_push,
                selection: *selection,
                max_turns: *max_turns,
                timeout_secs: *timeout,
            };
            cmd::cmd_chat(&project_dir, &cli, options).await?;
        }
        Commands::Publish { no_push } => cmd::cmd_publish(&project_dir, &cli, *no_push).await?,
        Commands::Roles => cmd::cmd_roles(&project_dir)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, &cli, command.clone())?,
    }

    Ok(())
}
