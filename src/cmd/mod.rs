//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `chat`    | `Chat`           |
//! | `publish` | `Publish`        |
//! | `roles`   | `Roles`          |
//! | `config`  | `Config`         |

pub mod chat;
pub mod config;
pub mod publish;
pub mod roles;

pub use chat::{ChatOptions, cmd_chat};
pub use config::cmd_config;
pub use publish::cmd_publish;
pub use roles::cmd_roles;

use crewloop::config::ConfigOverrides;

use super::Cli;

/// Backend flags shared by every command.
pub(crate) fn cli_overrides(cli: &Cli) -> ConfigOverrides {
    ConfigOverrides {
        endpoint: cli.endpoint.clone(),
        api_key: cli.api_key.clone(),
        deployment: cli.deployment.clone(),
        ..Default::default()
    }
}
