//! Roster listing: `crewloop roles`.

use std::path::Path;

use anyhow::Result;
use console::style;

use crewloop::config::{CONFIG_FILE_NAME, CrewToml};

pub fn cmd_roles(project_dir: &Path) -> Result<()> {
    let toml = CrewToml::load_or_default(project_dir)?;
    let roster = toml.roster()?;

    println!();
    if toml.roles.is_empty() {
        println!("Team (built-in roster):");
    } else {
        println!("Team (from {}):", CONFIG_FILE_NAME);
    }
    println!();

    for (i, role) in roster.roles().iter().enumerate() {
        let marker = if roster.is_reviewer(&role.name) {
            style(" [reviewer]").yellow().to_string()
        } else {
            String::new()
        };
        println!("  {}. {}{}", i + 1, style(&role.name).cyan().bold(), marker);
        let brief = textwrap::fill(
            &role.brief,
            textwrap::Options::new(76)
                .initial_indent("     ")
                .subsequent_indent("     "),
        );
        println!("{}", style(brief).dim());
        println!();
    }
    Ok(())
}
