//! Line input from the terminal.

use std::io::Write;

use async_trait::async_trait;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::session::InputSource;

pub const USER_PROMPT: &str = "USER: ";

/// Reads user lines from stdin, printing a prompt before each one.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        print!("{}", style(USER_PROMPT).bold().green());
        std::io::stdout().flush()?;
        self.lines.next_line().await
    }
}
