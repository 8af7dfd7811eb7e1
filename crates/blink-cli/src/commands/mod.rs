//! Command handlers

pub mod config;
pub mod items;
pub mod status;
pub mod sync;

use std::io::{self, IsTerminal, Write};

use anyhow::Result;

/// Ask a yes/no question on the terminal; false when stdin is not a TTY
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
