//! Interactive confirmation for destructive commands

use anyhow::Result;
use std::io::{self, Write};

use crate::output::Output;

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    // Check if stdin is a TTY
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(is_yes(&input))
}

/// Ask before a destructive action
///
/// Skipped with `--yes` and for JSON/quiet output, where nobody is there to
/// answer. Prints "Cancelled." when the user declines.
pub fn confirm_destructive(description: &str, yes: bool, output: &Output) -> Result<bool> {
    if yes || !output.should_prompt() {
        return Ok(true);
    }

    println!("{}", description);
    if confirm("Are you sure?")? {
        Ok(true)
    } else {
        println!("Cancelled.");
        Ok(false)
    }
}

fn is_yes(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}
