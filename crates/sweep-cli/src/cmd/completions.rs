use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};
use std::io::Write;

/// Binary name completions are registered under.
const BIN_NAME: &str = "sweep";

/// Arguments for `sweep completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate the completion script for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Print the completion script for `shell` to stdout.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_completions(shell, command, &mut out);
    out.flush()?;
    Ok(())
}

fn write_completions(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) {
    generate(shell, command, BIN_NAME, out);
}
