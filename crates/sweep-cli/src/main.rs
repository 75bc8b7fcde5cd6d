#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sweep: duplicate campaign and notification cleanup",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format (defaults to pretty on a TTY, text when piped).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags, `FORMAT` and the terminal.
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a sweep workspace",
        long_about = "Create .sweep/ with a default config and an empty record store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    sweep init\n\n    # Rewrite config, keeping existing records\n    sweep init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Maintenance")]
    Cleanup(cmd::cleanup::CleanupArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    sweep completions bash > /etc/bash_completion.d/sweep"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SWEEP_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "sweep=debug,info"
        } else {
            "sweep=info,warn"
        })
    });

    let format = env::var("SWEEP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for command output
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = std::env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, &project_root, cli.quiet),
        Commands::Cleanup(ref args) => cmd::cleanup::run_cleanup(args, output, &project_root),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
