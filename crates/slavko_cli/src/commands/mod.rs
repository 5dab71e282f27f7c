//! CLI command definitions.
//!
//! Each subcommand maps to one operator workflow against the shell.

use clap::{Parser, Subcommand};

pub mod cleanup;
pub mod deploy;
pub mod send;
pub mod shell;
pub mod stats;

/// SlavkoShell - protocol-driven deployment shell
#[derive(Parser)]
#[command(name = "slavko")]
#[command(version, about = "SlavkoShell - protocol-driven deployment shell")]
#[command(long_about = r#"
SlavkoShell is a chat-style deployment terminal. The model's replies embed
line-delimited protocol directives ({MODULE|ACTION|STATUS|PAYLOAD}) that
drive deployments, health checks and session maintenance.

WORKFLOWS:
  shell    → Interactive session (streams replies, Ctrl-C cancels)
  send     → One-shot prompt
  deploy   → Emit a DEPLOY directive directly, without the model
  stats    → Show the recorded deployment stats
  cleanup  → Clear deployment history and stats

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Credential failure (select a valid API key)
  4 - Deployment error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session
    Shell(shell::ShellArgs),

    /// Send a single prompt and stream the reply
    Send(send::SendArgs),

    /// Emit a DEPLOY directive directly
    Deploy(deploy::DeployArgs),

    /// Show recorded deployment stats
    Stats(stats::StatsArgs),

    /// Clear deployment history and stats
    Cleanup(cleanup::CleanupArgs),
}
