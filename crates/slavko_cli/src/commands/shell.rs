//! Interactive session.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use slavko_chat::ChatError;
use slavko_protocol::StreamOutcome;

use crate::system::{ShellSystem, BOOT_PROMPT};

#[derive(Args)]
pub struct ShellArgs {
    /// Target repository, e.g. my-org/my-repo
    #[arg(short, long)]
    repo: Option<String>,

    /// Skip the scripted boot exchange
    #[arg(long)]
    no_boot: bool,
}

pub async fn execute(args: ShellArgs) -> Result<()> {
    let mut system = ShellSystem::build(args.repo)?;
    system.print_protocol_traffic();
    let shell = system.chat_shell()?;

    if !args.no_boot {
        match shell.boot(BOOT_PROMPT).await {
            Ok(_) => println!(),
            Err(err) => report_stream_error(&err)?,
        }
    }

    println!("Type a message, /clear to reset the session, /quit to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                shell.cancel_active();
                println!();
                continue;
            }
        };

        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/clear" => {
                shell.clear_history();
                if let Err(err) = shell.boot(BOOT_PROMPT).await {
                    report_stream_error(&err)?;
                }
                println!();
                continue;
            }
            "/stats" => {
                for stat in system.stats.snapshot() {
                    println!(
                        "{} {} {} ({:.1}s)",
                        stat.timestamp.format("%H:%M:%S"),
                        stat.project,
                        stat.provider,
                        stat.duration
                    );
                }
                continue;
            }
            _ => {}
        }

        // The stream races against Ctrl-C so an in-flight reply can be
        // aborted without leaving the prompt.
        let outcome = {
            let send = shell.send(input);
            tokio::pin!(send);
            tokio::select! {
                outcome = &mut send => outcome,
                _ = tokio::signal::ctrl_c() => {
                    shell.cancel_active();
                    // The same stream observes the cancellation at its
                    // next check point.
                    send.await
                }
            }
        };

        match outcome {
            Ok(StreamOutcome::Completed) => println!(),
            Ok(StreamOutcome::Cancelled) => println!("\n(cancelled)"),
            Err(err) => report_stream_error(&err)?,
        }
    }

    // Give in-flight deploys a moment to report before the process ends.
    system.settle(std::time::Duration::from_secs(10)).await;
    Ok(())
}

// Credential failures bubble up (exit code 3); everything else was
// already surfaced by the shell's single error marker.
fn report_stream_error(err: &ChatError) -> Result<()> {
    match err {
        ChatError::Credential(detail) => {
            anyhow::bail!("credential failure: {detail}")
        }
        ChatError::NotConfigured => {
            anyhow::bail!("{err}")
        }
        _ => Ok(()),
    }
}
