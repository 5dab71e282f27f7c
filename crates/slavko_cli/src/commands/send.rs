//! One-shot prompt.

use anyhow::Result;
use clap::Args;
use std::time::Duration;

use slavko_chat::ChatError;

use crate::system::ShellSystem;

#[derive(Args)]
pub struct SendArgs {
    /// The prompt to send
    message: String,

    /// Target repository, e.g. my-org/my-repo
    #[arg(short, long)]
    repo: Option<String>,

    /// Seconds to wait for triggered deployments to finish reporting
    #[arg(long, default_value_t = 30)]
    wait: u64,
}

pub async fn execute(args: SendArgs) -> Result<()> {
    let mut system = ShellSystem::build(args.repo)?;
    system.print_protocol_traffic();
    let shell = system.chat_shell()?;

    match shell.send(&args.message).await {
        Ok(_) => println!(),
        Err(ChatError::Credential(detail)) => anyhow::bail!("credential failure: {detail}"),
        // The shell already surfaced the single error marker.
        Err(_) => {}
    }

    system.settle(Duration::from_secs(args.wait)).await;
    Ok(())
}
