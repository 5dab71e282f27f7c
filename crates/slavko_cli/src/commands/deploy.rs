//! Emit a DEPLOY directive directly, without going through the model.

use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::time::Duration;

use slavko_deploy::AttemptState;
use slavko_protocol::{Module, SlavkoMessage, Status};

use crate::system::ShellSystem;

#[derive(Args)]
pub struct DeployArgs {
    /// Target repository, e.g. my-org/my-repo
    #[arg(short, long)]
    repo: Option<String>,

    /// Provider to deploy with ("auto" picks the default)
    #[arg(short, long, default_value = "auto")]
    provider: String,

    /// Seconds to wait for the deployment to finish reporting
    #[arg(long, default_value_t = 60)]
    wait: u64,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    let mut system = ShellSystem::build(args.repo)?;
    system.print_protocol_traffic();

    system.bus.emit(
        SlavkoMessage::new(Module::Deploy, Status::Init)
            .with_payload(json!({ "provider": args.provider })),
    );

    system.settle(Duration::from_secs(args.wait)).await;

    if system
        .orchestrator
        .attempts()
        .iter()
        .any(|a| a.state == AttemptState::Failed)
    {
        anyhow::bail!("deploy failed; see the report above");
    }
    Ok(())
}
