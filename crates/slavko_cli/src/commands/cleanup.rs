//! Clear deployment history and stats.

use anyhow::Result;
use clap::Args;

use slavko_protocol::{Module, SlavkoMessage, Status};

use crate::system::ShellSystem;

#[derive(Args)]
pub struct CleanupArgs {}

pub async fn execute(_args: CleanupArgs) -> Result<()> {
    let system = ShellSystem::build(None)?;

    // Clearing happens through the protocol, same as when the model
    // emits the directive.
    system
        .bus
        .emit(SlavkoMessage::new(Module::Cleanup, Status::Done));

    Ok(())
}
