//! Show recorded deployment stats.

use anyhow::Result;
use clap::Args;

use slavko_deploy::StatStatus;

use crate::system::ShellSystem;

#[derive(Args)]
pub struct StatsArgs {
    /// Emit the raw JSON collection instead of the table
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: StatsArgs) -> Result<()> {
    let system = ShellSystem::build(None)?;
    let stats = system.stats.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No deployments recorded.");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:<7} {:>9}  {}",
        "TIME", "PROJECT", "STATUS", "DURATION", "TARGET"
    );
    for stat in stats {
        let time = stat.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let marker = match stat.status {
            StatStatus::Success => "✅",
            StatStatus::Failed => "❌",
        };
        let target = stat
            .url
            .as_deref()
            .or(stat.error.as_deref())
            .unwrap_or("-");
        println!(
            "{time:<20} {:<16} {marker:<7} {:>8.1}s  {target}",
            stat.project, stat.duration
        );
    }
    Ok(())
}
