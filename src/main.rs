use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use devdao::common::logging::init_logging;
use devdao::common::utils::format_timestamp;
use devdao::common::{Clock, SystemClock};
use devdao::governance::storage::load_snapshot;
use devdao::governance::{FileStore, GovernanceConfig, ProposalKind, ProposalStatus};
use devdao::version::VERSION;

/// Print the persisted state of the governance instance at the configured
/// data directory. `--json` dumps the raw snapshot instead.
#[tokio::main]
async fn main() -> Result<()> {
    let json = std::env::args().skip(1).any(|arg| arg == "--json");

    let config = GovernanceConfig::from_env().context("Failed to load configuration")?;
    init_logging(config.log_dir.as_deref().map(Path::new), &config.log_level)
        .context("Failed to initialize logging")?;

    info!("DevDAO {} reading state from {}", VERSION, config.data_dir);

    let store = FileStore::new(&config.data_dir)
        .await
        .with_context(|| format!("Failed to open data directory {}", config.data_dir))?;
    let Some(snapshot) = load_snapshot(&store)
        .await
        .context("Failed to load governance state")?
    else {
        println!("No governance state in {}", config.data_dir);
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let now = SystemClock.now();
    println!("Treasury balance: {}", snapshot.treasury.balance());
    for asset in snapshot.treasury.holdings() {
        println!("Holding: {}", asset);
    }
    for holder in &snapshot.pending_exits {
        println!("Unfinished exit: {}", holder);
    }

    println!("Proposals: {}", snapshot.proposals.len());
    for proposal in &snapshot.proposals {
        let status = match proposal.status(now) {
            ProposalStatus::Active => "active".to_string(),
            ProposalStatus::AwaitingExecution => "awaiting execution".to_string(),
            ProposalStatus::Executed(outcome) => format!("executed ({:?})", outcome),
        };
        let verb = match proposal.kind {
            ProposalKind::Buy => "buy",
            ProposalKind::Sell => "sell",
        };
        println!(
            "  {} {} {} by {}: {} yay / {} nay, deadline {}, {}",
            proposal.id,
            verb,
            proposal.asset_id,
            proposal.proposer,
            proposal.yay_votes,
            proposal.nay_votes,
            format_timestamp(proposal.deadline),
            status
        );
    }

    Ok(())
}
