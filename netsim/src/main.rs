use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use netsim::{sim_registry, LinkConfig, SimConfig};

#[derive(Parser)]
#[command(
    name = "netsim",
    version,
    about = "Deterministic loss/reorder simulation for the tickrep pipeline"
)]
struct Cli {
    /// Number of replicated entities.
    #[arg(long, default_value_t = 32)]
    entities: u32,
    /// Number of client sessions.
    #[arg(long, default_value_t = 2)]
    sessions: u32,
    /// Number of simulated ticks with the lossy link active.
    #[arg(long, default_value_t = 300)]
    ticks: u64,
    /// Lossless ticks appended so clients can converge.
    #[arg(long, default_value_t = 30)]
    settle_ticks: u64,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Packet loss percentage on the server-to-client link.
    #[arg(long, default_value_t = 10)]
    loss: u8,
    /// Packet duplication percentage.
    #[arg(long, default_value_t = 5)]
    duplicate: u8,
    /// Packet reorder percentage.
    #[arg(long, default_value_t = 5)]
    reorder: u8,
    /// Fail if the average encoded state exceeds this many bytes.
    #[arg(long)]
    max_avg_state_bytes: Option<u64>,
    /// Write the component registry as JSON to this path.
    #[arg(long)]
    registry_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.registry_json {
        let contents =
            serde_json::to_string_pretty(&sim_registry()).context("serialize registry")?;
        fs::write(path, contents)
            .with_context(|| format!("write registry json {}", path.display()))?;
    }

    let config = SimConfig {
        entities: cli.entities,
        sessions: cli.sessions,
        ticks: cli.ticks,
        settle_ticks: cli.settle_ticks,
        seed: cli.seed,
        link: LinkConfig {
            loss_percent: cli.loss,
            duplicate_percent: cli.duplicate,
            reorder_percent: cli.reorder,
        },
    };

    let summary = netsim::run(&config)?;

    if let Some(max_avg) = cli.max_avg_state_bytes {
        if summary.avg_state_bytes > max_avg {
            anyhow::bail!(
                "avg state bytes {} exceeds budget {max_avg}",
                summary.avg_state_bytes
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
