use std::time::Duration;

use clap::Parser;
use lycan::prelude::*;
use tracing_subscriber::EnvFilter;

/// Werewolf session server.
#[derive(Debug, Parser)]
#[command(name = "lycan-server", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "LYCAN_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Night phase length in seconds.
    #[arg(long, env = "LYCAN_NIGHT_SECS", default_value_t = 90)]
    night_secs: u64,

    /// Day phase length in seconds.
    #[arg(long, env = "LYCAN_DAY_SECS", default_value_t = 120)]
    day_secs: u64,

    /// Voting phase length in seconds.
    #[arg(long, env = "LYCAN_VOTING_SECS", default_value_t = 60)]
    voting_secs: u64,

    /// Fixed seed for role shuffles. Random when absent.
    #[arg(long, env = "LYCAN_ROLE_SEED")]
    role_seed: Option<u64>,

    /// Rooms untouched for this many seconds are finished by the reaper.
    #[arg(long, env = "LYCAN_IDLE_TIMEOUT_SECS", default_value_t = 1800)]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), LycanError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lycan=info")),
        )
        .init();

    let args = Args::parse();
    let config = EngineConfig {
        durations: PhaseDurations {
            night: Duration::from_secs(args.night_secs),
            day: Duration::from_secs(args.day_secs),
            voting: Duration::from_secs(args.voting_secs),
        },
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        role_seed: args.role_seed,
        ..EngineConfig::default()
    };

    let server = LycanServerBuilder::new()
        .bind(&args.bind)
        .engine_config(config)
        .build_in_memory()
        .await?;
    server.run().await
}
