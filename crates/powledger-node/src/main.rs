use clap::Parser;
use powledger_core::{
    constants::DEFAULT_DIFFICULTY, Ledger, LedgerConfig, MiningStrategy, PoolPolicy, SharedLedger,
};
use powledger_node::{
    constants::{DEFAULT_LISTEN, DEFAULT_MAX_PENDING},
    router, AppState,
};
use std::{net::SocketAddr, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:6000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Leading zero hex digits required of every mined block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: usize,

    /// Which pending transactions go into a block: whole-pool or first-only
    #[arg(long, default_value = "whole-pool")]
    pool_policy: PoolPolicy,

    /// Search nonces across all cores
    #[arg(long)]
    parallel: bool,

    /// Give up on a mining run after this many seconds
    #[arg(long)]
    mine_timeout_secs: Option<u64>,

    /// Refuse submissions once this many transactions are pending
    #[arg(long, default_value_t = DEFAULT_MAX_PENDING)]
    max_pending: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let strategy = if args.parallel {
        MiningStrategy::Parallel
    } else {
        MiningStrategy::Sequential
    };
    let config = LedgerConfig::default()
        .with_difficulty(args.difficulty)
        .with_pool_policy(args.pool_policy)
        .with_strategy(strategy);
    let ledger = SharedLedger::new(Ledger::new(config)?);

    let state = AppState::new(ledger)
        .with_mine_timeout(args.mine_timeout_secs.map(Duration::from_secs))
        .with_max_pending(args.max_pending);
    let app = router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!(
        difficulty = args.difficulty,
        pool_policy = ?args.pool_policy,
        ?strategy,
        "powledger-node listening on http://{addr}"
    );
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
