// src/main.rs

//! The main entry point for the fleetscale autoscaler.

use anyhow::Result;
use std::env;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("fleetscale version {VERSION}");
        return Ok(());
    }

    // The only CLI surface besides --version: an optional logging filter.
    // RUST_LOG wins when both are set.
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| {
        args.iter()
            .position(|arg| arg == "--log-level")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_else(|| "info".to_string())
    });

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter))
        .compact()
        .with_ansi(true)
        .init();

    info!("Starting fleetscale {VERSION}, one pass");

    // One pass per invocation; the scheduler outside drives the cadence.
    // run_once never fails: a failed pass must not make the invoker re-fire.
    fleetscale::reconcile::run_once().await;

    Ok(())
}
