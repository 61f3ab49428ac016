// src/core/reconcile/mod.rs

//! The top-level reconciliation pass.
//!
//! One invocation performs exactly one pass: fetch inventory from the master
//! and the VM provider, run the analyzers, cap the result, then mutate —
//! scale-down first, orphan termination second, scale-up last. The phases
//! are totally ordered; nothing overlaps them. Anything a pass cannot
//! verify it leaves alone: the next pass sees the persisted state and
//! finishes the job.

pub mod scale_down;
pub mod scale_up;

use crate::config::Settings;
use crate::core::context::Context;
use crate::core::errors::ScaleError;
use crate::core::model::merge_retirements;
use crate::core::provider::client::uptimes;
use crate::core::scaling::{caps, demand, faults, pending, supply};
use chrono::Utc;
use tracing::{error, info, warn};

/// Entry point for the periodic invoker.
///
/// Never returns an error: an uncaught failure is logged as fatal and
/// swallowed, because a non-success exit would make the invoker re-fire the
/// pass and double-apply mutations.
pub async fn run_once() {
    if let Err(err) = execute_pass().await {
        error!("Fatal: pass aborted: {err}");
    }
}

async fn execute_pass() -> Result<(), ScaleError> {
    let settings = Settings::from_env()?;
    let ctx = Context::initialize(settings).await?;
    run_pass(&ctx).await
}

/// One full reconciliation over an initialized context.
pub async fn run_pass(ctx: &Context) -> Result<(), ScaleError> {
    let settings = &ctx.settings;

    let executors = ctx.master.list_executors().await?;
    info!("Found {} executors registered with the master.", executors.len());

    let vms = ctx.fleet.list_managed().await?;
    info!("Found {} managed VMs.", vms.len());

    let now = Utc::now();
    let vm_uptimes = uptimes(&vms, &settings.ignored_executor_names, now);
    if vm_uptimes.len() != executors.len() {
        warn!(
            "Executors and VMs don't have the same count ({} vs {}).",
            executors.len(),
            vm_uptimes.len()
        );
    }

    let buckets = pending::classify(&executors, &vms, settings);
    let queue = ctx.master.list_queue().await?;

    let demand = demand::required_nodes(&queue, &executors, &buckets.pending_counts(), settings, now);
    let retire = supply::idle_retirements(&executors, &vm_uptimes, settings);
    let report = faults::detect(&executors, &buckets.pending, &vm_uptimes, settings);

    if !report.faulty.is_empty() {
        let names: Vec<&str> = report
            .faulty
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        warn!("Found {} faulty executors: {:?}", names.len(), names);
    }

    let mut orphans = buckets.orphans.clone();
    orphans.extend(report.orphans.iter().cloned());
    if !orphans.is_empty() {
        error!("Found {} orphaned VMs: {:?}", orphans.len(), orphans);
    }

    let demand = caps::apply_upscale_limit(demand, settings.upscales_per_round);
    let retire = caps::apply_downscale_limit(retire, settings.downscales_per_round);
    // Faulty executors are retired on top of the cap: leaving them around
    // costs money every round they survive.
    let retire = merge_retirements(retire, report.faulty);

    scale_down::execute(ctx, retire).await;

    if let Err(err) = ctx.fleet.terminate_by_names(&orphans).await {
        error!("Could not terminate orphaned VMs: {err}");
    }

    scale_up::execute(ctx, demand).await;

    Ok(())
}
