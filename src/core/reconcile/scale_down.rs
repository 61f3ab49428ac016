// src/core/reconcile/scale_down.rs

//! Decommissions retired executors: mark offline, verify nothing got
//! scheduled in the meantime, terminate the VMs, then drop the slots.
//!
//! Marking an executor offline does not interrupt a build that sneaks in
//! between the retirement decision and the mark; such executors are flipped
//! back online and spared. Only executors that are verifiably offline and
//! idle lose their VM.

use crate::core::context::Context;
use crate::core::dispatch::run_limited;
use crate::core::errors::ScaleError;
use crate::core::master::MasterClient;
use crate::core::model::{DOWNSCALE_REASON, Executor, RetirementSet};
use tracing::{debug, error, info};

/// Runs the scale-down phase over the merged retirement set.
pub async fn execute(ctx: &Context, retire: RetirementSet) {
    let names: Vec<String> = retire.into_values().flatten().collect();
    if names.is_empty() {
        info!("No scale down required");
        return;
    }
    let parallelism = ctx.settings.parallelism.master;

    // Fresh state per retiree; the inventory fetch is minutes old by now.
    let polled = poll_all(&ctx.master, parallelism, names).await;
    let (online, already_offline) = partition_by_offline(polled);

    if online.is_empty() {
        info!("No executors to be marked offline");
    } else {
        info!("Marking {:?} as offline", online);
        run_limited(parallelism, online.clone(), |name| {
            let master = ctx.master.clone();
            async move {
                if let Err(err) = master.set_offline(&name, DOWNSCALE_REASON).await {
                    error!("Could not mark {name} offline: {err}");
                }
            }
        })
        .await;
    }

    // An executor that picked up a build between the retirement decision and
    // the offline mark must keep running; re-enable it and drop it here.
    let repolled = poll_all(&ctx.master, parallelism, online).await;
    let (mut confirmed, raced) = confirm_retirees(repolled);

    if !raced.is_empty() {
        info!(
            "{} got a job scheduled while being marked offline - possible race condition, \
             re-enabling",
            raced.join(", ")
        );
        run_limited(parallelism, raced, |name| {
            let master = ctx.master.clone();
            async move {
                if let Err(err) = master.set_online(&name).await {
                    error!("Could not re-enable {name}: {err}");
                }
            }
        })
        .await;
    }

    confirmed.extend(already_offline);
    debug!("Shutting down {} VMs: {:?}", confirmed.len(), confirmed);

    if let Err(err) = ctx.fleet.terminate_by_names(&confirmed).await {
        // Slots must outlive their VMs: a deleted slot with a live VM is an
        // orphan that costs money until the fault detector catches it.
        error!("Could not terminate VMs, keeping their slots: {err}");
        return;
    }

    debug!("Deleting {} slots: {:?}", confirmed.len(), confirmed);
    run_limited(parallelism, confirmed, |name| {
        let master = ctx.master.clone();
        async move { delete_verified(&master, &name).await }
    })
    .await;
}

/// Splits polled retirees into still-online executors (which need the
/// offline mark) and ones that are already offline. Poll failures drop the
/// executor from this round.
pub fn partition_by_offline(
    polled: Vec<(String, Result<Executor, ScaleError>)>,
) -> (Vec<String>, Vec<String>) {
    let mut online = Vec::new();
    let mut offline = Vec::new();
    for (name, result) in polled {
        match result {
            Ok(executor) if !executor.offline => online.push(name),
            Ok(_) => offline.push(name),
            Err(err) => error!("Could not poll {name}, leaving it for the next pass: {err}"),
        }
    }
    (online, offline)
}

/// Splits re-polled, freshly marked retirees into confirmed ones (idle and
/// offline, safe to terminate) and race losers that picked up a build or
/// flipped back online. Poll failures spare the executor.
pub fn confirm_retirees(
    repolled: Vec<(String, Result<Executor, ScaleError>)>,
) -> (Vec<String>, Vec<String>) {
    let mut confirmed = Vec::new();
    let mut raced = Vec::new();
    for (name, result) in repolled {
        match result {
            Ok(executor) if executor.idle && executor.offline => confirmed.push(name),
            Ok(_) => raced.push(name),
            Err(err) => error!("Could not verify {name} before termination, sparing it: {err}"),
        }
    }
    (confirmed, raced)
}

/// Deletes a slot only after confirming the executor is not connected.
pub(crate) async fn delete_verified(master: &MasterClient, name: &str) {
    match master.poll(name).await {
        Ok(executor) if !executor.offline => {
            error!("Unable to delete still connected executor {name}");
        }
        Ok(_) => {
            if let Err(err) = master.delete_slot(name).await {
                error!("Could not delete slot {name}: {err}");
            }
        }
        Err(ScaleError::ExecutorNotFound(_)) => {
            debug!("Slot {name} is already gone");
        }
        Err(err) => {
            error!("Could not poll {name} before deletion, leaving it: {err}");
        }
    }
}

async fn poll_all(
    master: &MasterClient,
    parallelism: usize,
    names: Vec<String>,
) -> Vec<(String, Result<Executor, ScaleError>)> {
    run_limited(parallelism, names, |name| {
        let master = master.clone();
        async move {
            let polled = master.poll(&name).await;
            (name, polled)
        }
    })
    .await
}
