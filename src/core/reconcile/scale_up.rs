// src/core/reconcile/scale_up.rs

//! Creates executor slots and launches the VMs that will claim them.
//!
//! Slot creation always precedes the launch for the same name: the agent
//! connects by name, and a VM without a slot can never become an executor.
//! A slot whose VM failed to launch is rolled back immediately instead of
//! waiting a round for the fault detector.

use crate::core::context::Context;
use crate::core::dispatch::run_limited;
use crate::core::errors::ScaleError;
use crate::core::model::LabelDemand;
use crate::core::provider::LaunchOutcome;
use crate::core::provider::user_data::{self, AgentBootstrap};
use crate::core::reconcile::scale_down::delete_verified;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

const NAME_SUFFIX_LEN: usize = 10;
const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone)]
struct LaunchPlan {
    name: String,
    label: String,
}

/// Runs the scale-up phase over the capped demand.
pub async fn execute(ctx: &Context, demand: LabelDemand) {
    if demand.is_empty() {
        info!("No scale up required");
        return;
    }
    let settings = &ctx.settings;

    let mut plans = Vec::new();
    for (label, count) in &demand {
        info!("Creating {} nodes of type {}", count, label);
        for _ in 0..*count {
            let name = slot_name(label);
            debug!("Creating slot {} of type {}", name, label);
            plans.push(LaunchPlan {
                name,
                label: label.clone(),
            });
        }
    }

    // The master's create endpoint races against itself, hence the smaller
    // pool than every other master call.
    let created: Vec<LaunchPlan> = run_limited(
        settings.parallelism.master_create,
        plans,
        |plan| {
            let master = ctx.master.clone();
            async move {
                let Some(slot) = settings.slots.get(&plan.label) else {
                    error!("No slot configuration for {} found", plan.label);
                    return None;
                };
                let Some(num_executors) = settings.executors_per_label.get(&plan.label) else {
                    error!("No executor count for {} found", plan.label);
                    return None;
                };
                let result = master
                    .create_slot(
                        &plan.name,
                        &plan.label,
                        slot,
                        *num_executors,
                        &settings.tunnel_address,
                    )
                    .await;
                match result {
                    Ok(()) => Some(plan),
                    Err(ScaleError::SlotExists(name)) => {
                        // A ten-character random suffix collided, or a
                        // previous pass died between create and launch.
                        // Either way this name is not ours to use.
                        error!("Slot {name} already exists, not launching a VM for it");
                        None
                    }
                    Err(err) => {
                        error!("Could not create slot {}: {err}", plan.name);
                        None
                    }
                }
            }
        },
    )
    .await
    .into_iter()
    .flatten()
    .collect();

    let launches = run_limited(settings.parallelism.provider, created, |plan| {
        let fleet = ctx.fleet.clone();
        let credentials = &ctx.credentials;
        async move {
            // Validated at startup for every managed label.
            let (Some(family), Some(template)) = (
                settings.user_data_families.get(&plan.label),
                settings.launch_templates.get(&plan.label),
            ) else {
                error!("No launch template for {} defined", plan.label);
                return (plan, None);
            };
            let bootstrap = AgentBootstrap {
                master_url: credentials.master_url.as_str(),
                master_private_url: &credentials.master_private_url,
                executor_name: &plan.name,
                retry_reset_secs: settings.agent_retry_reset.as_secs(),
            };
            let payload = user_data::render(*family, &bootstrap);
            debug!("Launching VM {} of type {}", plan.name, plan.label);
            let outcome = fleet
                .launch(&plan.name, &plan.label, template, &payload)
                .await;
            (plan, Some(outcome))
        }
    })
    .await;

    let mut stale = Vec::new();
    for (plan, outcome) in launches {
        match outcome {
            Some(Ok(LaunchOutcome::Launched { .. })) => {}
            Some(Ok(LaunchOutcome::InsufficientCapacity)) => {
                info!("Insufficient capacity, can't launch {}", plan.name);
                stale.push(plan.name);
            }
            Some(Err(err)) => {
                error!("Could not launch {}: {err}", plan.name);
                stale.push(plan.name);
            }
            None => stale.push(plan.name),
        }
    }

    if !stale.is_empty() {
        warn!("The following VMs have not been started: {}", stale.join(", "));
        run_limited(settings.parallelism.master, stale, |name| {
            let master = ctx.master.clone();
            async move { delete_verified(&master, &name).await }
        })
        .await;
    }
}

/// Generates a fresh slot name: the label plus a random lowercase
/// alphanumeric suffix.
pub fn slot_name(label: &str) -> String {
    let mut rng = SmallRng::from_entropy();
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect();
    format!("{label}_{suffix}")
}
