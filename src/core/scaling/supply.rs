// src/core/scaling/supply.rs

//! Selects idle executors to retire, honoring warm-pool floors and the
//! hourly-billing gate for Windows machines.

use crate::config::Settings;
use crate::core::model::{Executor, RetirementSet};
use crate::core::scaling::labels;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Determines which executors should be retired because they are idle.
///
/// `uptimes` maps executor display names to the backing VM's uptime in
/// seconds; it is the authority for the hourly-billing gate.
pub fn idle_retirements(
    executors: &[Executor],
    uptimes: &HashMap<String, u64>,
    settings: &Settings,
) -> RetirementSet {
    let mut to_retire: HashMap<String, Vec<String>> = HashMap::new();
    // Everything retirement-eligible, including executors the hourly gate is
    // holding back this pass. The warm-pool floor counts against this pool.
    let mut considered: HashMap<String, usize> = HashMap::new();

    for executor in executors {
        if !executor.is_idle_online() {
            continue;
        }
        let name = &executor.display_name;
        if settings.is_ignored_executor(name) {
            continue;
        }

        let Some(label) = labels::resolve_label(executor, settings) else {
            error!("Could not extract the managed label for executor {}", name);
            continue;
        };
        if !settings.is_managed(&label) {
            debug!("Label {} is not managed, skipping...", label);
            continue;
        }

        // No architecture string means the agent never reported in; the state
        // is in flux and resolves itself by the next pass.
        if executor.architecture.is_none() {
            info!(
                "Architecture has not been propagated for {}, ignoring until next pass",
                name
            );
            continue;
        }

        if settings.is_hourly_billed(&label) {
            let Some(uptime) = uptimes.get(name) else {
                error!("Unable to find uptime for {}", name);
                continue;
            };
            let partial = uptime % 3600;
            let floor = settings.windows_min_partial_uptime.as_secs();
            if partial < floor {
                // Still counts toward the idle pool; it just cannot be
                // terminated mid-hour without wasting paid time.
                *considered.entry(label).or_insert(0) += 1;
                debug!(
                    "Ignoring {} because partial runtime {}s is below the limit of {}s \
                     (hourly billing). Total runtime: {}s",
                    name, partial, floor, uptime
                );
                continue;
            }
        }

        to_retire.entry(label.clone()).or_default().push(name.clone());
        *considered.entry(label).or_insert(0) += 1;
    }

    enforce_warm_pool(&mut to_retire, &considered, settings);

    to_retire.retain(|_, names| !names.is_empty());
    to_retire
}

/// Keeps at least the configured number of idle executors per label alive.
///
/// Example: 5 executors running, 3 idle, floor 2. Only 1 is retired, leaving
/// 4 running of which 2 idle.
fn enforce_warm_pool(
    to_retire: &mut HashMap<String, Vec<String>>,
    considered: &HashMap<String, usize>,
    settings: &Settings,
) {
    let mut rng = SmallRng::from_entropy();
    for (label, floor) in &settings.warm_pool {
        let Some(selected) = to_retire.get_mut(label) else {
            continue;
        };
        let idle_pool = considered.get(label).copied().unwrap_or(0);
        let surviving_idle = idle_pool - selected.len();
        let deficit = floor.saturating_sub(surviving_idle);
        // Spare random entries rather than a prefix, otherwise the same
        // executor would never be shut down.
        for _ in 0..deficit.min(selected.len()) {
            selected.swap_remove(rng.gen_range(0..selected.len()));
        }
    }
}
