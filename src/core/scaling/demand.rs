// src/core/scaling/demand.rs

//! Turns queue starvation into a per-label count of nodes to launch.

use crate::config::Settings;
use crate::core::model::{Executor, LabelDemand, QueueItem};
use crate::core::scaling::labels;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Computes how many new nodes each label needs.
///
/// `pending` is the per-label count of VMs that are already launched but not
/// yet connected; their capacity is on the way and subtracted from the
/// result. Entries are strictly positive.
pub fn required_nodes(
    queue: &[QueueItem],
    executors: &[Executor],
    pending: &HashMap<String, usize>,
    settings: &Settings,
    now: DateTime<Utc>,
) -> LabelDemand {
    let mut required_executors: HashMap<String, u32> = HashMap::new();
    let idle_per_label = labels::idle_executors_per_label(executors, settings);

    for item in queue {
        let Some(label) = labels::starvation_label(item, executors, settings) else {
            debug!(
                "Queue item {} is not related to resource starvation: {}",
                item.id, item.why
            );
            continue;
        };

        let Some(min_age) = settings.min_queue_age.get(&label) else {
            error!(
                "Label {} from queue reason '{}' has no minimum queue time configured, skipping",
                label, item.why
            );
            continue;
        };

        // Young items are invisible: short spikes resolve themselves and
        // scaling on them overshoots.
        let age = item.age_secs(now);
        if age < *min_age {
            debug!(
                "Queue duration of item {} is not mature enough: {}<{}",
                item.id, age, min_age
            );
            continue;
        }

        // Idle capacity of the requested label means the item is not starved;
        // it is most likely a job without permission for a restricted slot.
        if let Some(idle) = idle_per_label.get(&label)
            && *idle > 0
        {
            error!(
                "Queue item {} is scheduled for label {}, but there are {} idle executors \
                 available. This is most likely an unrestricted job aimed at a restricted \
                 executor. Please investigate the job queue.",
                item.id, label, idle
            );
            continue;
        }

        *required_executors.entry(label).or_insert(0) += 1;
    }

    let mut required = executors_to_nodes(&required_executors, settings);
    subtract_pending(&mut required, pending);
    required
}

/// Converts executor demand to node demand via each label's slot count.
fn executors_to_nodes(required_executors: &HashMap<String, u32>, settings: &Settings) -> LabelDemand {
    let mut nodes = LabelDemand::new();
    for (label, executors_needed) in required_executors {
        // Retired job definitions still reference old labels now and then;
        // those are tolerated silently.
        if settings.is_ignored(label) {
            debug!("Skipping ignored label {}", label);
            continue;
        }

        match settings.executors_per_label.get(label) {
            Some(per_node) if *per_node > 0 => {
                let needed = executors_needed.div_ceil(*per_node);
                info!(
                    "Need {} nodes for {} executors of type {}",
                    needed, executors_needed, label
                );
                if needed > 0 {
                    nodes.insert(label.clone(), needed);
                }
            }
            other => {
                error!(
                    "Node label {} has {:?} executors per node. Has to be positive.",
                    label, other
                );
            }
        }
    }
    nodes
}

/// Capacity that is already booting counts against new demand.
fn subtract_pending(required: &mut LabelDemand, pending: &HashMap<String, usize>) {
    for (label, booting) in pending {
        debug!("{} nodes of type {} currently starting", booting, label);
        let requested = required.get(label).copied().unwrap_or(0);
        let remaining = requested.saturating_sub(*booting as u32);
        if remaining > 0 {
            required.insert(label.clone(), remaining);
            debug!(
                "{} new nodes for {} required (down from {})",
                remaining, label, requested
            );
        } else if required.remove(label).is_some() {
            debug!("No new nodes for {} required", label);
        }
    }
}
