// src/core/scaling/faults.rs

//! Identifies executors and VMs stuck in states the demand/supply signals
//! never clean up: slots that never got a machine, machines that never
//! connected, monitor-disabled executors, and stale downscale marks.

use crate::config::Settings;
use crate::core::model::{
    DOWNSCALE_MANUAL_PREFIX, DOWNSCALE_REASON, Executor, NODE_MONITOR_OFFLINE_NAMESPACE,
    RetirementSet,
};
use crate::core::scaling::labels;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Faulty executors per label, plus VM names with no executor to speak for
/// them. The former are merged into the retirement set; the latter are
/// terminated directly.
#[derive(Debug, Default)]
pub struct FaultReport {
    pub faulty: RetirementSet,
    pub orphans: Vec<String>,
}

/// Scans all executors and the pending VM set for the four fault classes.
pub fn detect(
    executors: &[Executor],
    pending: &HashMap<String, Vec<String>>,
    uptimes: &HashMap<String, u64>,
    settings: &Settings,
) -> FaultReport {
    let mut report = FaultReport::default();

    // Machines that are booting for longer than the label allows never come
    // up on their own (a recurring failure mode on Windows images).
    for (label, names) in pending {
        let Some(limit) = settings.max_startup_age.get(label) else {
            warn!("Pending VMs of label {} have no startup limit configured", label);
            continue;
        };
        for name in names {
            let Some(executor) = labels::find_executor(executors, name) else {
                // The slot vanished between classification and this scan.
                warn!(
                    "Could not find an executor for pending VM {}, marking as orphaned",
                    name
                );
                report.orphans.push(name.clone());
                continue;
            };
            if let Some(uptime) = uptimes.get(name)
                && uptime > limit
            {
                warn!("VM {} failed to start up within {} seconds", name, uptime);
                report
                    .faulty
                    .entry(label.clone())
                    .or_default()
                    .push(executor.display_name.clone());
            }
        }
    }

    for executor in executors {
        let name = &executor.display_name;
        if settings.is_ignored_executor(name) {
            continue;
        }

        let label = labels::resolve_label(executor, settings);
        let Some(label) = label.filter(|l| settings.is_managed(l)) else {
            debug!(
                "Executor {} is not managed by autoscaling, ignoring for fault detection",
                name
            );
            continue;
        };

        if executor.temporarily_offline
            && executor
                .offline_cause_class
                .as_deref()
                .is_some_and(|class| class.starts_with(NODE_MONITOR_OFFLINE_NAMESPACE))
        {
            warn!(
                "Executor {} has been taken offline by master monitoring due to \"{}\"",
                name, executor.offline_cause_reason
            );
            report.faulty.entry(label).or_default().push(name.clone());
        } else if executor.offline_cause_reason == DOWNSCALE_REASON
            || executor
                .offline_cause_reason
                .starts_with(DOWNSCALE_MANUAL_PREFIX)
        {
            warn!(
                "Executor {} has been marked to downscale but has not scaled down: \"{}\"",
                name, executor.offline_cause_reason
            );
            report.faulty.entry(label).or_default().push(name.clone());
        } else if !uptimes.contains_key(name) {
            warn!("Slot for {} has been created but its VM never appeared", name);
            report.faulty.entry(label).or_default().push(name.clone());
        }
    }

    report.faulty.retain(|_, names| !names.is_empty());
    report
}
