// src/core/scaling/pending.rs

//! Buckets managed VMs that are not serving builds yet: still-booting
//! machines whose executor slot is waiting for them, and orphans with no
//! slot at all.
//!
//! Each VM lands in exactly one bucket per pass. A VM whose executor exists
//! is pending capacity (its slot will come up or the fault detector will
//! reap it); a VM with no executor can never connect and is terminated.

use crate::config::Settings;
use crate::core::model::{Executor, VmInstance};
use crate::core::scaling::labels;
use std::collections::HashMap;
use tracing::{debug, error};

/// The in-flight portion of the fleet, grouped for the analyzers.
#[derive(Debug, Default)]
pub struct FleetBuckets {
    /// label → names of VMs that are launched but whose executor has not
    /// connected yet.
    pub pending: HashMap<String, Vec<String>>,
    /// Names of VMs with no executor slot on the master.
    pub orphans: Vec<String>,
}

impl FleetBuckets {
    /// Per-label pending counts, the shape the demand analyzer consumes.
    pub fn pending_counts(&self) -> HashMap<String, usize> {
        self.pending
            .iter()
            .map(|(label, names)| (label.clone(), names.len()))
            .collect()
    }
}

/// Classifies every managed VM against the executor list.
pub fn classify(executors: &[Executor], vms: &[VmInstance], settings: &Settings) -> FleetBuckets {
    let mut buckets = FleetBuckets::default();

    for vm in vms {
        if settings.is_ignored_executor(&vm.name) {
            continue;
        }

        match labels::find_executor(executors, &vm.name) {
            Some(executor) if executor.offline && !executor.temporarily_offline => {
                let Some(label) = vm.label.clone() else {
                    error!("Managed VM {} does not have a label tag", vm.id);
                    continue;
                };
                debug!("VM {} starting up but not connected yet", vm.name);
                buckets.pending.entry(label).or_default().push(vm.name.clone());
            }
            Some(_) => {
                // Connected, or deliberately offline: not in flight.
            }
            None => {
                error!("Found orphaned / zombie VM: '{}' ({})", vm.name, vm.id);
                buckets.orphans.push(vm.name.clone());
            }
        }
    }

    buckets
}
