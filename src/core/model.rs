// src/core/model.rs

//! Domain types shared across the reconciler: executors as the master reports
//! them, VMs as the provider reports them, and queued build items.
//!
//! Executors and VMs are linked only by name (display name on the master side,
//! `Name` tag on the provider side). Either side may be missing its
//! counterpart at any time; every consumer of these types must tolerate that.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Offline cause `_class` namespace used by the master's own node monitoring
/// (low disk space, unresponsive channel, ...).
pub const NODE_MONITOR_OFFLINE_NAMESPACE: &str = "hudson.node_monitors";

/// Offline reason written by the autoscaler when it prepares a decommission.
pub const DOWNSCALE_REASON: &str = "[AUTOSCALING] Downscale";

/// Prefix operators use to manually request a decommission.
pub const DOWNSCALE_MANUAL_PREFIX: &str = "[DOWNSCALE]";

/// A build executor as known to the master, reduced to the fields the
/// reconciler acts on.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    /// Unique display name. For autoscaled executors this equals the VM's
    /// `Name` tag.
    pub display_name: String,
    /// All labels assigned to the executor, flattened from the master's
    /// `assignedLabels` list.
    pub assigned_labels: Vec<String>,
    /// True when the executor is not connected, for whatever reason.
    pub offline: bool,
    /// True when the executor was deliberately taken offline (by the
    /// autoscaler, an operator, or the master's monitoring).
    pub temporarily_offline: bool,
    /// True when no build is running on any of the executor's slots.
    pub idle: bool,
    /// `_class` of the offline cause, when one is set.
    pub offline_cause_class: Option<String>,
    /// Free-form reason attached to the offline mark. Empty when online.
    pub offline_cause_reason: String,
    /// Architecture string from the master's architecture monitor. Present
    /// only once the agent has connected and reported in.
    pub architecture: Option<String>,
    /// Number of build slots the executor offers.
    pub num_executors: u32,
}

impl Executor {
    /// An executor is a retirement candidate only while it is reachable and
    /// doing nothing.
    pub fn is_idle_online(&self) -> bool {
        !self.offline && self.idle
    }
}

/// VM lifecycle states the reconciler distinguishes. Anything else
/// (terminated, stopping, ...) is invisible to a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Pending,
    Running,
}

/// A managed VM as reported by the provider.
#[derive(Debug, Clone)]
pub struct VmInstance {
    pub id: String,
    /// The `Name` tag, equal to the intended executor display name.
    pub name: String,
    /// The `label` tag. Absence is a data anomaly: the VM cannot be matched
    /// to a scaling decision.
    pub label: Option<String>,
    pub state: VmState,
    pub launch_time: DateTime<Utc>,
}

impl VmInstance {
    /// Seconds since the VM was launched, saturating at zero for clock skew.
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.launch_time).num_seconds().max(0) as u64
    }
}

/// An item waiting in the master's build queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: u64,
    /// Free-form blockage reason emitted by the master.
    pub why: String,
    /// Enqueue instant, epoch milliseconds.
    pub in_queue_since_ms: i64,
}

impl QueueItem {
    /// Seconds this item has been waiting, relative to `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        (now.timestamp_millis() - self.in_queue_since_ms).max(0) as u64 / 1000
    }
}

/// Per-label count of new nodes to create.
pub type LabelDemand = HashMap<String, u32>;

/// Per-label list of executor display names to retire.
pub type RetirementSet = HashMap<String, Vec<String>>;

/// Merge two retirement sets, concatenating the per-label name lists.
pub fn merge_retirements(mut base: RetirementSet, extra: RetirementSet) -> RetirementSet {
    for (label, names) in extra {
        base.entry(label).or_default().extend(names);
    }
    base
}
