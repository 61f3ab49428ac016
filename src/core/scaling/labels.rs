// src/core/scaling/labels.rs

//! Translates the master's free-form queue blockage reasons and executor
//! label sets into managed labels.
//!
//! The master does not expose structured starvation data; it prints human
//! readable sentences (with curly quotes) that embed either a label or an
//! executor name. The regex table below mirrors the exact phrasings the
//! master emits; anything that matches none of them is not resource
//! starvation.

use crate::config::Settings;
use crate::core::model::{Executor, QueueItem};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, warn};

lazy_static! {
    /// Blockage phrasings that name the starved label (or, at times, a node
    /// name the master substituted for it). Ordered; the first match wins.
    static ref STARVED_LABEL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"There are no nodes with the label ‘(?P<label>[^\s;\\]*)’").unwrap(),
        Regex::new(r"All nodes of label ‘(?P<label>[^\s;\\]*)’ are offline").unwrap(),
        Regex::new(r"doesn’t have label (?P<label>[^\s;\\]*)").unwrap(),
        Regex::new(r"Waiting for next available executor on (?P<label>[^\s;\\]*)").unwrap(),
        Regex::new(r"(?P<label>[^\s;\\]*) is offline").unwrap(),
    ];

    /// The degenerate phrasing the master uses when it has no executors at
    /// all. It names no label; the configured bootstrap label stands in.
    static ref NO_EXECUTORS_AT_ALL: Regex =
        Regex::new(r"^Waiting for next available executor$").unwrap();
}

/// Extracts the managed label a queue item is starving for, or `None` when
/// the item is blocked for some other reason.
pub fn starvation_label(
    item: &QueueItem,
    executors: &[Executor],
    settings: &Settings,
) -> Option<String> {
    let mut label = if NO_EXECUTORS_AT_ALL.is_match(&item.why) {
        // The master cannot say which label it needs when nothing is
        // connected. Seed the bootstrap label so label propagation restarts.
        debug!(
            "Master reports no executors at all, seeding bootstrap label {}",
            settings.bootstrap_label
        );
        settings.bootstrap_label.clone()
    } else {
        let captured = STARVED_LABEL_PATTERNS
            .iter()
            .find_map(|re| re.captures(&item.why))?;
        captured["label"].to_string()
    };

    label = label
        .trim_matches(|c| matches!(c, ' ' | '\'' | '"' | '‘' | '’'))
        .to_string();

    // The master sometimes prints a node name where a label belongs. Resolve
    // through the executor carrying that display name.
    if !settings.is_managed(&label) {
        let Some(executor) = find_executor(executors, &label) else {
            error!(
                "Queue reason '{}' contains unresolvable label '{}'",
                item.why, label
            );
            return None;
        };
        match resolve_label(executor, settings) {
            Some(resolved) => label = resolved,
            None => {
                error!(
                    "Could not extract a managed label for executor {} named in queue reason '{}'",
                    executor.display_name, item.why
                );
                return None;
            }
        }
    }

    Some(label)
}

/// Extracts the single label the autoscaler manages an executor under.
///
/// Executors carry several labels (the managed one plus per-node tags). An
/// ignored label deliberately wins over a managed one: that is how operators
/// flag an executor to be left alone without detaching it from its label.
/// More than one managed label is a data anomaly and resolves to `None`.
pub fn resolve_label(executor: &Executor, settings: &Settings) -> Option<String> {
    if let Some(ignored) = executor
        .assigned_labels
        .iter()
        .find(|l| settings.is_ignored(l))
    {
        debug!(
            "Executor {} carries ignored label {}",
            executor.display_name, ignored
        );
        return Some(ignored.clone());
    }

    let managed: Vec<&String> = executor
        .assigned_labels
        .iter()
        .filter(|l| settings.is_managed(l))
        .collect();
    match managed.as_slice() {
        [] => {
            warn!(
                "Executor {} has no managed label. Assigned labels: ({})",
                executor.display_name,
                executor.assigned_labels.join(" & ")
            );
            None
        }
        [single] => Some((*single).clone()),
        multiple => {
            error!(
                "Executor {} has {} managed labels: ({})",
                executor.display_name,
                multiple.len(),
                multiple
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(" & ")
            );
            None
        }
    }
}

/// Counts idle, online executors per resolved label.
pub fn idle_executors_per_label(
    executors: &[Executor],
    settings: &Settings,
) -> std::collections::HashMap<String, usize> {
    let mut counts = std::collections::HashMap::new();
    for executor in executors {
        if !executor.is_idle_online() {
            continue;
        }
        if let Some(label) = resolve_label(executor, settings) {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    counts
}

/// Looks up an executor by display name. Names are unique on the master, so
/// the first hit is the only one.
pub fn find_executor<'a>(executors: &'a [Executor], name: &str) -> Option<&'a Executor> {
    executors.iter().find(|e| e.display_name == name)
}
