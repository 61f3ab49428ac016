// tests/support/mod.rs

//! Shared fixtures: a representative label configuration and builders for
//! executors, VMs, and queue items.

#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fleetscale::config::{
    LaunchTemplateRef, Parallelism, SecretSource, Settings, SlotSettings, UserDataFamily,
};
use fleetscale::core::model::{Executor, QueueItem, VmInstance, VmState};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub const LINUX_CPU: &str = "linux-cpu";
pub const LINUX_GPU: &str = "linux-gpu";
pub const RESTRICTED_LINUX_CPU: &str = "restricted-linux-cpu";
pub const WINDOWS_CPU: &str = "windows-cpu";
pub const LEGACY_LABEL: &str = "legacy-worker";

fn labeled<T: Clone>(value: T) -> HashMap<String, T> {
    [LINUX_CPU, LINUX_GPU, RESTRICTED_LINUX_CPU, WINDOWS_CPU]
        .iter()
        .map(|label| (label.to_string(), value.clone()))
        .collect()
}

fn slot(description: &str) -> SlotSettings {
    SlotSettings {
        description: description.to_string(),
        remote_fs: "/home/ci_agent".to_string(),
        exclusive: true,
        job_restriction_regex: Some("^(?!restricted-).+".to_string()),
    }
}

/// A fully populated configuration covering four managed labels (one of them
/// hourly-billed Windows) plus an ignored legacy label.
pub fn settings() -> Settings {
    let mut executors_per_label = HashMap::new();
    executors_per_label.insert(LINUX_CPU.to_string(), 4);
    executors_per_label.insert(LINUX_GPU.to_string(), 2);
    executors_per_label.insert(RESTRICTED_LINUX_CPU.to_string(), 1);
    executors_per_label.insert(WINDOWS_CPU.to_string(), 2);

    let mut user_data_families = labeled(UserDataFamily::LinuxShell);
    user_data_families.insert(WINDOWS_CPU.to_string(), UserDataFamily::WindowsHourly);

    Settings {
        managed_labels: [LINUX_CPU, LINUX_GPU, RESTRICTED_LINUX_CPU, WINDOWS_CPU]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ignored_labels: HashSet::from([LEGACY_LABEL.to_string()]),
        ignored_executor_names: HashSet::from(["master".to_string()]),
        bootstrap_label: LINUX_CPU.to_string(),
        executors_per_label,
        warm_pool: HashMap::new(),
        min_queue_age: labeled(30),
        max_startup_age: labeled(600),
        launch_templates: labeled(LaunchTemplateRef {
            id: "lt-0123456789abcdef0".to_string(),
            version: "7".to_string(),
        }),
        user_data_families,
        slots: labeled(slot("Autoscaled CI build machine")),
        tunnel_address: "tunnel.ci.internal:50000".to_string(),
        upscales_per_round: 20,
        downscales_per_round: 40,
        parallelism: Parallelism {
            master: 100,
            master_create: 10,
            provider: 3,
        },
        master_request_timeout: Duration::from_secs(300),
        windows_min_partial_uptime: Duration::from_secs(55 * 60),
        agent_retry_reset: Duration::from_secs(600),
        secret: SecretSource {
            name: "ci/master-credentials".to_string(),
            endpoint_url: "https://secretsmanager.eu-west-1.amazonaws.com".to_string(),
            region: "eu-west-1".to_string(),
        },
    }
}

/// An online, idle, fully connected executor of the given label.
pub fn executor(name: &str, label: &str) -> Executor {
    Executor {
        display_name: name.to_string(),
        assigned_labels: vec![label.to_string(), format!("{name}-tag")],
        offline: false,
        temporarily_offline: false,
        idle: true,
        offline_cause_class: None,
        offline_cause_reason: String::new(),
        architecture: Some("Linux (amd64)".to_string()),
        num_executors: 4,
    }
}

/// An executor slot that has never connected: offline with no cause and no
/// architecture report.
pub fn unconnected_executor(name: &str, label: &str) -> Executor {
    Executor {
        offline: true,
        idle: true,
        architecture: None,
        ..executor(name, label)
    }
}

pub fn queue_item(id: u64, why: &str, age_secs: u64, now: DateTime<Utc>) -> QueueItem {
    QueueItem {
        id,
        why: why.to_string(),
        in_queue_since_ms: (now - ChronoDuration::seconds(age_secs as i64)).timestamp_millis(),
    }
}

pub fn vm(name: &str, label: &str, uptime_secs: u64, now: DateTime<Utc>) -> VmInstance {
    VmInstance {
        id: format!("i-{name}"),
        name: name.to_string(),
        label: Some(label.to_string()),
        state: VmState::Running,
        launch_time: now - ChronoDuration::seconds(uptime_secs as i64),
    }
}
