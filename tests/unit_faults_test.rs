// tests/unit_faults_test.rs

#[path = "support/mod.rs"]
mod support;

use fleetscale::core::scaling::faults::detect;
use std::collections::HashMap;
use support::{LINUX_CPU, WINDOWS_CPU, executor, unconnected_executor};

fn uptime_map(entries: &[(&str, u64)]) -> HashMap<String, u64> {
    entries
        .iter()
        .map(|(name, secs)| (name.to_string(), *secs))
        .collect()
}

fn pending_map(label: &str, names: &[&str]) -> HashMap<String, Vec<String>> {
    let mut pending = HashMap::new();
    pending.insert(
        label.to_string(),
        names.iter().map(|n| n.to_string()).collect(),
    );
    pending
}

#[test]
fn vm_stuck_in_startup_marks_its_executor_faulty() {
    let settings = support::settings();
    let stuck = unconnected_executor("windows-cpu_aaaaaaaaaa", WINDOWS_CPU);
    let pending = pending_map(WINDOWS_CPU, &["windows-cpu_aaaaaaaaaa"]);
    // Max startup age is 600s for every fixture label.
    let uptimes = uptime_map(&[("windows-cpu_aaaaaaaaaa", 900)]);

    let report = detect(&[stuck], &pending, &uptimes, &settings);

    assert_eq!(
        report.faulty[WINDOWS_CPU],
        vec!["windows-cpu_aaaaaaaaaa".to_string()]
    );
    assert!(report.orphans.is_empty());
}

#[test]
fn young_pending_vm_is_not_faulty() {
    let settings = support::settings();
    let booting = unconnected_executor("windows-cpu_aaaaaaaaaa", WINDOWS_CPU);
    let pending = pending_map(WINDOWS_CPU, &["windows-cpu_aaaaaaaaaa"]);
    let uptimes = uptime_map(&[("windows-cpu_aaaaaaaaaa", 120)]);

    let report = detect(&[booting], &pending, &uptimes, &settings);

    assert!(report.faulty.is_empty());
}

#[test]
fn pending_vm_without_executor_becomes_an_orphan() {
    let settings = support::settings();
    let pending = pending_map(LINUX_CPU, &["linux-cpu_aaaaaaaaaa"]);
    let uptimes = uptime_map(&[("linux-cpu_aaaaaaaaaa", 900)]);

    let report = detect(&[], &pending, &uptimes, &settings);

    assert!(report.faulty.is_empty());
    assert_eq!(report.orphans, vec!["linux-cpu_aaaaaaaaaa".to_string()]);
}

#[test]
fn monitor_offline_executors_are_faulty() {
    let settings = support::settings();
    let mut ex = executor("linux-cpu_aaaaaaaaaa", LINUX_CPU);
    ex.temporarily_offline = true;
    ex.offline = true;
    ex.offline_cause_class =
        Some("hudson.node_monitors.DiskSpaceMonitorDescriptor$DiskSpace".to_string());
    ex.offline_cause_reason = "Disk space is too low".to_string();
    let uptimes = uptime_map(&[("linux-cpu_aaaaaaaaaa", 900)]);

    let report = detect(&[ex], &HashMap::new(), &uptimes, &settings);

    assert_eq!(report.faulty[LINUX_CPU], vec!["linux-cpu_aaaaaaaaaa".to_string()]);
}

#[test]
fn stale_downscale_marks_are_faulty() {
    let settings = support::settings();
    let uptimes = uptime_map(&[
        ("linux-cpu_aaaaaaaaaa", 900),
        ("linux-cpu_bbbbbbbbbb", 900),
    ]);

    let mut auto_marked = executor("linux-cpu_aaaaaaaaaa", LINUX_CPU);
    auto_marked.offline = true;
    auto_marked.temporarily_offline = true;
    auto_marked.offline_cause_reason = "[AUTOSCALING] Downscale".to_string();

    let mut hand_marked = executor("linux-cpu_bbbbbbbbbb", LINUX_CPU);
    hand_marked.offline = true;
    hand_marked.temporarily_offline = true;
    hand_marked.offline_cause_reason = "[DOWNSCALE] drained for kernel upgrade".to_string();

    let report = detect(&[auto_marked, hand_marked], &HashMap::new(), &uptimes, &settings);

    let mut names = report.faulty[LINUX_CPU].clone();
    names.sort();
    assert_eq!(
        names,
        vec![
            "linux-cpu_aaaaaaaaaa".to_string(),
            "linux-cpu_bbbbbbbbbb".to_string()
        ]
    );
}

#[test]
fn slot_without_vm_is_faulty() {
    let settings = support::settings();
    let ex = executor("linux-cpu_aaaaaaaaaa", LINUX_CPU);

    let report = detect(&[ex], &HashMap::new(), &HashMap::new(), &settings);

    assert_eq!(report.faulty[LINUX_CPU], vec!["linux-cpu_aaaaaaaaaa".to_string()]);
}

#[test]
fn ignored_executor_names_are_exempt() {
    let settings = support::settings();
    // The master has no backing VM, which would otherwise look faulty.
    let master = executor("master", LINUX_CPU);

    let report = detect(&[master], &HashMap::new(), &HashMap::new(), &settings);

    assert!(report.faulty.is_empty());
}

#[test]
fn unmanaged_executors_are_skipped() {
    let settings = support::settings();
    let stray = executor("stray_0000000000", "hand-rolled-label");

    let report = detect(&[stray], &HashMap::new(), &HashMap::new(), &settings);

    assert!(report.faulty.is_empty());
}

#[test]
fn healthy_executors_are_not_reported() {
    let settings = support::settings();
    let ex = executor("linux-cpu_aaaaaaaaaa", LINUX_CPU);
    let uptimes = uptime_map(&[("linux-cpu_aaaaaaaaaa", 900)]);

    let report = detect(&[ex], &HashMap::new(), &uptimes, &settings);

    assert!(report.faulty.is_empty());
    assert!(report.orphans.is_empty());
}
