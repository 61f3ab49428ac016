// tests/property/supply_test.rs

//! Retirement eligibility, warm-pool floors, and the hourly-billing gate
//! under arbitrary fleet states.

use crate::support::{self, LINUX_CPU, WINDOWS_CPU};
use fleetscale::core::model::Executor;
use fleetscale::core::scaling::supply::idle_retirements;
use proptest::prelude::*;
use std::collections::HashMap;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn only_idle_online_executors_are_retired(
        states in prop::collection::vec((any::<bool>(), any::<bool>()), 1..20),
        floor in 0usize..6,
    ) {
        let mut settings = support::settings();
        settings.warm_pool.insert(LINUX_CPU.to_string(), floor);

        let executors: Vec<Executor> = states
            .iter()
            .enumerate()
            .map(|(i, (idle, offline))| {
                let mut e = support::executor(&format!("linux-cpu_{i:010}"), LINUX_CPU);
                e.idle = *idle;
                e.offline = *offline;
                e
            })
            .collect();
        let uptimes: HashMap<String, u64> = executors
            .iter()
            .map(|e| (e.display_name.clone(), 500))
            .collect();

        let retire = idle_retirements(&executors, &uptimes, &settings);
        let retired: Vec<&String> = retire.values().flatten().collect();

        for name in &retired {
            let executor = executors
                .iter()
                .find(|e| &&e.display_name == name)
                .expect("retired name comes from the input");
            prop_assert!(executor.idle && !executor.offline);
        }

        // The warm pool keeps min(floor, eligible) idle executors alive.
        let eligible = executors.iter().filter(|e| e.idle && !e.offline).count();
        prop_assert!(eligible - retired.len() >= floor.min(eligible));
    }

    #[test]
    fn hourly_billed_executors_only_die_near_the_hour(uptime in 0u64..20_000) {
        let settings = support::settings();
        let mut ex = support::executor("windows-cpu_aaaaaaaaaa", WINDOWS_CPU);
        ex.architecture = Some("Windows Server 2019 (amd64)".to_string());
        let uptimes = HashMap::from([("windows-cpu_aaaaaaaaaa".to_string(), uptime)]);

        let retire = idle_retirements(&[ex], &uptimes, &settings);

        let gate_open =
            uptime % 3600 >= settings.windows_min_partial_uptime.as_secs();
        prop_assert_eq!(!retire.is_empty(), gate_open);
    }
}
