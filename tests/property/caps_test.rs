// tests/property/caps_test.rs

//! Invariants of the per-round scale caps.

use fleetscale::core::scaling::caps::{apply_downscale_limit, apply_upscale_limit};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn upscale_cap_bounds_the_total(
        demand in prop::collection::hash_map("[a-z]{1,12}", 1u32..50, 0..8),
        cap in 0u32..100,
    ) {
        let total: u32 = demand.values().sum();
        let capped = apply_upscale_limit(demand.clone(), cap);
        let capped_total: u32 = capped.values().sum();

        prop_assert!(capped_total <= cap || total <= cap);
        if total > cap {
            // Compression is exact, not merely bounded.
            prop_assert_eq!(capped_total, cap);
        } else {
            prop_assert_eq!(&capped, &demand);
        }

        // No label gains capacity and none appears out of thin air.
        for (label, granted) in &capped {
            prop_assert!(demand.contains_key(label));
            prop_assert!(*granted <= demand[label]);
            prop_assert!(*granted > 0);
        }
    }

    #[test]
    fn downscale_cap_bounds_the_total(
        retire in prop::collection::hash_map(
            "[a-z]{1,12}",
            prop::collection::vec("[a-z0-9_]{1,16}", 1..6),
            0..6,
        ),
        cap in 0usize..12,
    ) {
        let input_total: usize = retire.values().map(Vec::len).sum();
        let capped = apply_downscale_limit(retire.clone(), cap);
        let capped_total: usize = capped.values().map(Vec::len).sum();

        prop_assert_eq!(capped_total, cap.min(input_total));

        // Every survivor comes from the input, under its own label.
        for (label, names) in &capped {
            for name in names {
                prop_assert!(retire[label].contains(name));
            }
        }
    }
}
