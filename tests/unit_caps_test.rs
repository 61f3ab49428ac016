// tests/unit_caps_test.rs

use fleetscale::core::scaling::caps::{apply_downscale_limit, apply_upscale_limit};
use std::collections::HashMap;

fn demand(entries: &[(&str, u32)]) -> HashMap<String, u32> {
    entries.iter().map(|(l, n)| (l.to_string(), *n)).collect()
}

#[test]
fn demand_below_the_limit_is_untouched() {
    let capped = apply_upscale_limit(demand(&[("a", 1), ("b", 2), ("c", 7)]), 10);
    assert_eq!(capped, demand(&[("a", 1), ("b", 2), ("c", 7)]));
}

#[test]
fn compression_hits_the_largest_label() {
    // Ascending processing makes the rounding loss land on the biggest
    // request instead of zeroing the single-node ones.
    let capped = apply_upscale_limit(demand(&[("a", 1), ("b", 2), ("c", 7)]), 5);
    assert_eq!(capped, demand(&[("a", 1), ("b", 1), ("c", 3)]));
}

#[test]
fn compressed_demand_sums_to_the_limit_exactly() {
    let capped = apply_upscale_limit(demand(&[("a", 13), ("b", 29), ("c", 3), ("d", 17)]), 10);
    assert_eq!(capped.values().sum::<u32>(), 10);
}

#[test]
fn zero_limit_clears_all_demand() {
    let capped = apply_upscale_limit(demand(&[("a", 3), ("b", 5)]), 0);
    assert!(capped.is_empty());
}

fn retirements(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(l, names)| {
            (
                l.to_string(),
                names.iter().map(|n| n.to_string()).collect(),
            )
        })
        .collect()
}

#[test]
fn retirements_below_the_limit_are_untouched() {
    let input = retirements(&[("a", &["a1", "a2"]), ("b", &["b1"])]);
    let capped = apply_downscale_limit(input.clone(), 10);
    assert_eq!(capped, input);
}

#[test]
fn retirements_are_cut_at_the_limit() {
    let input = retirements(&[
        ("a", &["a1", "a2", "a3"]),
        ("b", &["b1", "b2", "b3"]),
        ("c", &["c1", "c2", "c3"]),
    ]);
    let capped = apply_downscale_limit(input.clone(), 4);

    let total: usize = capped.values().map(Vec::len).sum();
    assert_eq!(total, 4);

    // Only names from the input survive, each under its own label.
    for (label, names) in &capped {
        for name in names {
            assert!(input[label].contains(name));
        }
    }
}

#[test]
fn zero_limit_clears_all_retirements() {
    let capped = apply_downscale_limit(retirements(&[("a", &["a1"])]), 0);
    assert!(capped.is_empty());
}
