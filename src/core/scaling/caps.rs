// src/core/scaling/caps.rs

//! Per-round scale limits. A pass runs inside a short-lived invocation; the
//! caps keep one round's mutation fan-out within its deadline.

use crate::core::model::{LabelDemand, RetirementSet};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// Compresses demand proportionally so its sum does not exceed `limit`.
///
/// Labels are processed in ascending order of demand so that rounding losses
/// land on the largest request instead of zeroing out a label that asked for
/// a single node. When demand exceeds the limit the result sums to exactly
/// `limit`.
pub fn apply_upscale_limit(demand: LabelDemand, limit: u32) -> LabelDemand {
    let total: u32 = demand.values().sum();
    if total <= limit {
        return demand;
    }

    let mut ordered: Vec<(String, u32)> = demand.clone().into_iter().collect();
    ordered.sort_by_key(|(_, count)| *count);

    let reduction = f64::from(limit) / f64::from(total);
    let mut budget = limit;
    let mut capped = LabelDemand::new();
    for (label, requested) in ordered {
        let scaled = (f64::from(requested) * reduction).ceil() as u32;
        let granted = scaled.min(budget);
        budget -= granted;
        capped.insert(label, granted);
    }

    for (label, requested) in &demand {
        let granted = capped.get(label).copied().unwrap_or(0);
        if granted != *requested {
            info!("Limiting upscale of {} from {} to {}", label, requested, granted);
        }
    }
    capped.retain(|_, count| *count > 0);
    capped
}

/// Caps the retirement set at `limit` executors, visiting labels in random
/// order so no label is systematically starved of downscaling.
pub fn apply_downscale_limit(retire: RetirementSet, limit: usize) -> RetirementSet {
    let mut entries: Vec<(String, Vec<String>)> = retire.into_iter().collect();
    entries.shuffle(&mut SmallRng::from_entropy());

    let mut taken = 0usize;
    let mut capped = RetirementSet::new();
    for (label, names) in entries {
        if taken >= limit {
            info!("Reached downscale limit");
            break;
        }
        let room = limit - taken;
        let kept: Vec<String> = names.into_iter().take(room).collect();
        taken += kept.len();
        if !kept.is_empty() {
            capped.insert(label, kept);
        }
    }
    capped
}
