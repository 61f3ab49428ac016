// tests/property/labels_test.rs

//! Round-trip of the queue-reason templates: a label substituted into any
//! accepted phrasing is extracted back verbatim.

use crate::support;
use chrono::Utc;
use fleetscale::core::scaling::labels::starvation_label;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    #[test]
    fn reason_templates_round_trip(label in "[a-z][a-z0-9-]{0,20}") {
        let mut settings = support::settings();
        settings.managed_labels.insert(label.clone());
        let now = Utc::now();

        let phrasings = [
            format!("There are no nodes with the label ‘{label}’"),
            format!("All nodes of label ‘{label}’ are offline"),
            format!("Jenkins doesn’t have label {label}"),
            format!("Waiting for next available executor on {label}"),
            format!("{label} is offline"),
        ];

        for why in &phrasings {
            let item = support::queue_item(1, why, 120, now);
            let extracted = starvation_label(&item, &[], &settings);
            prop_assert_eq!(extracted.as_deref(), Some(label.as_str()), "phrasing: {}", why);
        }
    }
}
