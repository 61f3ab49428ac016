// src/core/master/slot.rs

//! Builds the `doCreateItem` payload for a new executor slot.
//!
//! The master's node-creation endpoint takes the full slot definition as one
//! JSON document in the `json` parameter, using the `DumbSlave` descriptor
//! schema. Agents connect inbound via JNLP (through the private tunnel), so
//! no credentials ever land on the VMs.

use crate::config::SlotSettings;
use serde_json::{Value, json};

/// Descriptor type the creation endpoint expects.
pub const SLOT_DESCRIPTOR: &str = "hudson.slaves.DumbSlave$DescriptorImpl";

const RETENTION_ALWAYS: &str = "hudson.slaves.RetentionStrategy$Always";
const JNLP_LAUNCHER: &str = "hudson.slaves.JNLPLauncher";
const JOB_RESTRICTION_PROPERTY: &str =
    "com.synopsys.arc.jenkinsci.plugins.jobrestrictions.nodes.JobRestrictionProperty";
const REGEX_NAME_RESTRICTION: &str =
    "com.synopsys.arc.jenkinsci.plugins.jobrestrictions.restrictions.job.RegexNameRestriction";

/// Renders the slot definition document for one executor.
pub fn definition(
    name: &str,
    label: &str,
    slot: &SlotSettings,
    num_executors: u32,
    tunnel: &str,
) -> Value {
    let mut node_properties = json!({ "stapler-class-bag": "true" });

    if let Some(regex) = &slot.job_restriction_regex {
        node_properties[JOB_RESTRICTION_PROPERTY] = json!({
            "$plugin": "job-restrictions@0.7",
            "jobRestriction": {
                "stapler-class": REGEX_NAME_RESTRICTION,
                "$class": REGEX_NAME_RESTRICTION,
                "regexExpression": regex,
                "checkShortName": "false",
            }
        });
    }

    json!({
        "name": name,
        "nodeDescription": slot.description,
        "numExecutors": num_executors,
        "remoteFS": slot.remote_fs,
        "labelString": label,
        "mode": if slot.exclusive { "EXCLUSIVE" } else { "NORMAL" },
        "retentionStrategy": {
            "stapler-class": RETENTION_ALWAYS,
            "$class": RETENTION_ALWAYS,
        },
        "type": "hudson.slaves.DumbSlave",
        "nodeProperties": node_properties,
        "launcher": {
            "stapler-class": JNLP_LAUNCHER,
            "tunnel": tunnel,
        },
    })
}
