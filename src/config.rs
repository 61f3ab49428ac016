// src/config.rs

//! Manages autoscaler configuration: loading from the environment, decoding
//! JSON-encoded values, and validation.
//!
//! All configuration is read exactly once per pass and carried by value in a
//! [`Settings`]; nothing here is mutable at runtime. Structured values are
//! JSON-encoded strings so the whole registry fits into plain environment
//! variables (the deployment tooling renders them from one document).

use crate::core::errors::ScaleError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;

/// A launch template reference the VM provider resolves on our behalf.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LaunchTemplateRef {
    pub id: String,
    pub version: String,
}

/// The OS family of a label's VMs, selecting the user-data template and the
/// billing model.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UserDataFamily {
    /// Plain per-second billed Linux machines bootstrapped via a shell script.
    LinuxShell,
    /// Hourly billed Windows machines. These are only retired close to a full
    /// hour of uptime.
    WindowsHourly,
}

/// Master-side slot parameters for one label.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotSettings {
    /// Human-readable node description shown in the master UI.
    pub description: String,
    /// Remote workspace root on the VM.
    pub remote_fs: String,
    /// If true the slot only runs jobs explicitly assigned to its label.
    #[serde(default)]
    pub exclusive: bool,
    /// Regex over job names this slot is allowed to run. `None` disables the
    /// restriction property entirely.
    #[serde(default)]
    pub job_restriction_regex: Option<String>,
}

/// Where the master credentials live.
#[derive(Debug, Clone)]
pub struct SecretSource {
    pub name: String,
    pub endpoint_url: String,
    pub region: String,
}

/// Bounded pool sizes per API family.
#[derive(Debug, Clone, Copy)]
pub struct Parallelism {
    /// General master requests (polls, offline toggles, deletions).
    pub master: usize,
    /// Slot creation. Kept low: the master's create endpoint is not
    /// thread-safe and races under load.
    pub master_create: usize,
    /// VM provider requests.
    pub provider: usize,
}

/// The complete, validated configuration of one pass.
#[derive(Debug, Clone)]
pub struct Settings {
    pub managed_labels: HashSet<String>,
    pub ignored_labels: HashSet<String>,
    pub ignored_executor_names: HashSet<String>,
    pub bootstrap_label: String,
    pub executors_per_label: HashMap<String, u32>,
    pub warm_pool: HashMap<String, usize>,
    pub min_queue_age: HashMap<String, u64>,
    pub max_startup_age: HashMap<String, u64>,
    pub launch_templates: HashMap<String, LaunchTemplateRef>,
    pub user_data_families: HashMap<String, UserDataFamily>,
    pub slots: HashMap<String, SlotSettings>,
    pub tunnel_address: String,
    pub upscales_per_round: u32,
    pub downscales_per_round: usize,
    pub parallelism: Parallelism,
    pub master_request_timeout: Duration,
    pub windows_min_partial_uptime: Duration,
    pub agent_retry_reset: Duration,
    pub secret: SecretSource,
}

fn default_upscales_per_round() -> u32 {
    20
}
fn default_downscales_per_round() -> usize {
    40
}
fn default_master_parallelism() -> usize {
    100
}
fn default_master_create_parallelism() -> usize {
    10
}
fn default_provider_parallelism() -> usize {
    3
}
fn default_master_request_timeout_sec() -> u64 {
    300
}
fn default_windows_min_partial_uptime_sec() -> u64 {
    55 * 60
}
fn default_agent_retry_reset_sec() -> u64 {
    600
}

impl Settings {
    /// Reads the whole registry from the process environment. All lookups
    /// happen up front; a missing or malformed entry fails the pass before
    /// any external system is touched.
    pub fn from_env() -> Result<Self, ScaleError> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Builds and validates a `Settings` from a plain key→value map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ScaleError> {
        let managed_labels: HashSet<String> = json_var(vars, "MANAGED_LABELS")?;
        let ignored_labels: HashSet<String> = json_var(vars, "IGNORED_LABELS")?;
        let ignored_executor_names: HashSet<String> = json_var(vars, "IGNORED_EXECUTOR_NAMES")?;
        let bootstrap_label = string_var(vars, "BOOTSTRAP_LABEL")?;

        let settings = Settings {
            executors_per_label: json_var(vars, "EXECUTORS_PER_LABEL")?,
            warm_pool: json_var_or(vars, "WARM_POOL_SIZE", HashMap::new())?,
            min_queue_age: json_var(vars, "MINIMUM_QUEUE_TIME_SEC")?,
            max_startup_age: json_var(vars, "MAXIMUM_STARTUP_TIME_SEC")?,
            launch_templates: json_var(vars, "LAUNCH_TEMPLATES")?,
            user_data_families: json_var(vars, "USER_DATA_FAMILIES")?,
            slots: json_var(vars, "SLOT_CONFIGURATION")?,
            tunnel_address: string_var(vars, "TUNNEL_ADDRESS")?,
            upscales_per_round: int_var_or(vars, "UPSCALES_PER_ROUND", default_upscales_per_round())?,
            downscales_per_round: int_var_or(
                vars,
                "DOWNSCALES_PER_ROUND",
                default_downscales_per_round(),
            )?,
            parallelism: Parallelism {
                master: int_var_or(vars, "MASTER_PARALLELISM", default_master_parallelism())?,
                master_create: int_var_or(
                    vars,
                    "MASTER_CREATE_PARALLELISM",
                    default_master_create_parallelism(),
                )?,
                provider: int_var_or(vars, "PROVIDER_PARALLELISM", default_provider_parallelism())?,
            },
            master_request_timeout: Duration::from_secs(int_var_or(
                vars,
                "MASTER_REQUEST_TIMEOUT_SEC",
                default_master_request_timeout_sec(),
            )?),
            windows_min_partial_uptime: Duration::from_secs(int_var_or(
                vars,
                "WINDOWS_MIN_PARTIAL_UPTIME_SEC",
                default_windows_min_partial_uptime_sec(),
            )?),
            agent_retry_reset: Duration::from_secs(int_var_or(
                vars,
                "AGENT_RETRY_RESET_SEC",
                default_agent_retry_reset_sec(),
            )?),
            secret: SecretSource {
                name: string_var(vars, "SECRET_NAME")?,
                endpoint_url: string_var(vars, "SECRET_ENDPOINT_URL")?,
                region: string_var(vars, "SECRET_ENDPOINT_REGION")?,
            },
            managed_labels,
            ignored_labels,
            ignored_executor_names,
            bootstrap_label,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// A label the autoscaler is allowed to scale up and down.
    pub fn is_managed(&self, label: &str) -> bool {
        self.managed_labels.contains(label)
    }

    /// A label that is tolerated on existing executors but never scaled.
    pub fn is_ignored(&self, label: &str) -> bool {
        self.ignored_labels.contains(label)
    }

    /// An executor display name the autoscaler must never touch (the master
    /// itself, pinned utility machines, ...).
    pub fn is_ignored_executor(&self, name: &str) -> bool {
        self.ignored_executor_names.contains(name)
    }

    /// True when `label` bills hourly and must respect the partial-uptime
    /// gate before termination.
    pub fn is_hourly_billed(&self, label: &str) -> bool {
        self.user_data_families.get(label) == Some(&UserDataFamily::WindowsHourly)
    }

    /// Every managed label must come with the full set of per-label knobs;
    /// a partially configured label would otherwise surface as silently
    /// skipped demand deep inside a pass.
    fn validate(&self) -> Result<(), ScaleError> {
        for label in &self.managed_labels {
            match self.executors_per_label.get(label) {
                None => {
                    return Err(ScaleError::Config(format!(
                        "Managed label '{label}' has no EXECUTORS_PER_LABEL entry"
                    )));
                }
                Some(0) => {
                    return Err(ScaleError::Config(format!(
                        "Managed label '{label}' has zero executors per node"
                    )));
                }
                Some(_) => {}
            }
            for (key, present) in [
                ("MINIMUM_QUEUE_TIME_SEC", self.min_queue_age.contains_key(label)),
                ("MAXIMUM_STARTUP_TIME_SEC", self.max_startup_age.contains_key(label)),
                ("LAUNCH_TEMPLATES", self.launch_templates.contains_key(label)),
                ("USER_DATA_FAMILIES", self.user_data_families.contains_key(label)),
                ("SLOT_CONFIGURATION", self.slots.contains_key(label)),
            ] {
                if !present {
                    return Err(ScaleError::Config(format!(
                        "Managed label '{label}' has no {key} entry"
                    )));
                }
            }
        }

        if !self.is_managed(&self.bootstrap_label) {
            return Err(ScaleError::Config(format!(
                "Bootstrap label '{}' is not a managed label",
                self.bootstrap_label
            )));
        }

        Ok(())
    }
}

fn string_var(vars: &HashMap<String, String>, key: &str) -> Result<String, ScaleError> {
    vars.get(key)
        .cloned()
        .ok_or_else(|| ScaleError::MissingEnv(key.to_string()))
}

fn json_var<T: serde::de::DeserializeOwned>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<T, ScaleError> {
    let raw = string_var(vars, key)?;
    serde_json::from_str(&raw).map_err(|e| ScaleError::InvalidEnv {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn json_var_or<T: serde::de::DeserializeOwned>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ScaleError> {
    match vars.get(key) {
        Some(raw) => serde_json::from_str(raw).map_err(|e| ScaleError::InvalidEnv {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn int_var_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ScaleError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ScaleError::InvalidEnv {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
