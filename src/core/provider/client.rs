// src/core/provider/client.rs

//! EC2-backed fleet client: listing managed VMs, launching from templates,
//! and terminating by name tag.

use crate::config::LaunchTemplateRef;
use crate::core::errors::ScaleError;
use crate::core::model::{VmInstance, VmState};
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::{
    Filter, InstanceStateName, LaunchTemplateSpecification, ResourceType, Tag, TagSpecification,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// Tag marking a VM as owned by the autoscaler. Every filter in this module
/// carries it; untagged machines are invisible and untouchable.
pub const MANAGED_TAG: &str = "AutoScaledSlave";

/// The provider rejects filters with too many values; name lists are chunked
/// to this size before termination requests.
const FILTER_CHUNK_SIZE: usize = 40;

/// Result of a launch attempt. Capacity shortfall is an expected outcome,
/// not an error: the queue item that caused the launch simply waits for the
/// next pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched { instance_id: String },
    InsufficientCapacity,
}

/// Typed wrapper over the VM provider API.
#[derive(Clone)]
pub struct FleetClient {
    ec2: aws_sdk_ec2::Client,
}

impl FleetClient {
    /// Builds the client from ambient AWS configuration. SDK-level retries
    /// are disabled: a pass prefers failing fast and leaving the remainder
    /// to the next round over blowing its deadline.
    pub async fn connect() -> Self {
        let config = aws_config::from_env()
            .retry_config(aws_config::retry::RetryConfig::disabled())
            .load()
            .await;
        Self {
            ec2: aws_sdk_ec2::Client::new(&config),
        }
    }

    /// Lists all managed VMs that are pending or running.
    pub async fn list_managed(&self) -> Result<Vec<VmInstance>, ScaleError> {
        let mut vms = Vec::new();
        let mut pages = self
            .ec2
            .describe_instances()
            .filters(tag_filter(MANAGED_TAG, "true"))
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values("pending")
                    .values("running")
                    .build(),
            )
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| ScaleError::Provider(format!("DescribeInstances: {e}")))?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    match parse_instance(instance) {
                        Some(vm) => vms.push(vm),
                        None => error!(
                            "Managed VM {} is missing its Name tag or launch time, skipping",
                            instance.instance_id().unwrap_or("<unknown>")
                        ),
                    }
                }
            }
        }

        Ok(vms)
    }

    /// Launches one VM from a label's template, tagged so the next pass can
    /// match it back to its executor slot.
    pub async fn launch(
        &self,
        name: &str,
        label: &str,
        template: &LaunchTemplateRef,
        user_data: &str,
    ) -> Result<LaunchOutcome, ScaleError> {
        let tags = TagSpecification::builder()
            .resource_type(ResourceType::Instance)
            .tags(tag("Name", name))
            .tags(tag(MANAGED_TAG, "true"))
            .tags(tag("label", label))
            .build();

        let result = self
            .ec2
            .run_instances()
            .min_count(1)
            .max_count(1)
            .launch_template(
                LaunchTemplateSpecification::builder()
                    .launch_template_id(&template.id)
                    .version(&template.version)
                    .build(),
            )
            .tag_specifications(tags)
            .user_data(BASE64.encode(user_data))
            .send()
            .await;

        match result {
            Ok(output) => {
                let instance_id = output
                    .instances()
                    .first()
                    .and_then(|i| i.instance_id())
                    .unwrap_or_default()
                    .to_string();
                debug!("Launched VM {} ({}) of type {}", name, instance_id, label);
                Ok(LaunchOutcome::Launched { instance_id })
            }
            Err(err) if err.code() == Some("InsufficientInstanceCapacity") => {
                Ok(LaunchOutcome::InsufficientCapacity)
            }
            Err(err) => Err(ScaleError::Provider(format!(
                "RunInstances for {name}: {}",
                err.message().unwrap_or("request failed")
            ))),
        }
    }

    /// Terminates every managed VM whose Name tag is in `names`, chunking the
    /// tag filter to the provider's limit.
    pub async fn terminate_by_names(&self, names: &[String]) -> Result<(), ScaleError> {
        if names.is_empty() {
            return Ok(());
        }
        info!("Terminating {} VMs: {:?}", names.len(), names);

        for chunk in names.chunks(FILTER_CHUNK_SIZE) {
            let described = self
                .ec2
                .describe_instances()
                .filters(
                    Filter::builder()
                        .name("tag:Name")
                        .set_values(Some(chunk.to_vec()))
                        .build(),
                )
                .filters(tag_filter(MANAGED_TAG, "true"))
                .send()
                .await
                .map_err(|e| ScaleError::Provider(format!("DescribeInstances: {e}")))?;

            let ids: Vec<String> = described
                .reservations()
                .iter()
                .flat_map(|r| r.instances())
                .filter_map(|i| i.instance_id().map(str::to_string))
                .collect();

            if ids.is_empty() {
                warn!("No VMs found for termination chunk {:?}", chunk);
                continue;
            }

            self.ec2
                .terminate_instances()
                .set_instance_ids(Some(ids))
                .send()
                .await
                .map_err(|e| ScaleError::Provider(format!("TerminateInstances: {e}")))?;
        }

        Ok(())
    }
}

/// Seconds of uptime per VM name, skipping names the autoscaler must not
/// touch.
pub fn uptimes(
    vms: &[VmInstance],
    ignored_names: &HashSet<String>,
    now: DateTime<Utc>,
) -> HashMap<String, u64> {
    vms.iter()
        .filter(|vm| !ignored_names.contains(&vm.name))
        .map(|vm| (vm.name.clone(), vm.uptime_secs(now)))
        .collect()
}

fn parse_instance(instance: &aws_sdk_ec2::types::Instance) -> Option<VmInstance> {
    let tags: HashMap<&str, &str> = instance
        .tags()
        .iter()
        .filter_map(|t| Some((t.key()?, t.value()?)))
        .collect();

    let state = match instance.state().and_then(|s| s.name()) {
        Some(InstanceStateName::Pending) => VmState::Pending,
        Some(InstanceStateName::Running) => VmState::Running,
        // The state filter already excludes everything else; a mismatch here
        // means the fleet moved between request and response.
        _ => return None,
    };

    let launch_time = instance.launch_time()?;
    let launch_time = DateTime::from_timestamp(launch_time.secs(), launch_time.subsec_nanos())?;

    Some(VmInstance {
        id: instance.instance_id()?.to_string(),
        name: tags.get("Name")?.to_string(),
        label: tags.get("label").map(|l| l.to_string()),
        state,
        launch_time,
    })
}

fn tag(key: &str, value: &str) -> Tag {
    Tag::builder().key(key).value(value).build()
}

fn tag_filter(key: &str, value: &str) -> Filter {
    Filter::builder()
        .name(format!("tag:{key}"))
        .values(value)
        .build()
}
