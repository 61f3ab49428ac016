// src/core/master/client.rs

//! HTTP client for the master's executor and queue surfaces.
//!
//! Two quirks of the upstream master shape this client: it answers a number
//! of legitimate requests with a 302 (which is a terminal success here —
//! following the redirect is expensive and pointless), and its node-creation
//! endpoint is not thread-safe, which is why the reconciler drives creation
//! through a smaller pool than everything else.

use crate::config::SlotSettings;
use crate::core::errors::ScaleError;
use crate::core::master::slot;
use crate::core::model::{Executor, QueueItem};
use crate::core::secrets::MasterCredentials;
use reqwest::{Response, StatusCode, redirect};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const ARCHITECTURE_MONITOR: &str = "hudson.node_monitors.ArchitectureMonitor";

/// Typed wrapper over the master HTTP API. Cheap to clone; the underlying
/// connection pool is shared.
#[derive(Clone)]
pub struct MasterClient {
    http: reqwest::Client,
    base: Url,
    username: String,
    api_token: String,
}

#[derive(Deserialize)]
struct ComputerListWire {
    computer: Vec<ComputerWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputerWire {
    display_name: String,
    #[serde(default)]
    assigned_labels: Vec<AssignedLabelWire>,
    #[serde(default)]
    offline: bool,
    #[serde(default)]
    temporarily_offline: bool,
    #[serde(default)]
    idle: bool,
    #[serde(default)]
    num_executors: u32,
    #[serde(default)]
    offline_cause: Option<OfflineCauseWire>,
    #[serde(default)]
    offline_cause_reason: String,
    #[serde(default)]
    monitor_data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct AssignedLabelWire {
    name: String,
}

#[derive(Deserialize)]
struct OfflineCauseWire {
    #[serde(rename = "_class")]
    class: Option<String>,
}

#[derive(Deserialize)]
struct QueueWire {
    items: Vec<QueueItemWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueItemWire {
    id: u64,
    #[serde(default)]
    why: Option<String>,
    in_queue_since: i64,
}

impl From<ComputerWire> for Executor {
    fn from(wire: ComputerWire) -> Self {
        // The architecture monitor is only a string once the agent has
        // reported in; before that the master serializes null or an empty
        // object there.
        let architecture = match wire.monitor_data.get(ARCHITECTURE_MONITOR) {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            _ => None,
        };
        Executor {
            display_name: wire.display_name,
            assigned_labels: wire.assigned_labels.into_iter().map(|l| l.name).collect(),
            offline: wire.offline,
            temporarily_offline: wire.temporarily_offline,
            idle: wire.idle,
            offline_cause_class: wire.offline_cause.and_then(|c| c.class),
            offline_cause_reason: wire.offline_cause_reason,
            architecture,
            num_executors: wire.num_executors,
        }
    }
}

impl MasterClient {
    /// Builds a client with the hard per-request timeout. Redirects are
    /// never followed.
    pub fn connect(
        credentials: &MasterCredentials,
        timeout: Duration,
    ) -> Result<Self, ScaleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        // Joining relative endpoints silently drops the last path segment
        // unless the base ends with a slash.
        let mut base = credentials.master_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(Self {
            http,
            base,
            username: credentials.username.clone(),
            api_token: credentials.api_token.clone(),
        })
    }

    /// Lists every executor registered with the master, including ones that
    /// have never connected.
    pub async fn list_executors(&self) -> Result<Vec<Executor>, ScaleError> {
        let url = self.endpoint("computer/api/json?depth=1")?;
        let response = self.get(url).await?;
        let wire: ComputerListWire = response.json().await?;
        Ok(wire.computer.into_iter().map(Executor::from).collect())
    }

    /// Lists the build queue.
    pub async fn list_queue(&self) -> Result<Vec<QueueItem>, ScaleError> {
        let url = self.endpoint("queue/api/json")?;
        let response = self.get(url).await?;
        let wire: QueueWire = response.json().await?;
        Ok(wire
            .items
            .into_iter()
            .map(|item| QueueItem {
                id: item.id,
                why: item.why.unwrap_or_default(),
                in_queue_since_ms: item.in_queue_since,
            })
            .collect())
    }

    /// Registers a new empty slot. A name collision surfaces as
    /// [`ScaleError::SlotExists`].
    pub async fn create_slot(
        &self,
        name: &str,
        label: &str,
        settings: &SlotSettings,
        num_executors: u32,
        tunnel: &str,
    ) -> Result<(), ScaleError> {
        let definition = slot::definition(name, label, settings, num_executors, tunnel);
        let url = self.endpoint("computer/doCreateItem")?;
        let request = self
            .http
            .post(url.clone())
            .basic_auth(&self.username, Some(&self.api_token))
            .query(&[
                ("name", name),
                ("type", slot::SLOT_DESCRIPTOR),
            ])
            .form(&[("json", definition.to_string())]);

        let response = self.send(request, "POST", url.as_str()).await?;
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if body.contains("already exists") {
                return Err(ScaleError::SlotExists(name.to_string()));
            }
            return Err(ScaleError::MasterStatus {
                status: 400,
                url: url.to_string(),
            });
        }
        Self::confirm_status(response)?;
        Ok(())
    }

    /// Marks an executor as temporarily offline with the given reason. A
    /// no-op when it is already marked: the underlying endpoint is a toggle,
    /// so the guard is what makes this idempotent.
    pub async fn set_offline(&self, name: &str, reason: &str) -> Result<(), ScaleError> {
        let current = self.poll(name).await?;
        if current.temporarily_offline {
            debug!("Executor {} is already marked offline", name);
            return Ok(());
        }
        self.toggle_offline(name, Some(reason)).await
    }

    /// Clears a temporary offline mark. A no-op when the executor is not
    /// marked.
    pub async fn set_online(&self, name: &str) -> Result<(), ScaleError> {
        let current = self.poll(name).await?;
        if !current.temporarily_offline {
            debug!("Executor {} is not marked offline", name);
            return Ok(());
        }
        self.toggle_offline(name, None).await
    }

    /// Refreshes a single executor's state.
    pub async fn poll(&self, name: &str) -> Result<Executor, ScaleError> {
        let url = self.computer_endpoint(name, "api/json")?;
        let request = self
            .http
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.api_token));
        let response = self.send(request, "GET", url.as_str()).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ScaleError::ExecutorNotFound(name.to_string()));
        }
        let response = Self::confirm_status(response)?;
        let wire: ComputerWire = response.json().await?;
        Ok(Executor::from(wire))
    }

    /// Deletes a slot. Deleting a slot that is already gone succeeds: the
    /// master's backend is eventually consistent and occasionally lists
    /// slots it has already dropped.
    pub async fn delete_slot(&self, name: &str) -> Result<(), ScaleError> {
        let url = self.computer_endpoint(name, "doDelete")?;
        let request = self
            .http
            .post(url.clone())
            .basic_auth(&self.username, Some(&self.api_token));
        let response = self.send(request, "POST", url.as_str()).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Slot {} has been deleted already", name);
            return Ok(());
        }
        Self::confirm_status(response)?;
        info!("Deleted slot {}", name);
        Ok(())
    }

    async fn toggle_offline(&self, name: &str, reason: Option<&str>) -> Result<(), ScaleError> {
        let url = self.computer_endpoint(name, "toggleOffline")?;
        let mut request = self
            .http
            .post(url.clone())
            .basic_auth(&self.username, Some(&self.api_token));
        if let Some(reason) = reason {
            request = request.form(&[("offlineMessage", reason)]);
        }
        let response = self.send(request, "POST", url.as_str()).await?;
        Self::confirm_status(response)?;
        Ok(())
    }

    async fn get(&self, url: Url) -> Result<Response, ScaleError> {
        let request = self
            .http
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.api_token));
        let response = self.send(request, "GET", url.as_str()).await?;
        Self::confirm_status(response)
    }

    /// Sends a request with duration logging, retrying once on transport
    /// failures. HTTP error statuses are never retried; they reach the
    /// caller as responses.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        verb: &str,
        url: &str,
    ) -> Result<Response, ScaleError> {
        let started = Instant::now();
        let retry = request.try_clone();

        let result = match request.send().await {
            Ok(response) => Ok(response),
            Err(first) => match retry {
                Some(second) => {
                    warn!("{} {} failed in transit ({}), retrying once", verb, url, first);
                    second.send().await.map_err(ScaleError::from)
                }
                None => Err(ScaleError::from(first)),
            },
        };

        debug!(
            "{} {} took {:.3} ms",
            verb,
            url,
            started.elapsed().as_secs_f64() * 1000.0
        );
        result
    }

    /// 302 is a terminal success: the master redirects after most POSTs and
    /// following it would double the request volume for nothing.
    fn confirm_status(response: Response) -> Result<Response, ScaleError> {
        let status = response.status();
        if status.is_success() || status == StatusCode::FOUND {
            Ok(response)
        } else {
            Err(ScaleError::MasterStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ScaleError> {
        Ok(self.base.join(path)?)
    }

    fn computer_endpoint(&self, name: &str, action: &str) -> Result<Url, ScaleError> {
        let encoded = urlencoding::encode(name);
        Ok(self.base.join(&format!("computer/{encoded}/{action}"))?)
    }
}
