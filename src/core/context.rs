// src/core/context.rs

//! Per-pass wiring of configuration, credentials, and clients.
//!
//! Everything a pass needs is constructed once here and passed down by
//! reference; there are no module-level singletons to reset between tests or
//! invocations.

use crate::config::Settings;
use crate::core::errors::ScaleError;
use crate::core::master::MasterClient;
use crate::core::provider::FleetClient;
use crate::core::secrets::MasterCredentials;

/// The assembled collaborators of one reconciliation pass.
pub struct Context {
    pub settings: Settings,
    pub credentials: MasterCredentials,
    pub master: MasterClient,
    pub fleet: FleetClient,
}

impl Context {
    /// Fetches credentials and connects both clients. Fails before any
    /// mutation if the secret store or the configuration is unusable.
    pub async fn initialize(settings: Settings) -> Result<Self, ScaleError> {
        let credentials = MasterCredentials::fetch(&settings.secret).await?;
        let master = MasterClient::connect(&credentials, settings.master_request_timeout)?;
        let fleet = FleetClient::connect().await;
        Ok(Self {
            settings,
            credentials,
            master,
            fleet,
        })
    }
}
