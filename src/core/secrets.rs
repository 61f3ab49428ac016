// src/core/secrets.rs

//! Fetches the master credentials from the secret store at start-up.

use crate::config::SecretSource;
use crate::core::errors::ScaleError;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Credential document stored as one JSON secret.
#[derive(Debug, Clone, Deserialize)]
pub struct MasterCredentials {
    /// Public base URL of the master, also handed to agents.
    pub master_url: Url,
    /// Private (tunneled) base URL agents use from inside the network.
    pub master_private_url: String,
    pub username: String,
    pub api_token: String,
}

impl MasterCredentials {
    /// Reads and decodes the secret. Any failure here fails the pass before
    /// external state is touched.
    pub async fn fetch(source: &SecretSource) -> Result<Self, ScaleError> {
        let config = aws_config::from_env()
            .region(aws_sdk_secretsmanager::config::Region::new(
                source.region.clone(),
            ))
            .endpoint_url(&source.endpoint_url)
            .load()
            .await;
        let client = aws_sdk_secretsmanager::Client::new(&config);

        let response = client
            .get_secret_value()
            .secret_id(&source.name)
            .send()
            .await
            .map_err(|e| {
                ScaleError::Secrets(format!("Could not read secret '{}': {e}", source.name))
            })?;

        let raw = response
            .secret_string()
            .ok_or_else(|| ScaleError::Secrets(format!("Secret '{}' has no string payload", source.name)))?;

        let credentials: MasterCredentials = serde_json::from_str(raw)
            .map_err(|e| ScaleError::Secrets(format!("Malformed secret '{}': {e}", source.name)))?;

        debug!("Loaded master credentials for {}", credentials.master_url);
        Ok(credentials)
    }
}
