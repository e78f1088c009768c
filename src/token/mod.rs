//! HTTP client for the backend that issues room access tokens.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::BackendConfig;

/// Room the backend puts every caller into when it does not say otherwise.
pub const DEFAULT_ROOM_NAME: &str = "jarvis-room";

/// Everything needed to join a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDetails {
    pub token: String,
    pub url: String,
    #[serde(default = "default_room_name")]
    pub room: String,
}

fn default_room_name() -> String {
    DEFAULT_ROOM_NAME.to_string()
}

impl ConnectionDetails {
    /// Token prefix that is safe to print.
    pub fn token_preview(&self) -> String {
        let preview: String = self.token.chars().take(20).collect();
        if preview.len() < self.token.len() {
            format!("{preview}...")
        } else {
            preview
        }
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<ConnectionDetails>;
}

pub struct TokenClient {
    client: reqwest::Client,
    endpoint: String,
}

impl TokenClient {
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().context("Failed to build HTTP client")?,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(
            &config.token_url,
            config.token_timeout_seconds.map(Duration::from_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TokenSource for TokenClient {
    async fn fetch(&self) -> Result<ConnectionDetails> {
        info!("Fetching token from {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!("Token endpoint replied {}: {}", status, body);
            bail!("Failed to get token: {}", status.as_u16());
        }

        let details: ConnectionDetails =
            serde_json::from_str(&body).context("Failed to parse token response")?;

        info!(
            "Token received, connecting to: {} Room: {}",
            details.url, details.room
        );
        Ok(details)
    }
}
