//! HTTP client for the control API of a running instance.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::session::SessionSnapshot;

pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    lines: Vec<String>,
}

impl ServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn local(port: u16) -> Self {
        Self::new(&format!("http://127.0.0.1:{port}"))
    }

    /// POSTs a control command (`toggle`, `connect`, `disconnect`).
    pub async fn command(&self, name: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, name);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to reach voice-console. Is it running?")?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("{} failed ({}): {}", name, status, body));
        }

        serde_json::from_str(&body).context("Failed to parse command response")
    }

    pub async fn status(&self) -> Result<SessionSnapshot> {
        let url = format!("{}/status", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach voice-console. Is it running?")?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Failed to get status ({}): {}",
                status,
                body
            ));
        }

        serde_json::from_str(&body).context("Failed to parse status response")
    }

    pub async fn transcript(&self) -> Result<Vec<String>> {
        let url = format!("{}/transcript", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach voice-console. Is it running?")?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Failed to get transcript ({}): {}",
                status,
                body
            ));
        }

        let result: TranscriptResponse =
            serde_json::from_str(&body).context("Failed to parse transcript response")?;

        Ok(result.lines)
    }
}
