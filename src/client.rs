//! Client for a running control service, used by `tripwire launch`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, info};

use crate::lifecycle::LifecycleState;

#[derive(Debug, Clone, Deserialize)]
pub struct ControlReply {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusReply {
    pub status: String,
    pub state: LifecycleState,
}

#[derive(Debug, Clone)]
pub struct ControlClient {
    base_url: String,
    http: reqwest::Client,
}

impl ControlClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn status(&self) -> Result<StatusReply> {
        let url = format!("{}/status", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        resp.error_for_status()
            .context("status request rejected")?
            .json()
            .await
            .context("malformed status reply")
    }

    pub async fn start(&self) -> Result<ControlReply> {
        self.command("start").await
    }

    pub async fn ready(&self) -> Result<ControlReply> {
        self.command("ready").await
    }

    pub async fn stop(&self) -> Result<ControlReply> {
        self.command("stop").await
    }

    /// POST a control route. Non-2xx replies are returned as errors carrying
    /// the server's message.
    async fn command(&self, route: &str) -> Result<ControlReply> {
        let url = format!("{}/{route}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;
        let code = resp.status();
        let reply: ControlReply = resp
            .json()
            .await
            .with_context(|| format!("malformed reply from /{route}"))?;
        if !code.is_success() {
            bail!("/{route} returned {code}: {}", reply.message);
        }
        Ok(reply)
    }

    /// Poll `/status` until the service answers. `alive` is checked before
    /// each attempt so a crashed server is noticed without waiting out every
    /// retry.
    pub async fn wait_until_up<F>(&self, attempts: u32, delay: Duration, mut alive: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        for attempt in 1..=attempts {
            if !alive() {
                bail!("server process exited before it came up");
            }
            match self.status().await {
                Ok(_) => {
                    info!("server is up");
                    return Ok(());
                }
                Err(e) => debug!(attempt, error = %e, "server not up yet"),
            }
            tokio::time::sleep(delay).await;
        }
        bail!("server did not come up after {attempts} attempts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client = ControlClient::new("http://127.0.0.1:5000/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
    }

    #[tokio::test]
    async fn dead_process_aborts_the_wait() {
        let client = ControlClient::new("http://127.0.0.1:9").unwrap();
        let err = client
            .wait_until_up(10, Duration::from_millis(1), || false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited"));
    }

    #[test]
    fn status_reply_parses() {
        let reply: StatusReply =
            serde_json::from_str(r#"{"status":"running","state":"monitoring"}"#).unwrap();
        assert_eq!(reply.status, "running");
        assert_eq!(reply.state, LifecycleState::Monitoring);
    }
}
