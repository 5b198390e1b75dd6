//! Outbound HTTP calls made during registration.
//!
//! Two endpoints are involved:
//!
//! - the provider send endpoint, hit with a dry-run message to check that a
//!   freshly issued token is actually deliverable
//! - the HackPortal backend's `/api/tokens`, which stores the token so
//!   announcements can be fanned out to this installation

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::constants::{HTTP_REQUEST_TIMEOUT, PROBE_ANNOUNCEMENT, PROBE_TIME, TOKENS_PATH};
use crate::messaging::PushToken;

/// Outcome of a dry-run delivery probe.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Error reported for the first result entry, if any.
    pub error: Option<String>,
}

impl ProbeReport {
    /// Whether the provider considers the token deliverable.
    pub fn is_deliverable(&self) -> bool {
        self.error.is_none()
    }
}

/// Backend operations used by the registration manager.
#[async_trait]
pub trait PushBackend: Send + Sync + std::fmt::Debug {
    /// Send a dry-run message addressed to `token` and report the result.
    async fn probe(&self, token: &PushToken) -> Result<ProbeReport>;

    /// Store `token` with the HackPortal backend.
    async fn register_token(&self, token: &PushToken) -> Result<()>;
}

#[derive(Serialize)]
struct ProbeRequest<'a> {
    to: &'a str,
    data: ProbeData,
    dry_run: bool,
}

#[derive(Serialize)]
struct ProbeData {
    notification: ProbeNotification,
}

#[derive(Serialize)]
struct ProbeNotification {
    announcement: &'static str,
    time: &'static str,
}

#[derive(Deserialize)]
struct ProbeResponse {
    #[serde(default)]
    results: Vec<ProbeResult>,
}

#[derive(Deserialize)]
struct ProbeResult {
    #[serde(default)]
    error: Option<String>,
}

/// [`PushBackend`] over HTTP.
///
/// The caller should reuse one instance for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    send_endpoint: String,
    server_token: String,
    site_url: String,
    api_token: Option<String>,
}

impl HttpBackend {
    /// Creates a backend client.
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client for making requests
    /// * `send_endpoint` - Provider send endpoint for the probe
    /// * `server_token` - Cloud messaging server token (`Authorization: key=...`)
    /// * `site_url` - Origin of the HackPortal backend
    pub fn new(
        client: reqwest::Client,
        send_endpoint: String,
        server_token: String,
        site_url: String,
    ) -> Self {
        Self {
            client,
            send_endpoint,
            server_token,
            site_url: site_url.trim_end_matches('/').to_string(),
            api_token: None,
        }
    }

    /// Creates a backend from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let backend = Self::new(
            client,
            config.send_endpoint.clone(),
            config.server_token.clone(),
            config.site_url.clone(),
        );
        Ok(if config.api_token.is_empty() {
            backend
        } else {
            backend.with_api_token(config.api_token.clone())
        })
    }

    /// Authenticate `/api/tokens` calls with a bearer session token.
    pub fn with_api_token(mut self, api_token: String) -> Self {
        self.api_token = Some(api_token);
        self
    }
}

#[async_trait]
impl PushBackend for HttpBackend {
    async fn probe(&self, token: &PushToken) -> Result<ProbeReport> {
        let body = ProbeRequest {
            to: token.as_str(),
            data: ProbeData {
                notification: ProbeNotification {
                    announcement: PROBE_ANNOUNCEMENT,
                    time: PROBE_TIME,
                },
            },
            dry_run: true,
        };

        let response = self
            .client
            .post(&self.send_endpoint)
            .header("Authorization", format!("key={}", self.server_token))
            .json(&body)
            .send()
            .await
            .context("Probe request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Probe rejected by provider (HTTP {status}): {text}");
        }

        let parsed: ProbeResponse = response.json().await.context("Invalid probe response")?;
        let first = parsed
            .results
            .into_iter()
            .next()
            .context("Probe response contained no results")?;

        log::debug!("[Push] Probe for {token}: error={:?}", first.error);
        Ok(ProbeReport { error: first.error })
    }

    async fn register_token(&self, token: &PushToken) -> Result<()> {
        let url = format!("{}{}", self.site_url, TOKENS_PATH);
        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "token": token.as_str() }));
        if let Some(api_token) = &self.api_token {
            request = request.bearer_auth(api_token);
        }

        let response = request.send().await.context("Token registration request failed")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to register token: {status} - {text}");
        }

        log::info!("[Push] Registered token {token} with backend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_request_shape() {
        let body = ProbeRequest {
            to: "T1",
            data: ProbeData {
                notification: ProbeNotification {
                    announcement: PROBE_ANNOUNCEMENT,
                    time: PROBE_TIME,
                },
            },
            dry_run: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "to": "T1",
                "data": {
                    "notification": {
                        "announcement": "Here goes another one",
                        "time": "test data goes here",
                    }
                },
                "dry_run": true,
            })
        );
    }

    #[test]
    fn test_probe_response_without_error() {
        let parsed: ProbeResponse = serde_json::from_str(r#"{"results":[{}]}"#).unwrap();
        assert!(parsed.results[0].error.is_none());
    }

    #[test]
    fn test_report_deliverable() {
        assert!(ProbeReport::default().is_deliverable());
        let failed = ProbeReport {
            error: Some("InvalidRegistration".to_string()),
        };
        assert!(!failed.is_deliverable());
    }

    #[test]
    fn test_site_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new(
            reqwest::Client::new(),
            "https://send.example.com".to_string(),
            "srv".to_string(),
            "https://hack.example.com/".to_string(),
        );
        assert_eq!(backend.site_url, "https://hack.example.com");
        assert!(backend.api_token.is_none());
    }
}
