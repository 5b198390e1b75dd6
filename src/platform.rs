//! Platform seams: worker registration and notification permission.
//!
//! The background worker runs in its own execution context and cannot see
//! the page's runtime configuration. The only thing that crosses that
//! boundary at registration time is the worker script URL, so provider
//! configuration is serialized onto its query string by [`WorkerScript`].

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::constants::WORKER_SCRIPT_PATH;
use crate::payload::NotificationDescriptor;

/// Query parameter carrying the background notification icon.
const ICON_URL_KEY: &str = "iconUrl";

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// The user has not been asked yet (or dismissed the prompt).
    Default,
    /// Notifications are allowed.
    Granted,
    /// Notifications are blocked.
    Denied,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// Access to the platform's notification permission.
#[async_trait]
pub trait PermissionGate: Send + Sync + std::fmt::Debug {
    /// Current permission, without prompting.
    fn current(&self) -> Permission;

    /// Prompt the user and return the resulting permission.
    async fn request(&self) -> Result<Permission>;
}

/// A registered background worker.
#[async_trait]
pub trait WorkerRegistration: Send + Sync + std::fmt::Debug {
    /// Ask the platform to display a notification through this worker.
    async fn show_notification(&self, descriptor: &NotificationDescriptor) -> Result<()>;
}

/// The platform's worker registry.
#[async_trait]
pub trait WorkerContainer: Send + Sync + std::fmt::Debug {
    /// Whether this environment can host background workers at all.
    fn is_supported(&self) -> bool;

    /// Register the worker script, returning a handle owned by the caller.
    async fn register(&self, script: &WorkerScript) -> Result<Arc<dyn WorkerRegistration>>;
}

/// URL of the background worker script, with configuration in its query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerScript {
    url: Url,
}

impl WorkerScript {
    /// Build the script URL for `site_url`.
    pub fn new(site_url: &str, provider: &ProviderConfig, icon_url: &str) -> Result<Self> {
        let mut url = Url::parse(site_url)
            .with_context(|| format!("Invalid site URL: {site_url}"))?
            .join(WORKER_SCRIPT_PATH)
            .context("Failed to build worker script URL")?;
        url.query_pairs_mut()
            .extend_pairs(provider.query_pairs())
            .append_pair(ICON_URL_KEY, icon_url);
        Ok(Self { url })
    }

    /// Parse a script URL handed to the worker at startup.
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid worker script URL: {url}"))?;
        Ok(Self { url })
    }

    /// The full script URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Provider configuration decoded from the query string.
    ///
    /// Fields absent from the query are left empty.
    pub fn provider(&self) -> ProviderConfig {
        let mut provider = ProviderConfig::default();
        for (key, value) in self.url.query_pairs() {
            provider.set_by_key(&key, value.into_owned());
        }
        provider
    }

    /// Icon URL from the query string, if present and non-empty.
    pub fn icon_url(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, value)| key == ICON_URL_KEY && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    }
}

impl std::fmt::Display for WorkerScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig {
            api_key: "AIza-test".to_string(),
            auth_domain: "hackportal.firebaseapp.com".to_string(),
            project_id: "hackportal".to_string(),
            storage_bucket: "hackportal.appspot.com".to_string(),
            messaging_sender_id: "529".to_string(),
            app_id: "1:529:web:fa23".to_string(),
            measurement_id: "G-TEST".to_string(),
        }
    }

    #[test]
    fn test_script_url_carries_config() {
        let script = WorkerScript::new(
            "https://hack.example.com",
            &provider(),
            "https://cdn.example.com/icon 128.png",
        )
        .unwrap();

        let url = script.to_string();
        assert!(url.starts_with("https://hack.example.com/firebase-messaging-sw.js?apiKey=AIza-test&"));
        assert!(url.contains("appId=1%3A529%3Aweb%3Afa23"));
        assert!(url.ends_with("iconUrl=https%3A%2F%2Fcdn.example.com%2Ficon+128.png"));
    }

    #[test]
    fn test_script_url_decodes_back() {
        let script =
            WorkerScript::new("http://localhost:3000/", &provider(), "http://localhost:3000/i.png")
                .unwrap();
        let parsed = WorkerScript::parse(&script.to_string()).unwrap();

        assert_eq!(parsed.provider(), provider());
        assert_eq!(parsed.icon_url().as_deref(), Some("http://localhost:3000/i.png"));
        assert_eq!(parsed.url().path(), "/firebase-messaging-sw.js");
    }

    #[test]
    fn test_missing_query_leaves_fields_empty() {
        let script = WorkerScript::parse("http://localhost:3000/firebase-messaging-sw.js").unwrap();
        assert_eq!(script.provider(), ProviderConfig::default());
        assert!(script.icon_url().is_none());
    }

    #[test]
    fn test_rejects_relative_site_url() {
        assert!(WorkerScript::new("not a url", &provider(), "i.png").is_err());
    }

    #[test]
    fn test_permission_serde() {
        assert_eq!(serde_json::to_string(&Permission::Granted).unwrap(), "\"granted\"");
        let parsed: Permission = serde_json::from_str("\"denied\"").unwrap();
        assert_eq!(parsed, Permission::Denied);
        assert_eq!(Permission::Default.to_string(), "default");
    }
}
