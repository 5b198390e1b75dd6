//! Configuration loading and persistence.
//!
//! Handles reading and writing the HackPortal configuration file.
//! Credentials (VAPID key, provider server token, backend session token)
//! are never written to disk; they only come from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::PathBuf};

use crate::constants::{DEFAULT_SITE_URL, FCM_SEND_ENDPOINT, FOREGROUND_ICON};

/// Web configuration of the push provider project.
///
/// Field names match the provider's web config object so the struct can be
/// serialized straight onto the worker script query string.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Browser API key.
    pub api_key: String,
    /// Auth domain of the provider project.
    pub auth_domain: String,
    /// Provider project identifier.
    pub project_id: String,
    /// Storage bucket name.
    pub storage_bucket: String,
    /// Sender ID used by cloud messaging.
    pub messaging_sender_id: String,
    /// Web application identifier.
    pub app_id: String,
    /// Analytics measurement identifier.
    pub measurement_id: String,
}

impl ProviderConfig {
    /// Query parameter names, in the order they are emitted.
    pub const QUERY_KEYS: [&'static str; 7] = [
        "apiKey",
        "authDomain",
        "projectId",
        "storageBucket",
        "messagingSenderId",
        "appId",
        "measurementId",
    ];

    /// Key/value pairs for the worker script query string.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        Self::QUERY_KEYS
            .iter()
            .zip([
                &self.api_key,
                &self.auth_domain,
                &self.project_id,
                &self.storage_bucket,
                &self.messaging_sender_id,
                &self.app_id,
                &self.measurement_id,
            ])
            .map(|(key, value)| (*key, value.as_str()))
            .collect()
    }

    /// Set a field by its query parameter name. Unknown keys are ignored.
    ///
    /// Returns `true` if the key named a provider field.
    pub fn set_by_key(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "apiKey" => &mut self.api_key,
            "authDomain" => &mut self.auth_domain,
            "projectId" => &mut self.project_id,
            "storageBucket" => &mut self.storage_bucket,
            "messagingSenderId" => &mut self.messaging_sender_id,
            "appId" => &mut self.app_id,
            "measurementId" => &mut self.measurement_id,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Fill every empty field from `fallback`, keeping fields already set.
    pub fn fill_missing_from(&mut self, fallback: &ProviderConfig) {
        for (key, value) in fallback.query_pairs() {
            let current = self
                .query_pairs()
                .into_iter()
                .find(|(k, _)| *k == key)
                .map_or("", |(_, v)| v);
            if current.is_empty() && !value.is_empty() {
                self.set_by_key(key, value.to_string());
            }
        }
    }

    /// Whether enough is configured to talk to the provider at all.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.project_id.is_empty() && !self.app_id.is_empty()
    }
}

/// Configuration for the HackPortal push tooling.
///
/// Every field is optional in `config.json`; missing ones take their defaults.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Origin of the HackPortal site (worker script and `/api/*` live here).
    pub site_url: String,
    /// Push provider web configuration.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Icon shown by the background worker's notifications.
    pub icon_url: String,
    /// Provider send endpoint used for the dry-run probe.
    pub send_endpoint: String,
    /// Public VAPID key passed to token requests - NOT serialized to disk.
    #[serde(skip)]
    pub vapid_key: String,
    /// Cloud messaging server token for the probe - NOT serialized to disk.
    #[serde(skip)]
    pub server_token: String,
    /// Backend session token for `/api/tokens` - NOT serialized to disk.
    #[serde(skip)]
    pub api_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            provider: ProviderConfig::default(),
            icon_url: format!("{DEFAULT_SITE_URL}/{FOREGROUND_ICON}"),
            send_endpoint: FCM_SEND_ENDPOINT.to_string(),
            vapid_key: String::new(),
            server_token: String::new(),
            api_token: String::new(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `HACKPORTAL_CONFIG_DIR` env var: explicit override
    /// 2. `HACKPORTAL_ENV=test`: `tmp/hackportal-test` inside the repository
    /// 3. Default: platform config dir joined with `hackportal`
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("HACKPORTAL_CONFIG_DIR") {
            PathBuf::from(dir)
        } else if crate::env::is_test_mode() {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/hackportal-test")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("hackportal")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::load_from_file() {
            Ok(Some(config)) => config,
            Ok(None) => {
                log::debug!("No config file; using defaults");
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring config file: {e:#}");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Option<Self>> {
        let config_path = Self::config_dir()?.join("config.json");
        if !config_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", config_path.display()))?;
        Ok(Some(config))
    }

    fn apply_env_overrides(&mut self) {
        override_from_env("HACKPORTAL_SITE_URL", &mut self.site_url);
        override_from_env("HACKPORTAL_ICON_URL", &mut self.icon_url);
        override_from_env("HACKPORTAL_SEND_ENDPOINT", &mut self.send_endpoint);

        // Credentials only ever come from the environment
        override_from_env("HACKPORTAL_VAPID_KEY", &mut self.vapid_key);
        override_from_env("HACKPORTAL_SERVER_TOKEN", &mut self.server_token);
        override_from_env("HACKPORTAL_API_TOKEN", &mut self.api_token);

        override_from_env("HACKPORTAL_FIREBASE_API_KEY", &mut self.provider.api_key);
        override_from_env("HACKPORTAL_FIREBASE_AUTH_DOMAIN", &mut self.provider.auth_domain);
        override_from_env("HACKPORTAL_FIREBASE_PROJECT_ID", &mut self.provider.project_id);
        override_from_env(
            "HACKPORTAL_FIREBASE_STORAGE_BUCKET",
            &mut self.provider.storage_bucket,
        );
        override_from_env(
            "HACKPORTAL_FIREBASE_MESSAGING_SENDER_ID",
            &mut self.provider.messaging_sender_id,
        );
        override_from_env("HACKPORTAL_FIREBASE_APP_ID", &mut self.provider.app_id);
        override_from_env(
            "HACKPORTAL_FIREBASE_MEASUREMENT_ID",
            &mut self.provider.measurement_id,
        );
    }

    /// Persists the current configuration to disk.
    /// Note: credentials are NOT saved.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Whether the dry-run probe can be sent.
    pub fn has_server_token(&self) -> bool {
        !self.server_token.is_empty()
    }
}

fn override_from_env(var: &str, slot: &mut String) {
    if let Ok(value) = std::env::var(var) {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site_url, "http://localhost:3000");
        assert_eq!(config.send_endpoint, "https://fcm.googleapis.com/fcm/send");
        assert_eq!(config.icon_url, "http://localhost:3000/icons/icon-128x128.png");
        assert!(!config.has_server_token());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"site_url":"https://hack.example.com"}"#).unwrap();
        assert_eq!(config.site_url, "https://hack.example.com");
        assert_eq!(config.send_endpoint, "https://fcm.googleapis.com/fcm/send");
        assert_eq!(config.icon_url, "http://localhost:3000/icons/icon-128x128.png");
    }

    #[test]
    fn test_config_serialization_excludes_credentials() {
        let mut config = Config::default();
        config.vapid_key = "vapid_secret".to_string();
        config.server_token = "server_secret".to_string();
        config.api_token = "session_secret".to_string();
        let json = serde_json::to_string(&config).unwrap();

        assert!(!json.contains("vapid_secret"));
        assert!(!json.contains("server_secret"));
        assert!(!json.contains("session_secret"));
    }

    #[test]
    fn test_provider_config_uses_camel_case() {
        let provider = ProviderConfig {
            api_key: "key".to_string(),
            messaging_sender_id: "529".to_string(),
            ..ProviderConfig::default()
        };
        let json = serde_json::to_value(&provider).unwrap();
        assert_eq!(json["apiKey"], "key");
        assert_eq!(json["messagingSenderId"], "529");
    }

    #[test]
    fn test_query_pairs_follow_key_order() {
        let provider = ProviderConfig {
            project_id: "hackportal".to_string(),
            ..ProviderConfig::default()
        };
        let pairs = provider.query_pairs();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ProviderConfig::QUERY_KEYS);
        assert_eq!(pairs[2], ("projectId", "hackportal"));
    }

    #[test]
    fn test_set_by_key_ignores_unknown_keys() {
        let mut provider = ProviderConfig::default();
        assert!(provider.set_by_key("appId", "1:web".to_string()));
        assert!(!provider.set_by_key("iconUrl", "x".to_string()));
        assert_eq!(provider.app_id, "1:web");
    }

    #[test]
    fn test_fill_missing_keeps_existing_fields() {
        let mut provider = ProviderConfig {
            api_key: "from-query".to_string(),
            ..ProviderConfig::default()
        };
        let fallback = ProviderConfig {
            api_key: "from-file".to_string(),
            project_id: "from-file-project".to_string(),
            ..ProviderConfig::default()
        };
        provider.fill_missing_from(&fallback);
        assert_eq!(provider.api_key, "from-query");
        assert_eq!(provider.project_id, "from-file-project");
    }

    #[test]
    fn test_is_complete() {
        let mut provider = ProviderConfig::default();
        assert!(!provider.is_complete());
        provider.api_key = "k".to_string();
        provider.project_id = "p".to_string();
        provider.app_id = "a".to_string();
        assert!(provider.is_complete());
    }
}
