//! Push messaging collaborator seam.
//!
//! The provider SDK (token issuance, token deletion, foreground message
//! delivery) is an external dependency. The manager only sees it through
//! [`MessagingClient`], built once by the embedder and injected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::payload::PushMessage;

/// Opaque per-installation credential issued by the push provider.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushToken(String);

impl PushToken {
    /// Wrap a provider-issued token string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The full token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PushToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PushToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for PushToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Truncate for display; tokens end up in logs
        match self.0.get(..12) {
            Some(prefix) if self.0.len() > 12 => write!(f, "{prefix}..."),
            _ => write!(f, "{}", self.0),
        }
    }
}

impl std::fmt::Debug for PushToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PushToken({self})")
    }
}

/// Client for the push provider's messaging API.
#[async_trait]
pub trait MessagingClient: Send + Sync + std::fmt::Debug {
    /// Request a token for this installation, scoped by the VAPID key.
    async fn get_token(&self, vapid_key: &str) -> anyhow::Result<PushToken>;

    /// Invalidate the current token with the provider.
    async fn delete_token(&self) -> anyhow::Result<()>;

    /// Start receiving foreground messages.
    ///
    /// Called at most once per manager; the returned receiver yields every
    /// message delivered while the page has focus.
    async fn on_message(&self) -> anyhow::Result<mpsc::UnboundedReceiver<PushMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display_truncates() {
        let token = PushToken::new("fMEQ1234567890abcdefghijklmnop");
        assert_eq!(token.to_string(), "fMEQ12345678...");
        assert_eq!(token.as_str(), "fMEQ1234567890abcdefghijklmnop");
    }

    #[test]
    fn test_short_token_display() {
        assert_eq!(PushToken::from("T1").to_string(), "T1");
        assert_eq!(format!("{:?}", PushToken::from("T1")), "PushToken(T1)");
    }

    #[test]
    fn test_token_serializes_as_plain_string() {
        let json = serde_json::to_string(&PushToken::from("T2")).unwrap();
        assert_eq!(json, "\"T2\"");
    }
}
