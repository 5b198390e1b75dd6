//! Push payloads and the notification descriptors built from them.
//!
//! Both the foreground listener and the background worker receive the same
//! message shape: `data.notification` holds a JSON-encoded string that
//! decodes to `{ "announcement": ..., "baseUrl": ... }`. This module owns
//! that decoding and the two descriptor flavors built from the result.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{FOREGROUND_ICON, NOTIFICATION_TITLE};

/// Errors decoding an inbound push message.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The message carried no `notification` data field.
    #[error("push message has no `notification` data field")]
    MissingNotification,
    /// The `notification` field was not announcement JSON.
    #[error("notification data is not a valid announcement: {0}")]
    InvalidAnnouncement(#[from] serde_json::Error),
}

/// An inbound message as delivered by the push provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Provider data map; values are always strings.
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl PushMessage {
    /// Build a message whose `notification` field encodes an announcement.
    pub fn announcement(announcement: &str, base_url: &str) -> Self {
        let encoded = serde_json::json!({
            "announcement": announcement,
            "baseUrl": base_url,
        })
        .to_string();
        Self {
            data: HashMap::from([("notification".to_string(), encoded)]),
        }
    }
}

/// Decoded announcement carried by a push message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Announcement text shown as the notification body.
    pub announcement: String,
    /// Page the notification opens when clicked.
    #[serde(rename = "baseUrl")]
    pub base_url: String,
}

impl Announcement {
    /// Decode the announcement from a push message.
    pub fn from_message(message: &PushMessage) -> Result<Self, PayloadError> {
        let raw = message
            .data
            .get("notification")
            .ok_or(PayloadError::MissingNotification)?;
        Ok(serde_json::from_str(raw)?)
    }
}

/// Auxiliary data attached to a notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Target URL opened on click.
    pub url: String,
}

/// Structured notification handed to the OS/browser display API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDescriptor {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Icon reference.
    pub icon: String,
    /// De-duplication tag; later notifications with the same tag replace earlier ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Click data.
    pub data: NotificationData,
}

impl NotificationDescriptor {
    /// Descriptor for a message received while the page is focused.
    ///
    /// Tagged with the receive time so every announcement gets its own
    /// OS notification instead of replacing the previous one.
    pub fn foreground(announcement: &Announcement, now: DateTime<Utc>) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: announcement.announcement.clone(),
            icon: FOREGROUND_ICON.to_string(),
            tag: Some(utc_string(now)),
            data: NotificationData {
                url: announcement.base_url.clone(),
            },
        }
    }

    /// Descriptor for a message received by the background worker.
    pub fn background(announcement: &Announcement, icon_url: &str) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: announcement.announcement.clone(),
            icon: icon_url.to_string(),
            tag: None,
            data: NotificationData {
                url: announcement.base_url.clone(),
            },
        }
    }
}

/// RFC 1123 UTC timestamp, e.g. `Sun, 18 Oct 2026 12:00:00 GMT`.
pub fn utc_string(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(raw: &str) -> PushMessage {
        PushMessage {
            data: HashMap::from([("notification".to_string(), raw.to_string())]),
        }
    }

    #[test]
    fn test_decodes_announcement_and_base_url() {
        let decoded =
            Announcement::from_message(&message(r#"{"announcement":"A","baseUrl":"U"}"#)).unwrap();
        assert_eq!(decoded.announcement, "A");
        assert_eq!(decoded.base_url, "U");
    }

    #[test]
    fn test_missing_notification_field() {
        let err = Announcement::from_message(&PushMessage::default()).unwrap_err();
        assert!(matches!(err, PayloadError::MissingNotification));
    }

    #[test]
    fn test_invalid_notification_json() {
        let err = Announcement::from_message(&message("not json")).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidAnnouncement(_)));
    }

    #[test]
    fn test_foreground_descriptor() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let announcement = Announcement {
            announcement: "A".to_string(),
            base_url: "U".to_string(),
        };
        let descriptor = NotificationDescriptor::foreground(&announcement, now);

        assert_eq!(descriptor.title, "HackPortal Announcement");
        assert_eq!(descriptor.body, "A");
        assert_eq!(descriptor.icon, "icons/icon-128x128.png");
        assert_eq!(descriptor.tag.as_deref(), Some("Sun, 18 Oct 2026 12:00:00 GMT"));
        assert_eq!(descriptor.data.url, "U");
    }

    #[test]
    fn test_background_descriptor_has_no_tag() {
        let announcement = Announcement {
            announcement: "Lunch is served".to_string(),
            base_url: "https://hack.example.com/dashboard".to_string(),
        };
        let descriptor =
            NotificationDescriptor::background(&announcement, "https://cdn.example.com/icon.png");

        assert_eq!(descriptor.icon, "https://cdn.example.com/icon.png");
        assert!(descriptor.tag.is_none());

        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("tag").is_none());
        assert_eq!(json["data"]["url"], "https://hack.example.com/dashboard");
    }

    #[test]
    fn test_announcement_builder_round_trips() {
        let msg = PushMessage::announcement("Judging starts", "https://hack.example.com");
        let decoded = Announcement::from_message(&msg).unwrap();
        assert_eq!(decoded.announcement, "Judging starts");
    }
}
