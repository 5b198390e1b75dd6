//! Application-wide constants for HackPortal push delivery.
//!
//! Values shared by the foreground registration flow and the background
//! delivery worker. Both execution contexts must agree on these, so they
//! live here rather than in either module.

use std::time::Duration;

// ============================================================================
// Notifications
// ============================================================================

/// Title shown on every announcement notification.
pub const NOTIFICATION_TITLE: &str = "HackPortal Announcement";

/// Icon used by the foreground listener (relative to the site root).
pub const FOREGROUND_ICON: &str = "icons/icon-128x128.png";

// ============================================================================
// Endpoints
// ============================================================================

/// Path of the background worker script on the site.
pub const WORKER_SCRIPT_PATH: &str = "/firebase-messaging-sw.js";

/// Push provider send endpoint used for the dry-run delivery probe.
pub const FCM_SEND_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Backend endpoint that stores push tokens.
pub const TOKENS_PATH: &str = "/api/tokens";

/// Backend endpoint listing organizing team members.
pub const MEMBERS_PATH: &str = "/api/members";

/// Backend endpoint listing answered FAQ questions.
pub const FAQ_PATH: &str = "/api/questions/faq";

/// Default site origin for local development.
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

// ============================================================================
// Probe
// ============================================================================

/// Announcement text carried by the dry-run probe.
pub const PROBE_ANNOUNCEMENT: &str = "Here goes another one";

/// Time field carried by the dry-run probe.
pub const PROBE_TIME: &str = "test data goes here";

// ============================================================================
// Timeouts
// ============================================================================

/// HTTP client request timeout for backend and provider calls.
///
/// A hung probe or token POST would otherwise stall the registration
/// actor, and every queued request behind it, indefinitely.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
