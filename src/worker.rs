//! Background delivery worker.
//!
//! Runs in its own process, separate from the registration manager, and
//! shares no state with it. It receives push messages while no page is
//! focused and turns them into notifications, then routes notification
//! clicks back to the site.
//!
//! # Event Stream
//!
//! Events arrive as newline-delimited JSON, tagged on `type`:
//!
//! ```text
//! {"type":"push","data":{"notification":"{\"announcement\":\"Lunch\",\"baseUrl\":\"https://...\"}"}}
//! {"type":"notification_click","notification":{"title":"...","body":"...","icon":"...","data":{"url":"https://..."}}}
//! ```
//!
//! # Configuration
//!
//! The worker gets its configuration from the script URL it was registered
//! with. Anything missing from that query falls back to the locally loaded
//! [`Config`]; there is no second embedded copy.
//!
//! The provider credentials are informational here. Messages reach the
//! worker through the event stream already decoded, so the worker never
//! talks to the provider itself; it only reports which project it serves.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::{Config, ProviderConfig};
use crate::notifications::{Notifier, UrlOpener};
use crate::payload::{Announcement, NotificationDescriptor, PushMessage};
use crate::platform::WorkerScript;

/// Configuration the worker runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Provider credentials.
    pub provider: ProviderConfig,
    /// Icon used on every background notification.
    pub icon_url: String,
}

impl WorkerConfig {
    /// Resolve configuration from the registration script URL.
    ///
    /// Query parameters win; empty or missing ones come from `fallback`.
    pub fn from_script(script: Option<&WorkerScript>, fallback: &Config) -> Self {
        let mut provider = script.map(WorkerScript::provider).unwrap_or_default();
        provider.fill_missing_from(&fallback.provider);

        let icon_url = script
            .and_then(WorkerScript::icon_url)
            .unwrap_or_else(|| fallback.icon_url.clone());

        Self { provider, icon_url }
    }
}

/// Something the worker was asked to handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// A message delivered while no page is focused.
    Push(PushMessage),
    /// The user clicked a notification.
    NotificationClick {
        /// The clicked notification.
        notification: NotificationDescriptor,
    },
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerAction {
    /// A notification was displayed.
    Shown(NotificationDescriptor),
    /// A notification was closed and its URL opened.
    Opened(String),
}

/// Counters returned when the event stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Notifications displayed.
    pub shown: usize,
    /// Clicks routed to the browser.
    pub clicked: usize,
    /// Lines or events that could not be handled.
    pub skipped: usize,
}

/// Message-to-notification transducer.
#[derive(Debug)]
pub struct BackgroundWorker {
    config: WorkerConfig,
    notifier: Box<dyn Notifier>,
    opener: Box<dyn UrlOpener>,
}

impl BackgroundWorker {
    /// Creates a worker.
    pub fn new(config: WorkerConfig, notifier: Box<dyn Notifier>, opener: Box<dyn UrlOpener>) -> Self {
        if config.provider.is_complete() {
            log::info!(
                "[Worker] Started for provider project {}",
                config.provider.project_id
            );
        } else {
            log::warn!("[Worker] Provider configuration incomplete; relying on delivered events only");
        }
        Self {
            config,
            notifier,
            opener,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Handle a single event.
    pub fn handle(&self, event: &WorkerEvent) -> Result<WorkerAction> {
        match event {
            WorkerEvent::Push(message) => {
                let announcement = Announcement::from_message(message)?;
                let descriptor =
                    NotificationDescriptor::background(&announcement, &self.config.icon_url);
                self.notifier.show(&descriptor)?;
                Ok(WorkerAction::Shown(descriptor))
            }
            WorkerEvent::NotificationClick { notification } => {
                if let Err(e) = self.notifier.close(notification) {
                    log::warn!("[Worker] Failed to close notification: {e:#}");
                }
                self.opener.open(&notification.data.url)?;
                Ok(WorkerAction::Opened(notification.data.url.clone()))
            }
        }
    }

    /// Handle events from `reader` until it reaches EOF.
    ///
    /// Malformed lines and failed events are logged and skipped; only an
    /// I/O error on the reader ends the loop early.
    pub async fn run<R>(&self, reader: R) -> Result<WorkerStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = WorkerStats::default();
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event: WorkerEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("[Worker] Ignoring malformed event: {e}");
                    stats.skipped += 1;
                    continue;
                }
            };

            match self.handle(&event) {
                Ok(WorkerAction::Shown(_)) => stats.shown += 1,
                Ok(WorkerAction::Opened(_)) => stats.clicked += 1,
                Err(e) => {
                    log::warn!("[Worker] Failed to handle event: {e:#}");
                    stats.skipped += 1;
                }
            }
        }

        log::info!(
            "[Worker] Event stream closed: shown={}, clicked={}, skipped={}",
            stats.shown,
            stats.clicked,
            stats.skipped
        );
        Ok(stats)
    }
}
