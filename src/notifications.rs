//! Notification display and click-through for the background worker.
//!
//! The worker does not draw anything itself; it hands descriptors to a
//! [`Notifier`] and click targets to a [`UrlOpener`].
//!
//! # Terminal Notifications
//!
//! [`TerminalNotifier`] emits the rxvt-unicode style OSC 777 sequence:
//!
//! ```text
//! ESC ] 777 ; notify ; <title> ; <body> BEL
//! ```
//!
//! Terminals that understand it (kitty, foot, WezTerm, urxvt with the
//! notify extension) raise a desktop notification. Others ignore it.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{Context, Result};
use reqwest::Url;

use crate::payload::NotificationDescriptor;

/// Displays and dismisses notifications.
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Display a notification.
    fn show(&self, descriptor: &NotificationDescriptor) -> Result<()>;

    /// Dismiss a previously displayed notification.
    fn close(&self, descriptor: &NotificationDescriptor) -> Result<()>;
}

/// Opens a URL in a browser window or tab.
pub trait UrlOpener: Send + Sync + std::fmt::Debug {
    /// Open (or focus) `url`.
    fn open(&self, url: &str) -> Result<()>;
}

/// [`Notifier`] writing OSC 777 sequences to a terminal.
#[derive(Debug)]
pub struct TerminalNotifier<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> TerminalNotifier<W> {
    /// Notifier writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consume the notifier and return the writer.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TerminalNotifier<std::io::Stdout> {
    /// Notifier writing to the process's stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + std::fmt::Debug> Notifier for TerminalNotifier<W> {
    fn show(&self, descriptor: &NotificationDescriptor) -> Result<()> {
        let sequence = osc777(&descriptor.title, &descriptor.body);
        let mut out = self
            .out
            .lock()
            .map_err(|e| anyhow::anyhow!("Notifier output poisoned: {e}"))?;
        out.write_all(sequence.as_bytes())
            .context("Failed to write notification")?;
        out.flush().context("Failed to flush notification")?;
        log::info!("[Worker] Showed notification: {}", descriptor.body);
        Ok(())
    }

    fn close(&self, descriptor: &NotificationDescriptor) -> Result<()> {
        // Terminal notifications cannot be retracted once raised
        log::debug!("[Worker] Closed notification: {}", descriptor.body);
        Ok(())
    }
}

/// Build an OSC 777 notify sequence.
///
/// Control characters would terminate the sequence early and a `;` in the
/// title would shift the body, so both are replaced.
pub fn osc777(title: &str, body: &str) -> String {
    let clean = |s: &str, field_sep: bool| -> String {
        s.chars()
            .map(|c| match c {
                ';' if field_sep => ',',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect()
    };
    format!(
        "\x1b]777;notify;{};{}\x07",
        clean(title, true),
        clean(body, false)
    )
}

/// [`UrlOpener`] using the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid notification URL: {url}"))?;
        anyhow::ensure!(
            matches!(parsed.scheme(), "http" | "https"),
            "Refusing to open non-web URL: {url}"
        );

        #[cfg(target_os = "macos")]
        {
            std::process::Command::new("open")
                .arg(url)
                .spawn()
                .context("Failed to open browser")?;
        }

        #[cfg(target_os = "linux")]
        {
            std::process::Command::new("xdg-open")
                .arg(url)
                .spawn()
                .context("Failed to open browser")?;
        }

        #[cfg(target_os = "windows")]
        {
            std::process::Command::new("cmd")
                .args(["/C", "start", "", url])
                .spawn()
                .context("Failed to open browser")?;
        }

        log::info!("[Worker] Opened {url}");
        Ok(())
    }
}
