//! HackPortal push notifications.
//!
//! This crate implements the push notification side of the HackPortal
//! hackathon site: registering an installation for announcements, and
//! the background worker that displays them while the site is not focused.
//!
//! # Architecture
//!
//! Two execution contexts that share no memory:
//!
//! - **Manager** - single-writer task owning the token lifecycle
//!   (worker registration → permission → token → probe → backend → listen)
//! - **Worker** - separate process turning delivered messages into
//!   notifications and notification clicks into opened pages
//!
//! They meet only through the push provider's delivery channel and the
//! backend HTTP API.
//!
//! # Modules
//!
//! - [`manager`] - Registration state machine and token reset
//! - [`worker`] - Background delivery worker
//! - [`backend`] - Dry-run probe and `/api/tokens` over HTTP
//! - [`messaging`] / [`platform`] - Collaborator traits for the provider SDK and host platform
//! - [`payload`] - Inbound payloads and notification descriptors
//! - [`portal`] - About/FAQ data endpoints
//! - [`config`] - Configuration loading/saving

pub mod backend;
pub mod config;
pub mod constants;
pub mod env;
pub mod manager;
pub mod messaging;
pub mod notifications;
pub mod payload;
pub mod platform;
pub mod portal;
pub mod worker;

// Re-export commonly used types
pub use backend::{HttpBackend, ProbeReport, PushBackend};
pub use config::{Config, ProviderConfig};
pub use manager::{
    PushDeps, PushManager, PushManagerHandle, PushSettings, RegistrationError,
    RegistrationOutcome, RegistrationPhase, RegistrationState,
};
pub use messaging::{MessagingClient, PushToken};
pub use payload::{Announcement, NotificationDescriptor, PushMessage};
pub use platform::{Permission, PermissionGate, WorkerContainer, WorkerRegistration, WorkerScript};
pub use worker::{BackgroundWorker, WorkerConfig, WorkerEvent};
