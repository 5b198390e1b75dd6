//! Push registration manager - single-writer token lifecycle via message passing.
//!
//! Drives the once-per-session sequence that takes an installation from "no
//! push capability" to "validated token stored with the backend, listening
//! for messages", and exposes a narrower manual token reset.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐         ┌──────────────────────────────────┐
//! │ Handle       │──req──▶ │        MANAGER TASK              │
//! │ (clone 1)    │◀──res── │                                  │
//! └──────────────┘         │  one request at a time:          │
//!                          │    Register / ResetToken         │
//! ┌──────────────┐         │                                  │
//! │ Handle       │──req──▶ │  publishes RegistrationState     │
//! │ (clone 2)    │◀─watch─ │  on every transition             │
//! └──────────────┘         └──────────────────────────────────┘
//! ```
//!
//! All writes to the token go through the task's queue, so a reset issued
//! while registration is in flight runs after it and can never be
//! overwritten by it. Reads go through a `watch` channel and never queue.
//!
//! # Sequence
//!
//! ```text
//! Unregistered → Registering → [PermissionPending] → TokenAcquiring
//!   → TokenValidating → [TokenReacquiring] → Registered
//!
//! Registering ──rejected──▶ Unregistered
//! PermissionPending ──not granted──▶ PermissionDenied
//! any later step ──error──▶ Failed
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let handle = PushManager::start(deps, PushSettings::from_config(&config)?);
//!
//! match handle.register().await? {
//!     RegistrationOutcome::Registered(token) => log::info!("push ready: {token}"),
//!     other => log::info!("push disabled: {other:?}"),
//! }
//!
//! let fresh = handle.reset_token().await?;
//! ```

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::backend::PushBackend;
use crate::config::Config;
use crate::messaging::{MessagingClient, PushToken};
use crate::payload::{Announcement, NotificationDescriptor, PushMessage};
use crate::platform::{Permission, PermissionGate, WorkerContainer, WorkerRegistration, WorkerScript};

/// Capacity of the manager's request queue.
const REQUEST_QUEUE_DEPTH: usize = 32;

/// Where the manager is in the registration sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegistrationPhase {
    /// No worker, no token.
    #[default]
    Unregistered,
    /// Worker script registration in flight.
    Registering,
    /// Worker registered; permission prompt in flight.
    PermissionPending,
    /// Permission not granted. Terminal for the session.
    PermissionDenied,
    /// Permission granted; token request in flight.
    TokenAcquiring,
    /// Dry-run delivery probe in flight.
    TokenValidating,
    /// Probe reported an error; old token deleted, new one requested.
    TokenReacquiring,
    /// Token stored with the backend and listener attached.
    Registered,
    /// A step after worker registration failed.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Snapshot of the manager's state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrationState {
    /// Current phase.
    pub phase: RegistrationPhase,
    /// Last observed notification permission, once checked.
    pub permission: Option<Permission>,
    /// Current token. Only ever set while `phase` is `Registered`.
    pub token: Option<PushToken>,
    /// Whether the foreground message listener is attached.
    pub listening: bool,
}

/// Result of a completed registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The environment cannot host background workers; nothing was attempted.
    Unsupported,
    /// Permission ended up other than granted; no token was requested.
    PermissionWithheld(Permission),
    /// Token validated, stored and listening.
    Registered(PushToken),
}

/// Why a registration or reset request failed.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The platform refused the worker script.
    #[error("worker script registration rejected: {0:#}")]
    WorkerRejected(anyhow::Error),
    /// The permission prompt itself failed.
    #[error("permission request failed: {0:#}")]
    PermissionRequest(anyhow::Error),
    /// The provider did not issue a token.
    #[error("token acquisition failed: {0:#}")]
    TokenAcquisition(anyhow::Error),
    /// The dry-run delivery probe could not be completed.
    #[error("delivery probe failed: {0:#}")]
    Probe(anyhow::Error),
    /// The provider refused to delete the current token.
    #[error("token deletion failed: {0:#}")]
    TokenDeletion(anyhow::Error),
    /// The backend did not store the token.
    #[error("token persistence failed: {0:#}")]
    Persistence(anyhow::Error),
    /// Foreground message delivery could not be started.
    #[error("message listener could not be attached: {0:#}")]
    Listener(anyhow::Error),
    /// `reset_token` was called before registration completed.
    #[error("no registered token to reset")]
    NotRegistered,
    /// The manager task is gone.
    #[error("push manager shut down")]
    ManagerClosed,
}

/// Collaborators injected into the manager.
#[derive(Debug, Clone)]
pub struct PushDeps {
    /// Worker registry of the host platform.
    pub container: Arc<dyn WorkerContainer>,
    /// Notification permission of the host platform.
    pub permissions: Arc<dyn PermissionGate>,
    /// Push provider messaging client, constructed once by the embedder.
    pub messaging: Arc<dyn MessagingClient>,
    /// Probe and token storage endpoints.
    pub backend: Arc<dyn PushBackend>,
}

/// Static inputs to the registration sequence.
#[derive(Debug, Clone)]
pub struct PushSettings {
    /// Worker script URL, configuration included.
    pub script: WorkerScript,
    /// VAPID key passed on every token request.
    pub vapid_key: String,
}

impl PushSettings {
    /// Derive settings from loaded configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            script: WorkerScript::new(&config.site_url, &config.provider, &config.icon_url)?,
            vapid_key: config.vapid_key.clone(),
        })
    }
}

/// Request types for the manager task.
#[derive(Debug)]
enum ManagerRequest {
    Register {
        reply: oneshot::Sender<Result<RegistrationOutcome, RegistrationError>>,
    },
    ResetToken {
        reply: oneshot::Sender<Result<PushToken, RegistrationError>>,
    },
    Shutdown,
}

/// Entry point for starting the manager task.
#[derive(Debug)]
pub struct PushManager;

impl PushManager {
    /// Spawn the manager task on the current tokio runtime.
    ///
    /// Nothing happens until [`PushManagerHandle::register`] is called.
    pub fn start(deps: PushDeps, settings: PushSettings) -> PushManagerHandle {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(RegistrationState::default());

        let actor = ManagerActor {
            deps,
            settings,
            state: state_tx,
            worker: None,
            listener: None,
        };
        tokio::spawn(actor.run(rx));

        PushManagerHandle { tx, state: state_rx }
    }
}

/// Handle for sending requests to the manager task.
///
/// Cheap to clone; every clone talks to the same task.
#[derive(Clone, Debug)]
pub struct PushManagerHandle {
    tx: mpsc::Sender<ManagerRequest>,
    state: watch::Receiver<RegistrationState>,
}

impl PushManagerHandle {
    /// Run the registration sequence (or return its settled outcome).
    pub async fn register(&self) -> Result<RegistrationOutcome, RegistrationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ManagerRequest::Register { reply: reply_tx })
            .await
            .map_err(|_closed| RegistrationError::ManagerClosed)?;
        reply_rx
            .await
            .map_err(|_dropped| RegistrationError::ManagerClosed)?
    }

    /// Delete the current token and request a new one.
    ///
    /// Does not re-check permission, re-probe, or store the new token with
    /// the backend.
    pub async fn reset_token(&self) -> Result<PushToken, RegistrationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ManagerRequest::ResetToken { reply: reply_tx })
            .await
            .map_err(|_closed| RegistrationError::ManagerClosed)?;
        reply_rx
            .await
            .map_err(|_dropped| RegistrationError::ManagerClosed)?
    }

    /// Latest published state.
    pub fn state(&self) -> RegistrationState {
        self.state.borrow().clone()
    }

    /// Current token, if registered.
    pub fn token(&self) -> Option<PushToken> {
        self.state.borrow().token.clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.clone()
    }

    /// Stop the manager task and its foreground listener.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ManagerRequest::Shutdown).await;
    }
}

#[derive(Debug)]
struct ManagerActor {
    deps: PushDeps,
    settings: PushSettings,
    state: watch::Sender<RegistrationState>,
    worker: Option<Arc<dyn WorkerRegistration>>,
    listener: Option<JoinHandle<()>>,
}

impl ManagerActor {
    async fn run(mut self, mut rx: mpsc::Receiver<ManagerRequest>) {
        while let Some(request) = rx.recv().await {
            match request {
                ManagerRequest::Register { reply } => {
                    let result = self.register().await;
                    let _ = reply.send(result);
                }
                ManagerRequest::ResetToken { reply } => {
                    let result = self.reset_token().await;
                    let _ = reply.send(result);
                }
                ManagerRequest::Shutdown => break,
            }
        }

        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        log::debug!("[Push] Manager stopped");
    }

    async fn register(&mut self) -> Result<RegistrationOutcome, RegistrationError> {
        let current = self.state.borrow().clone();
        match current.phase {
            RegistrationPhase::Registered => {
                if let Some(token) = current.token {
                    return Ok(RegistrationOutcome::Registered(token));
                }
            }
            RegistrationPhase::PermissionDenied => {
                let permission = current.permission.unwrap_or(Permission::Denied);
                return Ok(RegistrationOutcome::PermissionWithheld(permission));
            }
            _ => {}
        }

        if !self.deps.container.is_supported() {
            log::info!("[Push] Background workers unsupported; push notifications disabled");
            return Ok(RegistrationOutcome::Unsupported);
        }

        self.set_phase(RegistrationPhase::Registering);
        // A running listener displays through the existing handle, so keep it
        if self.worker.is_none() {
            let worker = match self.deps.container.register(&self.settings.script).await {
                Ok(worker) => worker,
                Err(e) => {
                    log::warn!("[Push] Service worker registration failed: {e:#}");
                    self.set_phase(RegistrationPhase::Unregistered);
                    return Err(RegistrationError::WorkerRejected(e));
                }
            };
            self.worker = Some(worker);
            log::info!("[Push] Service worker registered");
        } else {
            log::debug!("[Push] Reusing registered service worker");
        }

        match self.acquire().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::warn!("[Push] Registration failed: {e}");
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn acquire(&mut self) -> Result<RegistrationOutcome, RegistrationError> {
        let mut permission = self.deps.permissions.current();
        if permission == Permission::Default {
            self.state.send_modify(|s| {
                s.phase = RegistrationPhase::PermissionPending;
                s.permission = Some(permission);
            });
            permission = self
                .deps
                .permissions
                .request()
                .await
                .map_err(RegistrationError::PermissionRequest)?;
        }
        self.state.send_modify(|s| s.permission = Some(permission));

        if permission != Permission::Granted {
            log::info!("[Push] Notification permission is {permission}; not requesting a token");
            self.set_phase(RegistrationPhase::PermissionDenied);
            return Ok(RegistrationOutcome::PermissionWithheld(permission));
        }

        self.set_phase(RegistrationPhase::TokenAcquiring);
        let mut token = self.get_token().await?;

        self.set_phase(RegistrationPhase::TokenValidating);
        let report = self
            .deps
            .backend
            .probe(&token)
            .await
            .map_err(RegistrationError::Probe)?;

        if let Some(error) = report.error {
            // Single retry; the replacement token is trusted without a second probe
            log::info!("[Push] Token {token} failed delivery probe ({error}); reacquiring");
            self.set_phase(RegistrationPhase::TokenReacquiring);
            self.deps
                .messaging
                .delete_token()
                .await
                .map_err(RegistrationError::TokenDeletion)?;
            token = self.get_token().await?;
        }

        self.deps
            .backend
            .register_token(&token)
            .await
            .map_err(RegistrationError::Persistence)?;

        self.ensure_listener().await?;

        self.state.send_modify(|s| {
            s.phase = RegistrationPhase::Registered;
            s.token = Some(token.clone());
        });
        log::info!("[Push] Registered for push notifications with token {token}");
        Ok(RegistrationOutcome::Registered(token))
    }

    async fn reset_token(&mut self) -> Result<PushToken, RegistrationError> {
        if self.state.borrow().phase != RegistrationPhase::Registered {
            return Err(RegistrationError::NotRegistered);
        }

        self.deps
            .messaging
            .delete_token()
            .await
            .map_err(RegistrationError::TokenDeletion)?;

        // The old token is gone from here on; a failed reissue leaves none
        let token = match self.get_token().await {
            Ok(token) => token,
            Err(e) => {
                log::warn!("[Push] Token reset failed: {e}");
                self.fail(&e);
                return Err(e);
            }
        };

        self.state.send_modify(|s| s.token = Some(token.clone()));
        log::info!("[Push] Token reset to {token}");
        Ok(token)
    }

    async fn get_token(&self) -> Result<PushToken, RegistrationError> {
        let token = self
            .deps
            .messaging
            .get_token(&self.settings.vapid_key)
            .await
            .map_err(RegistrationError::TokenAcquisition)?;
        log::debug!("[Push] Acquired token {token}");
        Ok(token)
    }

    async fn ensure_listener(&mut self) -> Result<(), RegistrationError> {
        if self.listener.is_some() {
            return Ok(());
        }
        let worker = self.worker.clone().ok_or_else(|| {
            RegistrationError::Listener(anyhow::anyhow!("no worker registration to display through"))
        })?;

        let messages = self
            .deps
            .messaging
            .on_message()
            .await
            .map_err(RegistrationError::Listener)?;
        self.listener = Some(tokio::spawn(foreground_listener(messages, worker)));
        self.state.send_modify(|s| s.listening = true);
        Ok(())
    }

    fn set_phase(&self, phase: RegistrationPhase) {
        self.state.send_modify(|s| s.phase = phase);
    }

    fn fail(&self, error: &RegistrationError) {
        let reason = error.to_string();
        self.state.send_modify(|s| {
            s.phase = RegistrationPhase::Failed { reason };
            s.token = None;
        });
    }
}

/// Turn foreground messages into notifications shown through the worker.
async fn foreground_listener(
    mut messages: mpsc::UnboundedReceiver<PushMessage>,
    worker: Arc<dyn WorkerRegistration>,
) {
    while let Some(message) = messages.recv().await {
        let announcement = match Announcement::from_message(&message) {
            Ok(announcement) => announcement,
            Err(e) => {
                log::warn!("[Push] Dropping foreground message: {e}");
                continue;
            }
        };

        let descriptor = NotificationDescriptor::foreground(&announcement, Utc::now());
        if let Err(e) = worker.show_notification(&descriptor).await {
            log::warn!("[Push] Failed to show notification: {e:#}");
        }
    }
    log::debug!("[Push] Foreground message stream closed");
}
