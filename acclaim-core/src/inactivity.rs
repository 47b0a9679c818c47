//! Inactivity timeout controller
//!
//! A session that sees no user activity moves `Active -> Warning -> Expired`.
//! The warning fires `warning_lead` before the timeout. Once the warning is
//! showing, ordinary activity no longer counts: only [`InactivityController::force_reset`]
//! (bound to an explicit "stay signed in" action) brings the session back to
//! `Active`. Expiry invalidates the remote session on a best-effort basis,
//! then hands control back to the embedding UI.
//!
//! [`InactivityTimer`] is the pure state machine over [`tokio::time::Instant`].
//! [`InactivityController`] drives it on a tokio task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::{Error, error::ValidationError};

/// Configuration for the inactivity timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactivityConfig {
    /// Total idle time before the session is ended
    pub timeout: Duration,
    /// How long before `timeout` the warning is shown
    pub warning_lead: Duration,
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15 * 60),
            warning_lead: Duration::from_secs(60),
        }
    }
}

impl InactivityConfig {
    pub fn new(timeout: Duration, warning_lead: Duration) -> Result<Self, ValidationError> {
        let config = Self {
            timeout,
            warning_lead,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_warning_lead(mut self, warning_lead: Duration) -> Self {
        self.warning_lead = warning_lead;
        self
    }

    /// The warning lead must be non-zero and strictly shorter than the timeout.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.warning_lead.is_zero() {
            return Err(ValidationError::InvalidField(
                "Inactivity warning lead must be greater than zero".to_string(),
            ));
        }
        if self.warning_lead >= self.timeout {
            return Err(ValidationError::InvalidField(format!(
                "Inactivity warning lead ({}s) must be shorter than the timeout ({}s)",
                self.warning_lead.as_secs(),
                self.timeout.as_secs()
            )));
        }
        Ok(())
    }

    /// Idle time before the warning is shown
    pub fn warning_after(&self) -> Duration {
        self.timeout.saturating_sub(self.warning_lead)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactivityState {
    Active,
    Warning,
    Expired,
    Disabled,
}

/// User input that counts as activity while the session is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    PointerMove,
    PointerDown,
    KeyDown,
    Scroll,
    TouchStart,
    Wheel,
}

/// A state change produced by [`InactivityTimer::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Warning { remaining: Duration },
    Expired,
}

#[derive(Debug, Clone)]
pub struct InactivityTimer {
    config: InactivityConfig,
    state: InactivityState,
    last_activity_at: Instant,
}

impl InactivityTimer {
    pub fn new(config: InactivityConfig, now: Instant) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            state: InactivityState::Active,
            last_activity_at: now,
        })
    }

    pub fn state(&self) -> InactivityState {
        self.state
    }

    pub fn config(&self) -> &InactivityConfig {
        &self.config
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    /// When the next transition is due, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            InactivityState::Active => Some(self.last_activity_at + self.config.warning_after()),
            InactivityState::Warning => Some(self.last_activity_at + self.config.timeout),
            InactivityState::Expired | InactivityState::Disabled => None,
        }
    }

    /// Register ordinary activity. Only has an effect while `Active`.
    ///
    /// Returns whether the timer was reset.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        if self.state != InactivityState::Active {
            return false;
        }
        self.last_activity_at = now;
        true
    }

    /// Explicit reset from `Active` or `Warning`.
    ///
    /// Returns whether the timer was reset. An expired or disabled timer is
    /// left alone.
    pub fn force_reset(&mut self, now: Instant) -> bool {
        match self.state {
            InactivityState::Active | InactivityState::Warning => {
                self.state = InactivityState::Active;
                self.last_activity_at = now;
                true
            }
            InactivityState::Expired | InactivityState::Disabled => false,
        }
    }

    /// Move to the next state if its deadline has passed. At most one step
    /// is taken per call.
    pub fn advance(&mut self, now: Instant) -> Option<Transition> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        match self.state {
            InactivityState::Active => {
                self.state = InactivityState::Warning;
                let expires_at = self.last_activity_at + self.config.timeout;
                Some(Transition::Warning {
                    remaining: expires_at.saturating_duration_since(now),
                })
            }
            InactivityState::Warning => {
                self.state = InactivityState::Expired;
                Some(Transition::Expired)
            }
            InactivityState::Expired | InactivityState::Disabled => None,
        }
    }

    pub fn disable(&mut self) {
        if self.state != InactivityState::Expired {
            self.state = InactivityState::Disabled;
        }
    }

    /// Re-arm a disabled timer, counting from `now`.
    pub fn enable(&mut self, now: Instant) -> bool {
        if self.state != InactivityState::Disabled {
            return false;
        }
        self.state = InactivityState::Active;
        self.last_activity_at = now;
        true
    }
}

/// UI callbacks for the controller.
pub trait InactivityHandler: Send + Sync + 'static {
    /// The warning is now showing; the session ends after `remaining`.
    fn on_warning(&self, remaining: Duration);

    /// The session has ended and client state should be torn down.
    fn on_logout(&self);

    /// Navigate to the login screen.
    fn redirect_to_login(&self);
}

/// Remote session invalidation, called once on expiry.
#[async_trait]
pub trait SessionInvalidator: Send + Sync + 'static {
    async fn invalidate(&self) -> Result<(), Error>;
}

#[derive(Debug)]
enum Command {
    Activity(ActivityEvent),
    ForceReset,
    Disable,
    Enable,
}

/// Runs an [`InactivityTimer`] on its own task.
///
/// Dropping the controller cancels the task and every pending timer.
pub struct InactivityController {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<InactivityState>,
    task: JoinHandle<()>,
}

impl InactivityController {
    /// Start the controller in the `Active` state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: InactivityConfig,
        handler: Arc<dyn InactivityHandler>,
        invalidator: Arc<dyn SessionInvalidator>,
    ) -> Result<Self, Error> {
        let timer = InactivityTimer::new(config, Instant::now())?;
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(timer.state());

        let task = tokio::spawn(run(timer, receiver, state_tx, handler, invalidator));

        Ok(Self {
            commands,
            state,
            task,
        })
    }

    pub fn state(&self) -> InactivityState {
        *self.state.borrow()
    }

    /// Watch state changes, e.g. to show a countdown.
    pub fn subscribe(&self) -> watch::Receiver<InactivityState> {
        self.state.clone()
    }

    pub fn record_activity(&self, event: ActivityEvent) {
        self.send(Command::Activity(event));
    }

    pub fn force_reset(&self) {
        self.send(Command::ForceReset);
    }

    pub fn disable(&self) {
        self.send(Command::Disable);
    }

    pub fn enable(&self) {
        self.send(Command::Enable);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Inactivity controller already stopped");
        }
    }
}

impl Drop for InactivityController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut timer: InactivityTimer,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<InactivityState>,
    handler: Arc<dyn InactivityHandler>,
    invalidator: Arc<dyn SessionInvalidator>,
) {
    tracing::debug!(
        timeout_seconds = timer.config().timeout.as_secs(),
        warning_lead_seconds = timer.config().warning_lead.as_secs(),
        "Inactivity controller started"
    );

    loop {
        let deadline = timer.deadline();
        let due = async {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                let now = Instant::now();
                match command {
                    Command::Activity(event) => {
                        if !timer.record_activity(now) {
                            tracing::trace!(?event, state = ?timer.state(), "Activity ignored");
                        }
                    }
                    Command::ForceReset => {
                        if timer.force_reset(now) {
                            tracing::debug!("Inactivity timer reset");
                        }
                    }
                    Command::Disable => timer.disable(),
                    Command::Enable => {
                        timer.enable(now);
                    }
                }
            }
            _ = due => {
                match timer.advance(Instant::now()) {
                    Some(Transition::Warning { remaining }) => {
                        tracing::info!(remaining_seconds = remaining.as_secs(), "Inactivity warning");
                        state.send_replace(timer.state());
                        handler.on_warning(remaining);
                    }
                    Some(Transition::Expired) => {
                        tracing::info!("Session expired after inactivity");
                        state.send_replace(timer.state());
                        if let Err(e) = invalidator.invalidate().await {
                            tracing::warn!(error = %e, "Failed to invalidate session on server");
                        }
                        handler.on_logout();
                        handler.redirect_to_login();
                        break;
                    }
                    None => {}
                }
            }
        }

        state.send_if_modified(|current| {
            let changed = *current != timer.state();
            *current = timer.state();
            changed
        });
    }
}
