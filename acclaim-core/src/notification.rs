//! Outbound notification intents
//!
//! Core operations never talk to an email transport directly. They publish a
//! [`Notification`] onto the [`NotificationOutbox`] and carry on; a
//! [`NotificationDispatcher`] drains the outbox on its own task and hands
//! each intent to a [`NotificationTransport`]. Transport failures are logged
//! and absorbed there, so a login or a removal request succeeds whatever
//! happens to the email.
//!
//! The queue is bounded. While nobody drains it, publishing past
//! [`DEFAULT_OUTBOX_CAPACITY`] (or the configured capacity) drops the new
//! notification with a warning.
//!
//! Tests can hold the [`NotificationReceiver`] and assert on what was
//! published without any transport at all.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    error::NotificationError,
    id::{OrganisationId, UserId},
};

/// How the user authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    Password,
    AzureSso,
}

impl LoginMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginMethod::Password => "password",
            LoginMethod::AzureSso => "azure_sso",
        }
    }
}

/// Requester, target and organisation of an owner request routed to the
/// platform administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationRequest {
    pub organisation_id: OrganisationId,
    pub organisation_name: String,
    pub requester_id: UserId,
    pub requester_name: String,
    pub requester_email: String,
    pub target_id: UserId,
    pub target_name: String,
    pub target_email: String,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    LoginNotification {
        user_name: String,
        method: LoginMethod,
        ip_address: String,
        user_agent: String,
        occurred_at: DateTime<Utc>,
    },
    MemberRemovalRequest(OrganisationRequest),
    OwnerDelegationRequest(OrganisationRequest),
    OwnershipRemovalRequest(OrganisationRequest),
}

impl NotificationPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationPayload::LoginNotification { .. } => "login_notification",
            NotificationPayload::MemberRemovalRequest(_) => "member_removal_request",
            NotificationPayload::OwnerDelegationRequest(_) => "owner_delegation_request",
            NotificationPayload::OwnershipRemovalRequest(_) => "ownership_removal_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub payload: NotificationPayload,
}

/// Notifications held while nothing drains the outbox.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// Publishing half of the notification queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationOutbox {
    sender: mpsc::Sender<Notification>,
}

/// Consuming half of the notification queue.
#[derive(Debug)]
pub struct NotificationReceiver {
    receiver: mpsc::Receiver<Notification>,
}

impl NotificationOutbox {
    /// A queue holding up to [`DEFAULT_OUTBOX_CAPACITY`] notifications.
    pub fn channel() -> (NotificationOutbox, NotificationReceiver) {
        Self::bounded(DEFAULT_OUTBOX_CAPACITY)
    }

    /// A queue holding up to `capacity` notifications (at least one).
    pub fn bounded(capacity: usize) -> (NotificationOutbox, NotificationReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            NotificationOutbox { sender },
            NotificationReceiver { receiver },
        )
    }

    /// Queue a notification. Never blocks and never fails the caller.
    pub fn publish(&self, notification: Notification) {
        let kind = notification.payload.kind();
        match self.sender.try_send(notification) {
            Ok(()) => tracing::debug!(kind = kind, "Notification queued"),
            Err(TrySendError::Full(dropped)) => tracing::warn!(
                kind = kind,
                recipient = %dropped.recipient,
                capacity = self.sender.max_capacity(),
                "Notification outbox full, dropping notification"
            ),
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(kind = kind, "Notification outbox closed, dropping notification")
            }
        }
    }
}

impl NotificationReceiver {
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Everything queued so far, without waiting.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.receiver.try_recv() {
            drained.push(notification);
        }
        drained
    }
}

/// Delivery of a notification, e.g. by email.
#[async_trait]
pub trait NotificationTransport: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Transport that only logs. Used when no email transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransport;

#[async_trait]
impl NotificationTransport for TracingTransport {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = notification.payload.kind(),
            "Notification delivered to log transport"
        );
        Ok(())
    }
}

/// Drains the outbox into a transport on a background task.
pub struct NotificationDispatcher {
    receiver: NotificationReceiver,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationDispatcher {
    pub fn new(receiver: NotificationReceiver, transport: Arc<dyn NotificationTransport>) -> Self {
        Self {
            receiver,
            transport,
        }
    }

    async fn deliver(transport: &dyn NotificationTransport, notification: Notification) {
        if let Err(e) = transport.send(&notification).await {
            tracing::warn!(
                error = %e,
                recipient = %notification.recipient,
                kind = notification.payload.kind(),
                "Failed to deliver notification"
            );
        }
    }

    /// Start the dispatch task.
    ///
    /// The task ends when `shutdown` fires or every outbox handle is dropped.
    pub fn start(
        self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let Self {
            mut receiver,
            transport,
        } = self;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = receiver.recv() => {
                        match next {
                            Some(notification) => Self::deliver(transport.as_ref(), notification).await,
                            None => {
                                tracing::info!("Notification outbox closed, stopping dispatcher");
                                break;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down notification dispatcher");
                        break;
                    }
                }
            }
        })
    }
}
