//! Grant notifications.
//!
//! Every newly issued grant or invite produces one [`GrantEvent`]. The
//! dispatcher fans it out to two independent channels, in-app notification
//! and email, each spawned on the runtime. The caller waits a bounded time
//! for both, collects failures as [`DispatchWarning`]s and moves on. A
//! channel still running at the deadline keeps running; its outcome is only
//! logged. With a zero wait the caller does not wait at all.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use fieldbook_core::{
    DocumentType, InviteId, InviteToken, PendingPrivateShareInvite, PrivateShare, ShareId,
    ShareScope, UserId,
};

/// Failure reported by a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

impl DispatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Notification,
    Email,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Notification => f.write_str("notification"),
            Channel::Email => f.write_str("email"),
        }
    }
}

/// A channel failure attached to an otherwise successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchWarning {
    pub channel: Channel,
    pub message: String,
}

impl DispatchWarning {
    pub fn new(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantEventKind {
    ShareIssued {
        share_id: ShareId,
    },
    InviteIssued {
        invite_id: InviteId,
        token: InviteToken,
        expires_at: i64,
    },
}

/// A newly issued grant or invite, addressed to its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantEvent {
    pub kind: GrantEventKind,
    pub owner_id: UserId,
    pub document_type: DocumentType,
    pub scope: ShareScope,
    /// Account that receives the in-app notification, if any.
    pub notify_user: Option<UserId>,
    /// Address that receives the email, if any.
    pub email: Option<String>,
}

impl GrantEvent {
    pub fn share_issued(share: &PrivateShare, notify_user: UserId, email: Option<String>) -> Self {
        Self {
            kind: GrantEventKind::ShareIssued { share_id: share.id },
            owner_id: share.owner_id,
            document_type: share.document_type,
            scope: share.scope,
            notify_user: Some(notify_user),
            email,
        }
    }

    pub fn invite_issued(invite: &PendingPrivateShareInvite) -> Self {
        Self {
            kind: GrantEventKind::InviteIssued {
                invite_id: invite.id,
                token: invite.token.clone(),
                expires_at: invite.expires_at,
            },
            owner_id: invite.owner_id,
            document_type: invite.document_type,
            scope: invite.scope,
            notify_user: None,
            email: Some(invite.email.clone()),
        }
    }
}

/// Creates in-app notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify `event.notify_user`. Only called when it is set.
    async fn notify(&self, event: &GrantEvent) -> Result<(), DispatchError>;
}

/// Sends grant and invite emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Email `event.email`. Only called when it is set.
    async fn send(&self, event: &GrantEvent) -> Result<(), DispatchError>;
}

/// Notifier that only logs. Used when no notification backend is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &GrantEvent) -> Result<(), DispatchError> {
        tracing::info!(
            owner = %event.owner_id,
            user = ?event.notify_user,
            document_type = %event.document_type,
            "grant notification"
        );
        Ok(())
    }
}

/// Mailer that only logs. The token is never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, event: &GrantEvent) -> Result<(), DispatchError> {
        tracing::info!(
            owner = %event.owner_id,
            document_type = %event.document_type,
            "grant email"
        );
        Ok(())
    }
}

/// Fans grant events out to the notification and email channels.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    mailer: Arc<dyn Mailer>,
    wait: Duration,
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, mailer: Arc<dyn Mailer>, wait: Duration) -> Self {
        Self {
            notifier,
            mailer,
            wait,
        }
    }

    /// Dispatcher backed by [`LogNotifier`] and [`LogMailer`].
    pub fn logging(wait: Duration) -> Self {
        Self::new(Arc::new(LogNotifier), Arc::new(LogMailer), wait)
    }

    /// Dispatch an event and return the warnings of every channel that
    /// failed within the wait window.
    ///
    /// Never fails. Must be called from within a tokio runtime.
    pub async fn dispatch(&self, event: GrantEvent) -> Vec<DispatchWarning> {
        let event = Arc::new(event);
        let mut running: Vec<(Channel, JoinHandle<Result<(), DispatchError>>)> = Vec::new();

        if event.notify_user.is_some() {
            let notifier = Arc::clone(&self.notifier);
            let event = Arc::clone(&event);
            running.push((
                Channel::Notification,
                tokio::spawn(async move {
                    let result = notifier.notify(&event).await;
                    log_failure(Channel::Notification, &event, &result);
                    result
                }),
            ));
        }

        if event.email.is_some() {
            let mailer = Arc::clone(&self.mailer);
            let event = Arc::clone(&event);
            running.push((
                Channel::Email,
                tokio::spawn(async move {
                    let result = mailer.send(&event).await;
                    log_failure(Channel::Email, &event, &result);
                    result
                }),
            ));
        }

        if self.wait.is_zero() {
            tracing::debug!(channels = running.len(), "grant dispatch detached");
            return Vec::new();
        }

        let deadline = tokio::time::Instant::now() + self.wait;
        let mut warnings = Vec::new();

        for (channel, handle) in running {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warnings.push(DispatchWarning::new(channel, e.0)),
                Ok(Err(join_error)) => {
                    tracing::warn!(%channel, error = %join_error, "grant dispatch task failed");
                    warnings.push(DispatchWarning::new(channel, "delivery task failed"));
                }
                Err(_) => {
                    // Dropping the handle detaches the task; it still runs.
                    tracing::debug!(%channel, wait = ?self.wait, "grant dispatch still running");
                }
            }
        }

        warnings
    }
}

fn log_failure(channel: Channel, event: &GrantEvent, result: &Result<(), DispatchError>) {
    if let Err(e) = result {
        tracing::warn!(
            %channel,
            owner = %event.owner_id,
            document_type = %event.document_type,
            error = %e,
            "grant dispatch failed"
        );
    }
}
