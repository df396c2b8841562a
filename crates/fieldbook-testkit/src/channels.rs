//! Notification channels for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fieldbook_sharing::{DispatchError, GrantEvent, Mailer, NotificationDispatcher, Notifier};

/// Notifier that records every event it is given.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<GrantEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<GrantEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &GrantEvent) -> Result<(), DispatchError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Mailer that records every event it is given.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    events: Mutex<Vec<GrantEvent>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<GrantEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Addresses emailed so far, in order.
    pub fn recipients(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.email)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, event: &GrantEvent) -> Result<(), DispatchError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Notifier whose backend is always down.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &GrantEvent) -> Result<(), DispatchError> {
        Err(DispatchError::new("notification backend unavailable"))
    }
}

/// Mailer whose backend is always down.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _event: &GrantEvent) -> Result<(), DispatchError> {
        Err(DispatchError::new("smtp relay refused connection"))
    }
}

/// Mailer that takes `delay` before succeeding.
#[derive(Debug, Clone, Copy)]
pub struct SlowMailer(pub Duration);

#[async_trait]
impl Mailer for SlowMailer {
    async fn send(&self, _event: &GrantEvent) -> Result<(), DispatchError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// Dispatcher over recording channels, returned with handles to both.
pub fn recording_dispatcher(
    wait: Duration,
) -> (NotificationDispatcher, Arc<RecordingNotifier>, Arc<RecordingMailer>) {
    let notifier = RecordingNotifier::new();
    let mailer = RecordingMailer::new();
    let dispatcher = NotificationDispatcher::new(notifier.clone(), mailer.clone(), wait);
    (dispatcher, notifier, mailer)
}

/// Dispatcher whose channels both fail.
pub fn failing_dispatcher(wait: Duration) -> NotificationDispatcher {
    NotificationDispatcher::new(Arc::new(FailingNotifier), Arc::new(FailingMailer), wait)
}
