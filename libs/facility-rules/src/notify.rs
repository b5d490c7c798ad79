//! Notification sink
//!
//! Fire-and-forget delivery of user-facing notifications. The engine never
//! blocks on or retries a sink; implementations drop what they cannot deliver.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::types::AlertLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
    Error,
}

impl From<AlertLevel> for NotificationSeverity {
    /// critical -> error, high|medium -> warning, anything else -> info
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Critical => NotificationSeverity::Error,
            AlertLevel::High | AlertLevel::Medium => NotificationSeverity::Warning,
            AlertLevel::Low => NotificationSeverity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: NotificationSeverity,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: NotificationSeverity,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            created_at,
        }
    }
}

pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.severity {
            NotificationSeverity::Error => error!("[NOTIFY] {}: {}", n.title, n.message),
            NotificationSeverity::Warning => warn!("[NOTIFY] {}: {}", n.title, n.message),
            NotificationSeverity::Info | NotificationSeverity::Success => {
                info!("[NOTIFY] {}: {}", n.title, n.message)
            },
        }
    }
}

/// Forwards notifications to a bounded channel; drops when full or closed
pub struct ChannelSink {
    tx: mpsc::Sender<Notification>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            match e {
                mpsc::error::TrySendError::Full(n) => {
                    warn!("Notification channel full, dropped: {}", n.title)
                },
                mpsc::error::TrySendError::Closed(n) => {
                    warn!("Notification channel closed, dropped: {}", n.title)
                },
            }
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.lock().is_empty()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.received.lock())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.received.lock().push(notification);
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn sample(title: &str) -> Notification {
        Notification::new(title, "msg", NotificationSeverity::Info, Utc::now())
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            NotificationSeverity::from(AlertLevel::Critical),
            NotificationSeverity::Error
        );
        assert_eq!(
            NotificationSeverity::from(AlertLevel::High),
            NotificationSeverity::Warning
        );
        assert_eq!(
            NotificationSeverity::from(AlertLevel::Medium),
            NotificationSeverity::Warning
        );
        assert_eq!(
            NotificationSeverity::from(AlertLevel::Low),
            NotificationSeverity::Info
        );
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.notify(sample("first"));
        sink.notify(sample("second"));

        assert_eq!(rx.recv().await.unwrap().title, "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_closed_does_not_panic() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);
        sink.notify(sample("lost"));
    }

    #[test]
    fn test_recording_sink_take() {
        let sink = RecordingSink::new();
        sink.notify(sample("a"));
        sink.notify(sample("b"));
        assert_eq!(sink.len(), 2);
        let taken = sink.take();
        assert_eq!(taken.len(), 2);
        assert!(sink.is_empty());
    }
}
