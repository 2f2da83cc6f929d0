//! Operational alerts for watch loops that stopped.
//!
//! A dead watch loop means statuses silently stop flowing, so the agent
//! reports every loop exit to an [`AlertSink`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::error;

/// Why a watch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    /// The orchestrator returned an error retrying cannot fix.
    Fatal,
    /// Transient errors outlasted the retry budget.
    RetriesExhausted,
}

/// A stopped watch loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// The watched collection, e.g. `workflows.argoproj.io/v1alpha1`.
    pub resource: String,
    /// Why the loop stopped.
    pub reason: AlertReason,
    /// The last error.
    pub message: String,
    /// Failed attempts before stopping.
    pub attempts: usize,
    /// When the loop stopped.
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Creates an alert stamped now.
    #[must_use]
    pub fn new(resource: impl Into<String>, reason: AlertReason, message: impl Into<String>, attempts: usize) -> Self {
        Self {
            resource: resource.into(),
            reason,
            message: message.into(),
            attempts,
            raised_at: Utc::now(),
        }
    }
}

/// Receives alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers an alert. Delivery failures are the sink's problem.
    async fn raise(&self, alert: Alert);
}

/// Logs alerts at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAlertSink;

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn raise(&self, alert: Alert) {
        error!(
            resource = %alert.resource,
            reason = ?alert.reason,
            attempts = alert.attempts,
            error = %alert.message,
            "Watch loop stopped"
        );
    }
}

/// Forwards alerts to a channel, e.g. a pager integration task.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelAlertSink {
    /// Creates a sink and the receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AlertSink for ChannelAlertSink {
    async fn raise(&self, alert: Alert) {
        if let Err(e) = self.tx.send(alert) {
            LoggingAlertSink.raise(e.0).await;
        }
    }
}

/// Keeps alerts in memory.
#[derive(Debug, Default)]
pub struct CollectingAlertSink {
    alerts: RwLock<Vec<Alert>>,
}

impl CollectingAlertSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts raised so far.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Returns true if nothing was raised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}

#[async_trait]
impl AlertSink for CollectingAlertSink {
    async fn raise(&self, alert: Alert) {
        self.alerts.write().push(alert);
    }
}
