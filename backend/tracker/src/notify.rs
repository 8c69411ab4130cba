//! Side channel for terminal transaction outcomes.
//!
//! The orchestrator calls exactly one of [`Notifier::success`] /
//! [`Notifier::error`] per invocation, on the transition into the terminal
//! state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::types::TxHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Which action produced it (`donation`, `vote`, ...).
    pub action: &'static str,
    pub message: String,
    pub tx_hash: Option<TxHash>,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, action: &'static str, message: String, tx_hash: Option<TxHash>) -> Self {
        Self {
            kind,
            action,
            message,
            tx_hash,
            at: Utc::now(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn success(&self, notification: Notification);
    fn error(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, n: Notification) {
        info!(action = n.action, tx = ?n.tx_hash, "{}", n.message);
    }

    fn error(&self, n: Notification) {
        warn!(action = n.action, tx = ?n.tx_hash, "{}", n.message);
    }
}

/// Forwards notifications to a consumer (a toast queue, a websocket, a test).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn success(&self, n: Notification) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(n);
    }

    fn error(&self, n: Notification) {
        let _ = self.tx.send(n);
    }
}
