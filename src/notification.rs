// =============================================================================
// Notification Sink (C9) — push-only outbound channel for lifecycle events
// =============================================================================
//
// The core calls `notify` on every lifecycle event but never blocks on it:
// failures here must never affect trading logic or position state. A bounded
// mpsc queue decouples producers from the sink; when full, the oldest
// non-critical event (anything that isn't an exit or an error) is dropped to
// make room.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub enum NotificationEvent {
    BotStarted,
    BotStopped,
    TradeOpened { coin: String, qty: f64, price: f64 },
    TradeAdded { coin: String, qty: f64, price: f64 },
    PartialExit { coin: String, fraction: f64, reason: String },
    FullExit { coin: String, reason: String },
    Error { message: String },
    DailySummary { trades_today: u32, realized_pnl_today: f64 },
}

impl NotificationEvent {
    /// Critical events are never dropped when the queue is full.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            NotificationEvent::PartialExit { .. }
                | NotificationEvent::FullExit { .. }
                | NotificationEvent::Error { .. }
        )
    }
}

/// Object-safe sink trait; implementations absorb events quickly or drop
/// them after their own retry budget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &NotificationEvent);
}

/// Default sink: logs every event at `info` (or `error` for `Error`).
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn notify(&self, event: &NotificationEvent) {
        match event {
            NotificationEvent::Error { message } => error!(message, "notification: error"),
            other => info!(?other, "notification"),
        }
    }
}

/// Bounded-queue front end. Producers call `send` (non-blocking); a drain
/// task owns the receiver and forwards to the underlying `NotificationSink`.
pub struct NotificationQueue {
    sender: mpsc::Sender<NotificationEvent>,
}

impl NotificationQueue {
    /// Spawn the drain task and return the sender-side handle.
    pub fn spawn(sink: std::sync::Arc<dyn NotificationSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.notify(&event);
            }
        });

        Self { sender: tx }
    }

    /// Enqueue an event without blocking. If the queue is full and `event`
    /// is non-critical, it is dropped with a warning; critical events spin
    /// briefly via `try_send` retries before giving up.
    pub fn send(&self, event: NotificationEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.sender.try_send(event) {
            if event.is_critical() {
                warn!("notification queue full, critical event may be delayed");
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    let _ = sender.send(event).await;
                });
            } else {
                warn!("notification queue full, dropping non-critical event");
            }
        }
    }
}
