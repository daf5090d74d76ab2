//! # Event Stream Module
//!
//! Canale unidirezionale worker -> front end.
//!
//! ## Tipi di messaggi:
//! - `log`: una riga di log (info o error)
//! - `progress`: file completati / totale
//! - `complete`: evento terminale `{success, exit_code}`, emesso una sola volta
//!
//! Il canale è bounded: se il consumer è lento il worker attende invece di
//! accumulare output in memoria.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// Event emitted by a running batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizeEvent {
    Log { level: LogLevel, message: String },
    Progress { current: usize, total: usize },
    Complete { success: bool, exit_code: i32 },
}

impl OptimizeEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Log { level: LogLevel::Error, .. })
    }
}

/// Create a bounded event channel
pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<OptimizeEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, rx)
}

/// Sending half of the event stream
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<OptimizeEvent>,
}

impl EventSink {
    pub async fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message).await;
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.send(OptimizeEvent::Log {
            level,
            message: message.into(),
        })
        .await;
    }

    pub async fn progress(&self, current: usize, total: usize) {
        self.send(OptimizeEvent::Progress { current, total }).await;
    }

    /// Terminal event. Consumes the sink so nothing can follow it from this handle.
    pub async fn complete(self, success: bool, exit_code: i32) {
        self.send(OptimizeEvent::Complete { success, exit_code }).await;
    }

    async fn send(&self, event: OptimizeEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }
}
