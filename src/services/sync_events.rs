//! Host signalling.
//!
//! The notifier announces new unread notifications through an
//! [`EventEmitter`]. The desktop shell implements it on its app handle; the
//! headless binary logs the event instead.

use crate::error::AppError;
use serde::Serialize;
use std::sync::Mutex;

/// Event: UNREAD_NOTIFICATIONS
/// Emitted once per notifier pass that created at least one notification.
pub const UNREAD_NOTIFICATIONS_EVENT: &str = "UNREAD_NOTIFICATIONS";

/// Payload for UNREAD_NOTIFICATIONS events. Consumers may ignore it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadNotificationsPayload {
    /// Number of notifications created by the pass.
    pub created: u64,
}

/// Sink for named host events.
pub trait EventEmitter: Send + Sync {
    fn emit_event(&self, event: &str, payload: serde_json::Value) -> Result<(), AppError>;
}

/// Emitter that only writes the event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmitter;

impl EventEmitter for LogEmitter {
    fn emit_event(&self, event: &str, payload: serde_json::Value) -> Result<(), AppError> {
        log::info!("[notify] Event {} {}", event, payload);
        Ok(())
    }
}

/// Emitter that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the recorded events, oldest first.
    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|(name, _)| name == event).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit_event(&self, event: &str, payload: serde_json::Value) -> Result<(), AppError> {
        self.events
            .lock()
            .map_err(|_| AppError::internal("Event recorder poisoned"))?
            .push((event.to_string(), payload));
        Ok(())
    }
}

#[cfg(feature = "desktop")]
impl<R: tauri::Runtime> EventEmitter for tauri::AppHandle<R> {
    fn emit_event(&self, event: &str, payload: serde_json::Value) -> Result<(), AppError> {
        use tauri::Emitter;

        self.emit(event, payload)
            .map_err(|e| AppError::internal(format!("Failed to emit {}: {}", event, e)))
    }
}
