//! Event emission abstraction.
//!
//! The core reports applied wallpapers, self-healed paths and user notices
//! through an [`EventSink`] the host supplies.

use std::sync::Arc;

use serde::Serialize;

use crate::models::{HistoryEntry, WallpaperKind};

/// 事件名称
pub mod names {
    pub const WALLPAPER_APPLIED: &str = "wallpaper:applied";
    pub const WALLPAPER_MISSING: &str = "wallpaper:missing";
    pub const WALLPAPER_NOTICE: &str = "wallpaper:notice";
    pub const SETTINGS_CHANGED: &str = "settings:changed";
    pub const HISTORY_CHANGED: &str = "history:changed";
}

/// Trait for emitting events to the settings UI.
pub trait EventSink: Send + Sync {
    /// Emit an event with the given name and JSON payload.
    ///
    /// # Arguments
    /// * `event_name` - The name of the event (e.g., "wallpaper:applied")
    /// * `payload_json` - JSON-serialized payload string
    fn emit(&self, event_name: &str, payload_json: &str);
}

/// Extension trait for EventSink that provides typed emit functionality.
pub trait EventSinkExt {
    /// Emit an event with a typed payload that will be serialized to JSON.
    fn emit_typed<T: Serialize>(&self, event_name: &str, payload: &T);
}

impl<S: EventSink + ?Sized> EventSinkExt for S {
    fn emit_typed<T: Serialize>(&self, event_name: &str, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(json) => self.emit(event_name, &json),
            Err(e) => {
                tracing::error!("Failed to serialize event payload: {}", e);
            }
        }
    }
}

/// Shared reference to an EventSink implementation.
pub type SharedEventSink = Arc<dyn EventSink>;

/// No-op event sink for testing or when events are not needed.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event_name: &str, _payload_json: &str) {}
}

// ==================== 事件负载 ====================

/// `wallpaper:applied`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperAppliedEvent {
    pub slot: usize,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: WallpaperKind,
    pub documents: usize,
}

/// `wallpaper:missing`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperMissingEvent {
    pub slot: usize,
    pub path: String,
}

/// `wallpaper:notice`
#[derive(Debug, Clone, Serialize)]
pub struct NoticeEvent {
    pub message: String,
}

impl NoticeEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `history:changed`
#[derive(Debug, Clone, Serialize)]
pub struct HistoryChangedEvent {
    pub entries: Vec<HistoryEntry>,
}
