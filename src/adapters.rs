//! Host adapters for backdrop-core traits
//!
//! The host's settings UI runs on its own event loop, so core events are
//! forwarded over a channel and drained there.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use backdrop_core::events::EventSink;
use backdrop_core::host::{FilePicker, PickedFile};

/// One event as the settings UI receives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

pub type HostEventReceiver = mpsc::UnboundedReceiver<HostEvent>;

/// EventSink forwarding every event into an unbounded channel.
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver the host drains.
    pub fn new() -> (Self, HostEventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Create a shared EventSink and its receiver.
    pub fn shared() -> (Arc<dyn EventSink>, HostEventReceiver) {
        let (sink, receiver) = Self::new();
        (Arc::new(sink), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event_name: &str, payload_json: &str) {
        // Parse the JSON and forward as a raw value to preserve structure
        let payload = serde_json::from_str::<serde_json::Value>(payload_json)
            .unwrap_or_else(|_| serde_json::Value::String(payload_json.to_string()));
        if self
            .sender
            .send(HostEvent {
                name: event_name.to_string(),
                payload,
            })
            .is_err()
        {
            tracing::debug!(event = event_name, "事件接收端已关闭");
        }
    }
}

/// FilePicker reading files the host's native dialog selected.
///
/// The host records the selection with [`DiskFilePicker::select`] before
/// invoking the upload command.
#[derive(Debug, Default)]
pub struct DiskFilePicker {
    selection: std::sync::Mutex<Vec<PathBuf>>,
}

impl DiskFilePicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending selection.
    pub fn select(&self, paths: Vec<PathBuf>) {
        if let Ok(mut selection) = self.selection.lock() {
            *selection = paths;
        }
    }

    fn take(&self) -> Vec<PathBuf> {
        self.selection
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }
}

fn read_picked(path: &PathBuf) -> Option<PickedFile> {
    let name = path.file_name()?.to_str()?.to_string();
    match std::fs::read(path) {
        Ok(bytes) => Some(PickedFile::new(name, bytes)),
        Err(e) => {
            tracing::warn!(path = ?path, "无法读取所选文件: {}", e);
            None
        }
    }
}

impl FilePicker for DiskFilePicker {
    fn pick_file(&self) -> Option<PickedFile> {
        self.take().first().and_then(read_picked)
    }

    fn pick_folder(&self) -> Option<Vec<PickedFile>> {
        let dirs = self.take();
        let dir = dirs.first()?;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = ?dir, "无法读取所选文件夹: {}", e);
                return None;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        Some(paths.iter().filter_map(read_picked).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backdrop_core::events::{names, EventSinkExt, NoticeEvent};
    use tempfile::TempDir;

    #[test]
    fn test_channel_sink_forwards_json() {
        let (sink, mut receiver) = ChannelEventSink::new();
        sink.emit_typed(names::WALLPAPER_NOTICE, &NoticeEvent::new("hi"));
        sink.emit("raw", "not json");

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.name, names::WALLPAPER_NOTICE);
        assert_eq!(first.payload["message"], "hi");

        let second = receiver.try_recv().unwrap();
        assert_eq!(second.payload, serde_json::Value::String("not json".into()));
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, receiver) = ChannelEventSink::new();
        drop(receiver);
        sink.emit("x", "{}");
    }

    #[test]
    fn test_disk_picker_reads_selection_once() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.png");
        std::fs::write(&file, b"png").unwrap();

        let picker = DiskFilePicker::new();
        assert!(picker.pick_file().is_none());

        picker.select(vec![file]);
        let picked = picker.pick_file().unwrap();
        assert_eq!(picked.name, "a.png");
        assert_eq!(picked.bytes, b"png");
        assert!(picker.pick_file().is_none());
    }

    #[test]
    fn test_disk_picker_reads_folder() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.gif"), b"1").unwrap();
        std::fs::write(tmp.path().join("a.png"), b"2").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();

        let picker = DiskFilePicker::new();
        picker.select(vec![tmp.path().to_path_buf()]);
        let files = picker.pick_folder().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.gif"]);
    }
}
