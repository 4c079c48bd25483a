//! Host document abstraction.
//!
//! Each open host window exposes one [`WallpaperDocument`]: a wallpaper
//! container plus the media elements mounted in it. The core never talks
//! to a UI toolkit directly; hosts implement these traits and register
//! their documents with a [`DocumentRegistry`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::models::{WallpaperConfig, WallpaperKind};

/// Identity of a host window's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentId(pub u64);

/// Identity of one mounted media element within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MediaId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_known(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

// ==================== 样式 ====================

/// Highest container opacity outside advanced mode.
pub const MAX_OPACITY: f32 = 0.8;

/// Style of the fixed, full-window wallpaper container.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStyle {
    /// 0.0..=1.0
    pub opacity: f32,
    pub z_index: i32,
    /// CSS filter chain.
    pub filter: String,
}

impl ContainerStyle {
    /// Advanced mode forces full opacity and z-index 0.
    pub fn for_config(config: &WallpaperConfig, advanced_mode: bool) -> Self {
        let (opacity, z_index) = if advanced_mode {
            (1.0, 0)
        } else {
            (((config.opacity / 100.0) as f32).min(MAX_OPACITY), config.z_index)
        };
        Self {
            opacity,
            z_index,
            filter: filter_css(config),
        }
    }
}

/// `blur(Npx) brightness(N%) contrast(N%)`
pub fn filter_css(config: &WallpaperConfig) -> String {
    format!(
        "blur({}px) brightness({}%) contrast({}%)",
        config.blur_radius, config.brightness, config.contrast
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectFit {
    Unset,
    Cover,
}

/// Per-element style of a media element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStyle {
    pub object_fit: ObjectFit,
    /// Named anchor, only set when repositioning.
    pub object_position: Option<String>,
    /// Crisp rendering hints for full-resolution uploads.
    pub high_quality: bool,
}

impl MediaStyle {
    pub fn for_config(config: &WallpaperConfig) -> Self {
        Self {
            object_fit: if config.use_object_fit {
                ObjectFit::Unset
            } else {
                ObjectFit::Cover
            },
            object_position: config.reposition.then(|| config.position.clone()),
            high_quality: config.quality,
        }
    }
}

/// Everything needed to build a media element off-document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaElementSpec {
    #[serde(rename = "type")]
    pub kind: WallpaperKind,
    /// Vault-relative path.
    pub path: String,
    /// Resolved resource URL.
    pub src: String,
    pub style: MediaStyle,
    /// Videos only: autoplay, looped, muted at this rate.
    pub playback_rate: Option<f64>,
    /// Starting opacity; 0 for crossfade-in.
    pub opacity: f32,
}

impl MediaElementSpec {
    pub fn for_config(config: &WallpaperConfig, src: String, opacity: f32) -> Self {
        Self {
            kind: config.kind,
            path: config.path.clone(),
            src,
            style: MediaStyle::for_config(config),
            playback_rate: (config.kind == WallpaperKind::Video).then_some(config.playback_speed),
            opacity,
        }
    }
}

/// Absolute placement of a media element inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

/// Cover-fit placement: the media covers the container on both axes, is
/// scaled by `scale` (never below cover), then shifted by `pos_x`/`pos_y`
/// percent of the overflow.
pub fn cover_placement(container: Size, media: Size, pos_x: f64, pos_y: f64, scale: f64) -> Placement {
    let cover = (container.width / media.width).max(container.height / media.height);
    let factor = (cover * scale).max(cover);
    let width = media.width * factor;
    let height = media.height * factor;
    let overflow_x = width - container.width;
    let overflow_y = height - container.height;
    Placement {
        width,
        height,
        left: -overflow_x * pos_x.clamp(0.0, 100.0) / 100.0,
        top: -overflow_y * pos_y.clamp(0.0, 100.0) / 100.0,
    }
}

// ==================== 文档 ====================

/// One host window's wallpaper surface.
pub trait WallpaperDocument: Send + Sync {
    fn id(&self) -> DocumentId;

    fn has_container(&self) -> bool;

    /// Insert an empty wallpaper container behind the host UI.
    fn create_container(&self, style: &ContainerStyle);

    /// Remove the container with all media in it.
    fn remove_container(&self);

    fn set_container_style(&self, style: &ContainerStyle);

    fn container_size(&self) -> Size;

    /// Append a media element to the container.
    fn mount_media(&self, spec: &MediaElementSpec) -> MediaId;

    /// Mounted media, oldest first.
    fn media_elements(&self) -> Vec<MediaId>;

    fn set_media_opacity(&self, media: MediaId, opacity: f32, transition: Option<Duration>);

    fn set_playback_rate(&self, media: MediaId, rate: f64);

    /// Intrinsic size once the element has loaded, `None` before.
    fn media_dimensions(&self, media: MediaId) -> Option<Size>;

    fn set_media_placement(&self, media: MediaId, placement: &Placement);

    fn remove_media(&self, media: MediaId);
}

pub type SharedDocument = Arc<dyn WallpaperDocument>;

/// Registry of the documents of every open host window.
#[derive(Default)]
pub struct DocumentRegistry {
    documents: RwLock<Vec<SharedDocument>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `doc`, replacing an entry with the same id.
    pub fn register(&self, doc: SharedDocument) {
        if let Ok(mut docs) = self.documents.write() {
            let id = doc.id();
            docs.retain(|d| d.id() != id);
            docs.push(doc);
        }
    }

    pub fn unregister(&self, id: DocumentId) -> Option<SharedDocument> {
        let mut docs = self.documents.write().ok()?;
        let pos = docs.iter().position(|d| d.id() == id)?;
        Some(docs.remove(pos))
    }

    pub fn get(&self, id: DocumentId) -> Option<SharedDocument> {
        self.documents
            .read()
            .ok()?
            .iter()
            .find(|d| d.id() == id)
            .cloned()
    }

    /// Snapshot of all tracked documents.
    pub fn all(&self) -> Vec<SharedDocument> {
        self.documents
            .read()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) -> Vec<SharedDocument> {
        self.documents
            .write()
            .map(|mut docs| std::mem::take(&mut *docs))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==================== 文件选择 ====================

/// A file chosen by the user, read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Host file dialog.
pub trait FilePicker: Send + Sync {
    /// One file, `None` when cancelled.
    fn pick_file(&self) -> Option<PickedFile>;

    /// All files of a chosen folder, `None` when cancelled.
    fn pick_folder(&self) -> Option<Vec<PickedFile>>;
}

pub type SharedFilePicker = Arc<dyn FilePicker>;

/// Picker that hands out a preloaded queue of files.
#[derive(Debug, Default)]
pub struct QueuedFilePicker {
    queue: Mutex<VecDeque<PickedFile>>,
}

impl QueuedFilePicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, file: PickedFile) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(file);
        }
    }
}

impl FilePicker for QueuedFilePicker {
    fn pick_file(&self) -> Option<PickedFile> {
        self.queue.lock().ok()?.pop_front()
    }

    fn pick_folder(&self) -> Option<Vec<PickedFile>> {
        let mut queue = self.queue.lock().ok()?;
        if queue.is_empty() {
            return None;
        }
        Some(queue.drain(..).collect())
    }
}

// ==================== 内存文档 ====================

/// A mounted element of a [`MemoryDocument`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMedia {
    pub id: MediaId,
    pub spec: MediaElementSpec,
    pub opacity: f32,
    pub transition: Option<Duration>,
    pub playback_rate: Option<f64>,
    pub placement: Option<Placement>,
}

#[derive(Debug, Default)]
struct MemoryState {
    container: Option<ContainerStyle>,
    media: Vec<MemoryMedia>,
    next_media: u64,
}

/// Headless document keeping the wallpaper tree in memory.
#[derive(Debug)]
pub struct MemoryDocument {
    id: DocumentId,
    size: Size,
    intrinsic: Option<Size>,
    state: Mutex<MemoryState>,
}

impl MemoryDocument {
    pub fn new(id: u64) -> Self {
        Self {
            id: DocumentId(id),
            size: Size::new(1920.0, 1080.0),
            intrinsic: Some(Size::new(1280.0, 720.0)),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    /// Intrinsic size every mounted element reports; `None` never loads.
    pub fn with_intrinsic_size(mut self, size: Option<Size>) -> Self {
        self.intrinsic = size;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn container_style(&self) -> Option<ContainerStyle> {
        self.state.lock().ok()?.container.clone()
    }

    pub fn media(&self) -> Vec<MemoryMedia> {
        self.state
            .lock()
            .map(|s| s.media.clone())
            .unwrap_or_default()
    }

    pub fn media_count(&self) -> usize {
        self.state.lock().map(|s| s.media.len()).unwrap_or(0)
    }

    /// Most recently mounted element.
    pub fn newest_media(&self) -> Option<MemoryMedia> {
        self.state.lock().ok()?.media.last().cloned()
    }

    fn with_media<F: FnOnce(&mut MemoryMedia)>(&self, media: MediaId, f: F) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(m) = state.media.iter_mut().find(|m| m.id == media) {
                f(m);
            }
        }
    }
}

impl WallpaperDocument for MemoryDocument {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn has_container(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.container.is_some())
            .unwrap_or(false)
    }

    fn create_container(&self, style: &ContainerStyle) {
        if let Ok(mut state) = self.state.lock() {
            state.container = Some(style.clone());
            state.media.clear();
        }
    }

    fn remove_container(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.container = None;
            state.media.clear();
        }
    }

    fn set_container_style(&self, style: &ContainerStyle) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(container) = state.container.as_mut() {
                *container = style.clone();
            }
        }
    }

    fn container_size(&self) -> Size {
        self.size
    }

    fn mount_media(&self, spec: &MediaElementSpec) -> MediaId {
        let Ok(mut state) = self.state.lock() else {
            return MediaId(0);
        };
        state.next_media += 1;
        let id = MediaId(state.next_media);
        state.media.push(MemoryMedia {
            id,
            spec: spec.clone(),
            opacity: spec.opacity,
            transition: None,
            playback_rate: spec.playback_rate,
            placement: None,
        });
        id
    }

    fn media_elements(&self) -> Vec<MediaId> {
        self.state
            .lock()
            .map(|s| s.media.iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }

    fn set_media_opacity(&self, media: MediaId, opacity: f32, transition: Option<Duration>) {
        self.with_media(media, |m| {
            m.opacity = opacity;
            m.transition = transition;
        });
    }

    fn set_playback_rate(&self, media: MediaId, rate: f64) {
        self.with_media(media, |m| {
            if m.spec.kind == WallpaperKind::Video {
                m.playback_rate = Some(rate);
            }
        });
    }

    fn media_dimensions(&self, media: MediaId) -> Option<Size> {
        let state = self.state.lock().ok()?;
        state.media.iter().find(|m| m.id == media)?;
        self.intrinsic
    }

    fn set_media_placement(&self, media: MediaId, placement: &Placement) {
        let placement = *placement;
        self.with_media(media, |m| m.placement = Some(placement));
    }

    fn remove_media(&self, media: MediaId) {
        if let Ok(mut state) = self.state.lock() {
            state.media.retain(|m| m.id != media);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_style_opacity_cap() {
        let config = WallpaperConfig {
            opacity: 95.0,
            z_index: 7,
            ..WallpaperConfig::default()
        };
        let style = ContainerStyle::for_config(&config, false);
        assert_eq!(style.opacity, MAX_OPACITY);
        assert_eq!(style.z_index, 7);
        assert_eq!(style.filter, "blur(8px) brightness(100%) contrast(100%)");

        let advanced = ContainerStyle::for_config(&config, true);
        assert_eq!(advanced.opacity, 1.0);
        assert_eq!(advanced.z_index, 0);
    }

    #[test]
    fn test_media_style() {
        let config = WallpaperConfig {
            use_object_fit: false,
            reposition: true,
            position: "Top".to_string(),
            ..WallpaperConfig::default()
        };
        let style = MediaStyle::for_config(&config);
        assert_eq!(style.object_fit, ObjectFit::Cover);
        assert_eq!(style.object_position.as_deref(), Some("Top"));

        let plain = MediaStyle::for_config(&WallpaperConfig::default());
        assert_eq!(plain.object_fit, ObjectFit::Unset);
        assert_eq!(plain.object_position, None);
    }

    #[test]
    fn test_cover_placement() {
        let container = Size::new(1000.0, 500.0);
        let media = Size::new(500.0, 500.0);

        // cover factor is 2 -> 1000x1000, overflow only on y
        let centered = cover_placement(container, media, 50.0, 50.0, 1.0);
        assert_eq!(centered.width, 1000.0);
        assert_eq!(centered.height, 1000.0);
        assert_eq!(centered.left, 0.0);
        assert_eq!(centered.top, -250.0);

        // scale below 1 never drops under cover
        let shrunk = cover_placement(container, media, 0.0, 100.0, 0.5);
        assert_eq!(shrunk.width, 1000.0);
        assert_eq!(shrunk.top, -500.0);

        let zoomed = cover_placement(container, media, 100.0, 0.0, 1.5);
        assert_eq!(zoomed.width, 1500.0);
        assert_eq!(zoomed.left, -500.0);
        assert_eq!(zoomed.top, 0.0);
    }

    #[test]
    fn test_registry_register_replaces_same_id() {
        let registry = DocumentRegistry::new();
        registry.register(MemoryDocument::new(1).shared());
        registry.register(MemoryDocument::new(2).shared());
        registry.register(MemoryDocument::new(1).shared());
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(DocumentId(1)).is_some());
        assert!(registry.unregister(DocumentId(1)).is_none());
        assert!(registry.get(DocumentId(2)).is_some());
        assert_eq!(registry.clear().len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_queued_picker() {
        let picker = QueuedFilePicker::new();
        assert!(picker.pick_file().is_none());
        picker.push(PickedFile::new("a.png", vec![1]));
        picker.push(PickedFile::new("b.png", vec![2]));
        assert_eq!(picker.pick_file().unwrap().name, "a.png");
        assert_eq!(picker.pick_folder().unwrap().len(), 1);
        assert!(picker.pick_folder().is_none());
    }
}
