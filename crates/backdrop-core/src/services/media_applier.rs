//! 壁纸媒体切换
//!
//! Per-document state machine: `Empty -> Mounted -> Swapping -> Mounted`.
//! Container style is written synchronously before any media work starts,
//! so a caller reading the style right after `apply` sees the final values
//! while the new element may still be fading in. The fade itself runs on
//! its own task, so dropping an `apply` future never strands a half-mounted
//! element.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::host::{
    cover_placement, ContainerStyle, DocumentId, MediaElementSpec, MediaId, SharedDocument, Size,
};
use crate::models::{WallpaperConfig, WallpaperKind};
use crate::vault::SharedVault;

/// One animation frame.
pub const FRAME: Duration = Duration::from_millis(16);
/// Extra wait after the first frame before fading in.
pub const SETTLE_DELAY: Duration = Duration::from_millis(20);
/// Opacity transition of the crossfade.
pub const CROSSFADE: Duration = Duration::from_secs(1);
/// Delay before replaced elements are removed.
pub const CLEANUP_DELAY: Duration = Duration::from_secs(3);
/// Longest wait for intrinsic media dimensions.
pub const DIMENSIONS_TIMEOUT: Duration = Duration::from_secs(2);

/// Identity of displayed media: path plus type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaKey {
    pub path: String,
    pub kind: WallpaperKind,
}

impl MediaKey {
    pub fn of(config: &WallpaperConfig) -> Self {
        Self {
            path: config.path.clone(),
            kind: config.kind,
        }
    }
}

/// Media state of one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MediaState {
    #[default]
    Empty,
    Mounted(MediaKey),
    /// A new element is mounted and waiting to fade in.
    Swapping { from: Option<MediaKey>, to: MediaKey },
}

impl MediaState {
    /// The media this document shows or is about to show.
    pub fn target(&self) -> Option<&MediaKey> {
        match self {
            MediaState::Empty => None,
            MediaState::Mounted(key) => Some(key),
            MediaState::Swapping { to, .. } => Some(to),
        }
    }
}

/// What `apply` did to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Config has no path; document untouched.
    NoPath,
    /// Same media; only styles were updated.
    Restyled,
    /// Container and media built from scratch.
    Built,
    /// New media crossfaded in.
    Swapped,
    /// Backing file is gone; existing media left in place.
    MissingFile,
}

#[derive(Default)]
struct DocumentState {
    state: MediaState,
    generation: u64,
    cleanup: Option<JoinHandle<()>>,
    /// Fade task of the newest swap.
    fade: Option<JoinHandle<()>>,
}

impl DocumentState {
    fn cancel_cleanup(&mut self) {
        if let Some(handle) = self.cleanup.take() {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_cleanup();
        if let Some(handle) = self.fade.take() {
            handle.abort();
        }
    }

    /// The state, except that a swap whose fade task is gone counts as
    /// showing nothing known.
    fn live_state(&self) -> MediaState {
        match &self.state {
            MediaState::Swapping { .. } if self.fade.as_ref().map_or(true, |h| h.is_finished()) => {
                MediaState::Empty
            }
            state => state.clone(),
        }
    }
}

type DocumentStates = Arc<Mutex<HashMap<DocumentId, DocumentState>>>;

/// 媒体切换器
pub struct MediaApplier {
    vault: SharedVault,
    last: Mutex<Option<MediaKey>>,
    documents: DocumentStates,
}

impl MediaApplier {
    pub fn new(vault: SharedVault) -> Self {
        Self {
            vault,
            last: Mutex::new(None),
            documents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Media last applied across all windows.
    pub fn last(&self) -> Option<MediaKey> {
        self.last.lock().ok()?.clone()
    }

    /// Record `key` as applied. Called once every window has been handled.
    pub fn commit(&self, key: Option<MediaKey>) {
        if let Ok(mut last) = self.last.lock() {
            *last = key;
        }
    }

    pub fn state_of(&self, doc: DocumentId) -> MediaState {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(&doc).map(|d| d.state.clone()))
            .unwrap_or_default()
    }

    fn live_state_of(&self, doc: DocumentId) -> MediaState {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(&doc).map(DocumentState::live_state))
            .unwrap_or_default()
    }

    /// Apply `config` to one document.
    pub async fn apply(
        &self,
        doc: &SharedDocument,
        config: &WallpaperConfig,
        advanced_mode: bool,
    ) -> ApplyOutcome {
        if !config.has_path() {
            tracing::debug!(doc = doc.id().0, "未设置壁纸路径，跳过");
            return ApplyOutcome::NoPath;
        }

        let key = MediaKey::of(config);
        let style = ContainerStyle::for_config(config, advanced_mode);
        let elements = doc.media_elements();

        if !doc.has_container() || elements.is_empty() {
            return self.build(doc, config, key, &style).await;
        }

        doc.set_container_style(&style);
        let current = self.live_state_of(doc.id());
        let newest = elements.last().copied();

        if let (Some(media), Some(shown)) = (newest, current.target()) {
            if shown.kind == WallpaperKind::Video {
                doc.set_playback_rate(media, config.playback_speed);
            }
        }

        let outcome = if current.target() == Some(&key) {
            ApplyOutcome::Restyled
        } else {
            self.swap(doc, config, key, current.target().cloned()).await
        };

        if outcome != ApplyOutcome::MissingFile && config.reposition {
            if let Some(media) = doc.media_elements().last().copied() {
                self.reposition(doc, media, config).await;
            }
        }
        outcome
    }

    /// `Empty -> Mounted`: replace whatever is there with a fresh container.
    async fn build(
        &self,
        doc: &SharedDocument,
        config: &WallpaperConfig,
        key: MediaKey,
        style: &ContainerStyle,
    ) -> ApplyOutcome {
        if !self.vault.exists(&config.path) {
            tracing::warn!(path = %config.path, "壁纸文件不存在");
            return ApplyOutcome::MissingFile;
        }

        doc.remove_container();
        doc.create_container(style);
        let spec = MediaElementSpec::for_config(config, self.vault.resource_url(&config.path), 1.0);
        let media = doc.mount_media(&spec);

        if let Ok(mut docs) = self.documents.lock() {
            let entry = docs.entry(doc.id()).or_default();
            entry.cancel_all();
            entry.generation += 1;
            entry.state = MediaState::Mounted(key);
        }
        tracing::debug!(doc = doc.id().0, path = %config.path, "壁纸已创建");

        if config.reposition {
            self.reposition(doc, media, config).await;
        }
        ApplyOutcome::Built
    }

    /// `Mounted -> Swapping -> Mounted(new)` with a crossfade.
    ///
    /// A swap requested while another is in flight starts a new generation.
    /// The older one skips its fade, and only the newest schedules cleanup.
    async fn swap(
        &self,
        doc: &SharedDocument,
        config: &WallpaperConfig,
        key: MediaKey,
        from: Option<MediaKey>,
    ) -> ApplyOutcome {
        if !self.vault.exists(&config.path) {
            tracing::warn!(path = %config.path, "壁纸文件不存在，保留当前壁纸");
            return ApplyOutcome::MissingFile;
        }

        let spec = MediaElementSpec::for_config(config, self.vault.resource_url(&config.path), 0.0);
        let (done, faded) = oneshot::channel();
        {
            let mut docs = self.documents.lock().unwrap_or_else(|p| p.into_inner());
            let entry = docs.entry(doc.id()).or_default();
            entry.cancel_cleanup();
            entry.generation += 1;
            entry.state = MediaState::Swapping {
                from,
                to: key.clone(),
            };

            let media = doc.mount_media(&spec);
            doc.set_media_opacity(media, 0.0, Some(CROSSFADE));
            entry.fade = Some(tokio::spawn(fade_in(
                self.documents.clone(),
                doc.clone(),
                media,
                key,
                entry.generation,
                done,
            )));
        }

        if faded.await.is_err() {
            tracing::debug!(doc = doc.id().0, "切换已被更新的请求取代");
        }
        ApplyOutcome::Swapped
    }

    async fn reposition(&self, doc: &SharedDocument, media: MediaId, config: &WallpaperConfig) {
        let Some(intrinsic) = wait_for_dimensions(doc, media).await else {
            tracing::debug!(doc = doc.id().0, "媒体尺寸未知，跳过定位");
            return;
        };
        let placement = cover_placement(
            doc.container_size(),
            intrinsic,
            config.position_x,
            config.position_y,
            config.scale,
        );
        doc.set_media_placement(media, &placement);
    }

    /// Remove the wallpaper from `doc` and forget its state.
    pub fn unmount(&self, doc: &SharedDocument) {
        self.forget(doc.id());
        doc.remove_container();
    }

    /// Drop state for a closed document, cancelling its pending cleanup.
    pub fn forget(&self, doc: DocumentId) {
        if let Ok(mut docs) = self.documents.lock() {
            if let Some(mut entry) = docs.remove(&doc) {
                entry.cancel_all();
            }
        }
    }
}

/// Poll once per frame until the element reports its size, up to
/// [`DIMENSIONS_TIMEOUT`].
async fn wait_for_dimensions(doc: &SharedDocument, media: MediaId) -> Option<Size> {
    let poll = async {
        loop {
            if let Some(size) = doc.media_dimensions(media).filter(Size::is_known) {
                return size;
            }
            tokio::time::sleep(FRAME).await;
        }
    };
    tokio::time::timeout(DIMENSIONS_TIMEOUT, poll).await.ok()
}

/// Crossfade `media` in once it has a frame and its size, unless a newer
/// generation took over meanwhile.
async fn fade_in(
    documents: DocumentStates,
    doc: SharedDocument,
    media: MediaId,
    key: MediaKey,
    generation: u64,
    done: oneshot::Sender<()>,
) {
    tokio::time::sleep(FRAME).await;
    tokio::time::sleep(SETTLE_DELAY).await;
    wait_for_dimensions(&doc, media).await;

    let Ok(mut docs) = documents.lock() else {
        return;
    };
    let Some(entry) = docs
        .get_mut(&doc.id())
        .filter(|entry| entry.generation == generation)
    else {
        return;
    };

    for old in doc.media_elements().into_iter().filter(|m| *m != media) {
        doc.set_media_opacity(old, 0.0, Some(CROSSFADE));
    }
    doc.set_media_opacity(media, 1.0, Some(CROSSFADE));
    entry.cleanup = Some(spawn_cleanup(doc.clone(), media));
    entry.fade = None;
    tracing::debug!(doc = doc.id().0, path = %key.path, "壁纸已切换");
    entry.state = MediaState::Mounted(key);
    drop(docs);
    let _ = done.send(());
}

fn spawn_cleanup(doc: SharedDocument, keep: MediaId) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(CLEANUP_DELAY).await;
        for old in doc.media_elements().into_iter().filter(|m| *m != keep) {
            doc.remove_media(old);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryDocument, WallpaperDocument};
    use crate::vault::{LocalVault, Vault};
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        applier: MediaApplier,
    }

    fn fixture(files: &[&str]) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let vault = LocalVault::new(tmp.path().to_path_buf());
        vault.mkdir("w").unwrap();
        for file in files {
            vault.write_binary(&format!("w/{file}"), b"x").unwrap();
        }
        Fixture {
            _tmp: tmp,
            applier: MediaApplier::new(Arc::new(vault)),
        }
    }

    fn config(file: &str) -> WallpaperConfig {
        WallpaperConfig {
            path: format!("w/{file}"),
            kind: crate::services::wallpaper_kind_for(file),
            ..WallpaperConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_from_empty() {
        let f = fixture(&["a.png"]);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();

        let outcome = f.applier.apply(&doc, &config("a.png"), false).await;
        assert_eq!(outcome, ApplyOutcome::Built);
        assert_eq!(mem.media_count(), 1);
        assert_eq!(mem.newest_media().unwrap().opacity, 1.0);
        assert_eq!(mem.container_style().unwrap().opacity, 0.4);
        assert_eq!(
            f.applier.state_of(doc.id()),
            MediaState::Mounted(MediaKey::of(&config("a.png")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_crossfades_and_cleans_up() {
        let f = fixture(&["a.png", "b.mp4"]);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();

        f.applier.apply(&doc, &config("a.png"), false).await;
        let outcome = f.applier.apply(&doc, &config("b.mp4"), false).await;
        assert_eq!(outcome, ApplyOutcome::Swapped);

        let media = mem.media();
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].opacity, 0.0);
        assert_eq!(media[1].opacity, 1.0);
        assert_eq!(media[1].transition, Some(CROSSFADE));
        assert_eq!(media[1].playback_rate, Some(1.0));

        tokio::time::sleep(CLEANUP_DELAY + Duration::from_millis(100)).await;
        let media = mem.media();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].spec.path, "w/b.mp4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_swaps_leave_newest() {
        let f = fixture(&["a.png", "b.png", "c.png"]);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();

        f.applier.apply(&doc, &config("a.png"), false).await;
        let (second, third) = (config("b.png"), config("c.png"));
        let (b, c) = tokio::join!(
            f.applier.apply(&doc, &second, false),
            f.applier.apply(&doc, &third, false),
        );
        assert_eq!(b, ApplyOutcome::Swapped);
        assert_eq!(c, ApplyOutcome::Swapped);

        tokio::time::sleep(CLEANUP_DELAY + Duration::from_millis(100)).await;
        let media = mem.media();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].spec.path, "w/c.png");
        assert_eq!(media[0].opacity, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_apply_still_finishes_swap() {
        let Fixture { _tmp: tmp, applier } = fixture(&["a.png", "b.png"]);
        let applier = Arc::new(applier);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();
        applier.apply(&doc, &config("a.png"), false).await;

        let task = {
            let applier = applier.clone();
            let doc = doc.clone();
            tokio::spawn(async move { applier.apply(&doc, &config("b.png"), false).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        task.abort();
        assert!(task.await.is_err());

        let outcome = applier.apply(&doc, &config("b.png"), false).await;
        assert_eq!(outcome, ApplyOutcome::Restyled);

        tokio::time::sleep(CLEANUP_DELAY * 3).await;
        let media = mem.media();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].spec.path, "w/b.png");
        assert_eq!(media[0].opacity, 1.0);
        assert_eq!(
            applier.state_of(doc.id()),
            MediaState::Mounted(MediaKey::of(&config("b.png")))
        );
        drop(tmp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_keeps_old_element() {
        let f = fixture(&["a.png"]);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();

        f.applier.apply(&doc, &config("a.png"), false).await;
        let before = mem.media();

        let outcome = f.applier.apply(&doc, &config("gone.png"), false).await;
        assert_eq!(outcome, ApplyOutcome::MissingFile);
        assert_eq!(mem.media(), before);

        let empty = MemoryDocument::new(2).shared();
        let empty_doc: SharedDocument = empty.clone();
        let outcome = f.applier.apply(&empty_doc, &config("gone.png"), false).await;
        assert_eq!(outcome, ApplyOutcome::MissingFile);
        assert_eq!(empty.media_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restyle_updates_container_synchronously() {
        let f = fixture(&["a.png"]);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();
        f.applier.apply(&doc, &config("a.png"), false).await;

        let mut edited = config("a.png");
        edited.opacity = 60.0;
        edited.blur_radius = 2.0;
        let outcome = f.applier.apply(&doc, &edited, true).await;
        assert_eq!(outcome, ApplyOutcome::Restyled);
        assert_eq!(mem.media_count(), 1);

        let style = mem.container_style().unwrap();
        assert_eq!(style.opacity, 1.0);
        assert_eq!(style.z_index, 0);
        assert_eq!(style.filter, "blur(2px) brightness(100%) contrast(100%)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_path_is_noop() {
        let f = fixture(&[]);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();
        let outcome = f.applier.apply(&doc, &WallpaperConfig::default(), false).await;
        assert_eq!(outcome, ApplyOutcome::NoPath);
        assert!(!mem.has_container());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reposition_uses_cover_math() {
        let f = fixture(&["a.png"]);
        let mem = MemoryDocument::new(1)
            .with_size(Size::new(1000.0, 500.0))
            .with_intrinsic_size(Some(Size::new(500.0, 500.0)))
            .shared();
        let doc: SharedDocument = mem.clone();

        let mut positioned = config("a.png");
        positioned.reposition = true;
        positioned.position_y = 100.0;
        f.applier.apply(&doc, &positioned, false).await;

        let placement = mem.newest_media().unwrap().placement.unwrap();
        assert_eq!(placement.width, 1000.0);
        assert_eq!(placement.top, -500.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reposition_gives_up_after_timeout() {
        let f = fixture(&["a.png"]);
        let mem = MemoryDocument::new(1).with_intrinsic_size(None).shared();
        let doc: SharedDocument = mem.clone();

        let mut positioned = config("a.png");
        positioned.reposition = true;
        let started = tokio::time::Instant::now();
        f.applier.apply(&doc, &positioned, false).await;

        assert!(started.elapsed() >= DIMENSIONS_TIMEOUT);
        assert!(mem.newest_media().unwrap().placement.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_cleanup() {
        let f = fixture(&["a.png", "b.png"]);
        let mem = MemoryDocument::new(1).shared();
        let doc: SharedDocument = mem.clone();

        f.applier.apply(&doc, &config("a.png"), false).await;
        f.applier.apply(&doc, &config("b.png"), false).await;
        f.applier.unmount(&doc);

        assert!(!mem.has_container());
        assert_eq!(f.applier.state_of(doc.id()), MediaState::Empty);
        tokio::time::sleep(CLEANUP_DELAY * 2).await;
        assert_eq!(mem.media_count(), 0);
    }

    #[test]
    fn test_commit_tracks_last_media() {
        let f = fixture(&[]);
        assert!(f.applier.last().is_none());
        f.applier.commit(Some(MediaKey::of(&config("a.png"))));
        assert_eq!(f.applier.last().unwrap().path, "w/a.png");
    }
}
