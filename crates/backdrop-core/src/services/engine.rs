//! 壁纸引擎
//!
//! Ties the config store, file lifecycle, media applier and watcher to the
//! host collaborators held by [`BackdropCore`]. Every public operation of the
//! settings UI goes through [`Backdrop`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::events::{
    names, EventSinkExt, HistoryChangedEvent, NoticeEvent, WallpaperAppliedEvent,
    WallpaperMissingEvent,
};
use crate::host::{DocumentId, PickedFile, SharedDocument};
use crate::models::{
    BackdropSettings, HistoryEntry, ScheduleOptions, WallpaperConfig, AUTO_SWITCH_START,
};
use crate::paths::WallpaperLayout;
use crate::scheduler::{interval_duration, validate_options, ScheduleMode};
use crate::services::config_store::{ResolvedWallpaper, WallpaperConfigStore};
use crate::services::file_lifecycle::{validate_upload, FileLifecycleManager, StoredWallpaper};
use crate::services::history::HistoryList;
use crate::services::media_applier::{ApplyOutcome, MediaApplier, MediaKey};
use crate::services::settings::SettingsManager;
use crate::services::watcher::WallpaperWatcher;
use crate::utils::{AppError, AppResult, Debouncer};
use crate::vault::remove_quietly;
use crate::BackdropCore;

/// Quiet period for slider-driven apply and save.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Used when the persisted interval cannot be parsed.
const FALLBACK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Mutable plugin state, guarded by one lock.
struct Session {
    store: WallpaperConfigStore,
    history: HistoryList,
    settings: BackdropSettings,
    current: ResolvedWallpaper,
}

/// 壁纸引擎
pub struct Backdrop {
    this: Weak<Backdrop>,
    core: BackdropCore,
    settings_manager: SettingsManager,
    files: FileLifecycleManager,
    applier: MediaApplier,
    watcher: WallpaperWatcher,
    session: Mutex<Session>,
    upload_lock: Mutex<()>,
    apply_debounce: Debouncer,
    save_debounce: Debouncer,
}

impl Backdrop {
    /// Load settings and prepare the engine.
    ///
    /// A settings file that cannot be read falls back to defaults. Stale
    /// history entries and the legacy wallpaper folder are removed, and the
    /// cleaned blob is saved back. The watcher is not started here; call
    /// [`Backdrop::sync_watcher`] from within a runtime.
    pub fn load(core: BackdropCore) -> AppResult<Arc<Self>> {
        let settings_manager = SettingsManager::new(core.paths().as_ref())?;
        let mut settings = settings_manager.load().unwrap_or_else(|e| {
            tracing::error!("加载设置失败，使用默认设置: {}", e);
            BackdropSettings::default()
        });

        let mut store = WallpaperConfigStore::from_settings(&settings);
        let mut history = HistoryList::new(std::mem::take(&mut settings.history));
        let pruned = history.prune_missing(core.vault().as_ref());
        if pruned > 0 {
            tracing::info!(pruned, "已移除失效的历史记录");
        }

        let layout = WallpaperLayout::from_provider(core.paths().as_ref());
        let files = FileLifecycleManager::new(core.vault().clone(), layout);
        files.remove_legacy_folder();

        let current = store.resolve_current_config(core.clock().now());
        store.write_to(&mut settings, &current.config);
        settings.history = history.entries().to_vec();
        if let Err(e) = settings_manager.save(&settings) {
            tracing::warn!("保存设置失败: {}", e);
        }

        tracing::info!(
            settings = ?settings_manager.path(),
            slot = current.slot,
            mode = ?store.mode(),
            slots = store.len(),
            "壁纸引擎已加载"
        );

        let applier = MediaApplier::new(core.vault().clone());
        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            core,
            settings_manager,
            files,
            applier,
            watcher: WallpaperWatcher::new(),
            session: Mutex::new(Session {
                store,
                history,
                settings,
                current,
            }),
            upload_lock: Mutex::new(()),
            apply_debounce: Debouncer::new(DEBOUNCE_DELAY),
            save_debounce: Debouncer::new(DEBOUNCE_DELAY),
        }))
    }

    pub fn core(&self) -> &BackdropCore {
        &self.core
    }

    pub fn applier(&self) -> &MediaApplier {
        &self.applier
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_running()
    }

    // ==================== 查询 ====================

    /// Re-resolve the configuration for "now" and cache it.
    ///
    /// Not a pure query: in auto-rotate mode every call advances the pool by
    /// one slot. Use [`Backdrop::current`] to read without side effects.
    pub async fn resolve_current_config(&self) -> ResolvedWallpaper {
        let mut session = self.session.lock().await;
        let resolved = session.store.resolve_current_config(self.core.clock().now());
        session.current = resolved.clone();
        resolved
    }

    /// The cached resolution.
    pub async fn current(&self) -> ResolvedWallpaper {
        self.session.lock().await.current.clone()
    }

    /// Settings as they would be saved right now.
    pub async fn settings(&self) -> BackdropSettings {
        let session = self.session.lock().await;
        snapshot(&session)
    }

    pub async fn configs(&self) -> Vec<WallpaperConfig> {
        self.session.lock().await.store.configs().to_vec()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.session.lock().await.history.entries().to_vec()
    }

    // ==================== 应用 ====================

    /// Apply the current wallpaper to one document.
    ///
    /// With `skip_reload` the cached resolution is used as is.
    pub async fn apply_wallpaper(&self, skip_reload: bool, doc: &SharedDocument) -> ApplyOutcome {
        let (resolved, advanced) = self.prepare_apply(skip_reload).await;
        let outcome = self.applier.apply(doc, &resolved.config, advanced).await;
        self.finish_apply(&resolved, &[outcome]).await;
        outcome
    }

    /// Apply the current wallpaper to every registered document.
    pub async fn apply_all(&self, skip_reload: bool) -> Vec<(DocumentId, ApplyOutcome)> {
        let (resolved, advanced) = self.prepare_apply(skip_reload).await;

        let mut outcomes = Vec::new();
        for doc in self.core.documents().all() {
            let outcome = self.applier.apply(&doc, &resolved.config, advanced).await;
            outcomes.push((doc.id(), outcome));
        }

        let only: Vec<ApplyOutcome> = outcomes.iter().map(|(_, o)| *o).collect();
        self.finish_apply(&resolved, &only).await;
        outcomes
    }

    async fn prepare_apply(&self, skip_reload: bool) -> (ResolvedWallpaper, bool) {
        let mut session = self.session.lock().await;
        if !skip_reload {
            session.current = session.store.resolve_current_config(self.core.clock().now());
        }
        (session.current.clone(), session.settings.advanced_mode)
    }

    /// Commit the shared key once every document has been handled, or heal
    /// a missing file.
    async fn finish_apply(&self, resolved: &ResolvedWallpaper, outcomes: &[ApplyOutcome]) {
        if outcomes.contains(&ApplyOutcome::MissingFile) {
            self.heal_missing(resolved).await;
            return;
        }
        if !resolved.config.has_path() {
            self.applier.commit(None);
            return;
        }

        self.applier.commit(Some(MediaKey::of(&resolved.config)));
        if !outcomes.is_empty() {
            self.core.events().emit_typed(
                names::WALLPAPER_APPLIED,
                &WallpaperAppliedEvent {
                    slot: resolved.slot,
                    path: resolved.config.path.clone(),
                    kind: resolved.config.kind,
                    documents: outcomes.len(),
                },
            );
        }
    }

    /// The backing file is gone: clear every reference to it and tell the user.
    async fn heal_missing(&self, resolved: &ResolvedWallpaper) {
        let path = resolved.config.path.clone();
        let mut session = self.session.lock().await;
        let cleared = session.store.clear_path(&path);
        if session.current.config.path == path {
            session.current.config.path.clear();
        }
        tracing::warn!(path = %path, slots = ?cleared, "壁纸文件已丢失，已清除路径");

        if let Err(e) = self.persist(&mut session) {
            tracing::warn!("保存设置失败: {}", e);
        }
        drop(session);

        let events = self.core.events();
        events.emit_typed(
            names::WALLPAPER_MISSING,
            &WallpaperMissingEvent {
                slot: resolved.slot,
                path: path.clone(),
            },
        );
        events.emit_typed(
            names::WALLPAPER_NOTICE,
            &NoticeEvent::new(format!("Wallpaper file not found, path cleared: {path}")),
        );
    }

    /// Apply after a quiet period; repeated calls collapse into one.
    pub fn apply_debounced(&self) {
        let this = self.this.clone();
        self.apply_debounce.call(move || async move {
            if let Some(engine) = this.upgrade() {
                engine.apply_all(false).await;
            }
        });
    }

    // ==================== 定时 ====================

    /// One watcher tick: re-resolve and apply only if the media changed.
    ///
    /// An active preview is left alone.
    pub async fn tick(&self) {
        let resolved = {
            let mut session = self.session.lock().await;
            if session.store.preview().is_some() {
                tracing::debug!("预览中，跳过定时检查");
                return;
            }
            let slots = session.store.len();
            let resolved = session.store.resolve_current_config(self.core.clock().now());
            session.current = resolved.clone();
            if session.store.len() != slots {
                if let Err(e) = self.persist(&mut session) {
                    tracing::warn!("保存设置失败: {}", e);
                }
            }
            resolved
        };

        let key = resolved.config.has_path().then(|| MediaKey::of(&resolved.config));
        if key == self.applier.last() {
            return;
        }
        tracing::info!(slot = resolved.slot, path = %resolved.config.path, "定时切换壁纸");
        self.apply_all(true).await;
    }

    /// Start the watcher if a schedule mode is active, otherwise stop it.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn sync_watcher(&self) {
        let (mode, interval) = {
            let session = self.session.lock().await;
            (
                session.store.mode(),
                session.settings.schedule.interval_check_time.clone(),
            )
        };

        if !mode.is_active() {
            self.watcher.stop();
            return;
        }

        let period = interval_duration(&interval).unwrap_or_else(|e| {
            tracing::warn!("检查间隔无效，使用默认值: {}", e);
            FALLBACK_INTERVAL
        });
        let this = self.this.clone();
        self.watcher.start(period, move || {
            let this = this.clone();
            async move {
                if let Some(engine) = this.upgrade() {
                    engine.tick().await;
                }
            }
        });
    }

    pub async fn start_watcher(&self) {
        self.sync_watcher().await;
    }

    pub fn stop_watcher(&self) {
        self.watcher.stop();
    }

    /// Validate and store new schedule options, then re-apply.
    pub async fn update_schedule(&self, options: ScheduleOptions) -> AppResult<ScheduleMode> {
        validate_options(&options)?;
        let mode = ScheduleMode::from_options(&options)?;
        {
            let mut session = self.session.lock().await;
            session.settings.schedule = options;
            session.store.set_mode(mode);
            self.persist(&mut session)?;
        }
        tracing::info!(?mode, "定时设置已更新");

        self.apply_all(false).await;
        self.sync_watcher().await;
        Ok(mode)
    }

    // ==================== 窗口 ====================

    /// Register a window and build its wallpaper.
    pub async fn init_document(&self, doc: SharedDocument) -> ApplyOutcome {
        self.core.documents().register(doc.clone());
        self.apply_wallpaper(true, &doc).await
    }

    /// Forget a closed window.
    pub fn close_document(&self, id: DocumentId) {
        self.core.documents().unregister(id);
        self.applier.forget(id);
    }

    /// Tear everything down: timers, pending work and every mounted wallpaper.
    pub fn unload(&self) {
        self.watcher.stop();
        self.apply_debounce.cancel();
        self.save_debounce.cancel();
        for doc in self.core.documents().clear() {
            self.applier.unmount(&doc);
        }
        self.applier.commit(None);
        tracing::info!("壁纸引擎已卸载");
    }

    // ==================== 文件 ====================

    /// Ask the host for a file and store it into `slot`.
    ///
    /// `Ok(None)` when the dialog was cancelled.
    pub async fn open_file_picker(
        &self,
        slot: usize,
        is_scheduled: bool,
    ) -> AppResult<Option<StoredWallpaper>> {
        let Some(file) = self.core.picker().pick_file() else {
            return Ok(None);
        };
        self.store_file(file, slot, is_scheduled).await.map(Some)
    }

    /// Store an upload into `slot` and re-apply.
    ///
    /// With the global preset enabled its media follows the upload. An active
    /// preview moves to `slot` unless the upload targets a scheduled slot.
    pub async fn store_file(
        &self,
        file: PickedFile,
        slot: usize,
        is_scheduled: bool,
    ) -> AppResult<StoredWallpaper> {
        let _upload = self.upload_lock.lock().await;
        let stored = {
            let mut session = self.session.lock().await;
            let size_limited = session.settings.size_limited;
            let Session { store, history, .. } = &mut *session;
            let stored = match self.files.store(
                store,
                history,
                &file.name,
                &file.bytes,
                slot,
                size_limited,
            ) {
                Ok(stored) => stored,
                Err(e) => {
                    self.notify(e.to_string());
                    return Err(e);
                }
            };

            if session.store.global().enabled {
                let global = &mut session.store.global_mut().config;
                global.path = stored.path.clone();
                global.kind = stored.kind;
            }
            if session.store.preview().is_some() && !is_scheduled {
                session.store.set_preview(Some(slot))?;
            }
            self.persist(&mut session)?;
            self.emit_history(&session.history);
            stored
        };

        self.apply_all(false).await;
        Ok(stored)
    }

    /// Ask the host for a folder and import it into the rotation pool.
    pub async fn open_folder_picker(&self) -> AppResult<usize> {
        let Some(files) = self.core.picker().pick_folder() else {
            return Ok(0);
        };
        self.import_folder(files).await
    }

    /// Replace the rotation pool with `files`, one slot per valid file.
    ///
    /// Invalid files are skipped with a notice. Returns how many were stored.
    pub async fn import_folder(&self, files: Vec<PickedFile>) -> AppResult<usize> {
        let _upload = self.upload_lock.lock().await;
        let imported = {
            let mut session = self.session.lock().await;
            let size_limited = session.settings.size_limited;
            session.store.clear_from(AUTO_SWITCH_START);

            let mut imported = 0usize;
            for file in &files {
                if let Err(e) = validate_upload(&file.name, file.bytes.len() as u64, size_limited) {
                    tracing::info!(file = %file.name, "跳过无效文件: {}", e);
                    self.notify(e.to_string());
                    continue;
                }
                let Session { store, history, .. } = &mut *session;
                let slot = store.add_slot();
                if let Err(e) =
                    self.files
                        .store(store, history, &file.name, &file.bytes, slot, size_limited)
                {
                    tracing::warn!(file = %file.name, "导入失败: {}", e);
                    self.notify(e.to_string());
                    if let Err(e) = store.remove_slot(slot) {
                        tracing::warn!(slot, "无法移除导入失败的槽位: {}", e);
                    }
                    continue;
                }
                imported += 1;
            }

            self.persist(&mut session)?;
            self.emit_history(&session.history);
            imported
        };

        tracing::info!(imported, total = files.len(), "文件夹导入完成");
        self.apply_all(false).await;
        Ok(imported)
    }

    /// Point `slot` at a history file.
    pub async fn select_history(&self, entry: usize, slot: usize) -> AppResult<()> {
        {
            let mut session = self.session.lock().await;
            let Some(chosen) = session.history.get(entry).cloned() else {
                return Err(AppError::General(format!("History entry {entry} does not exist")));
            };
            if !self.core.vault().exists(&chosen.path) {
                session.history.prune_missing(self.core.vault().as_ref());
                self.persist(&mut session)?;
                self.emit_history(&session.history);
                return Err(AppError::FileNotFound(chosen.path));
            }
            session.store.set_slot_media(slot, &chosen.path, chosen.kind)?;
            session.history.prepend(chosen);
            self.persist(&mut session)?;
            self.emit_history(&session.history);
        }
        self.apply_all(false).await;
        Ok(())
    }

    // ==================== 槽位 ====================

    /// Append a slot to the rotation pool. Returns its index.
    pub async fn add_slot(&self) -> AppResult<usize> {
        let mut session = self.session.lock().await;
        let index = session.store.add_slot();
        self.persist(&mut session)?;
        Ok(index)
    }

    /// Remove a rotation pool slot. Its file goes too unless another slot
    /// still uses it.
    pub async fn remove_slot(&self, index: usize) -> AppResult<()> {
        {
            let mut session = self.session.lock().await;
            let removed = session.store.remove_slot(index)?;
            if removed.has_path() && !session.store.configs().iter().any(|c| c.path == removed.path)
            {
                remove_quietly(self.core.vault().as_ref(), &removed.path);
            }
            self.persist(&mut session)?;
        }
        self.apply_all(false).await;
        Ok(())
    }

    /// Drop every pool slot from `start` on. Returns how many were removed.
    pub async fn clear_slots_from(&self, start: usize) -> AppResult<usize> {
        let removed = {
            let mut session = self.session.lock().await;
            let removed = session.store.clear_from(start);
            for config in removed.iter().filter(|c| c.has_path()) {
                if !session.store.configs().iter().any(|c| c.path == config.path) {
                    remove_quietly(self.core.vault().as_ref(), &config.path);
                }
            }
            self.persist(&mut session)?;
            removed.len()
        };
        if removed > 0 {
            self.apply_all(false).await;
        }
        Ok(removed)
    }

    /// Edit a slot's visual fields in place. Apply and save are debounced.
    ///
    /// Media and index are kept; ranges are clamped after `edit` runs.
    pub async fn update_slot<F>(&self, index: usize, edit: F) -> AppResult<()>
    where
        F: FnOnce(&mut WallpaperConfig),
    {
        {
            let mut session = self.session.lock().await;
            let Some(config) = session.store.slot_mut(index) else {
                return Err(AppError::InvalidSlot(index.to_string()));
            };
            let (path, kind) = (config.path.clone(), config.kind);
            edit(config);
            config.path = path;
            config.kind = kind;
            config.index = index;
            config.clamp_ranges();
        }
        self.apply_debounced();
        self.save_debounced();
        Ok(())
    }

    /// Edit the global preset's visual fields. Apply and save are debounced.
    pub async fn update_global<F>(&self, edit: F)
    where
        F: FnOnce(&mut WallpaperConfig),
    {
        {
            let mut session = self.session.lock().await;
            let config = &mut session.store.global_mut().config;
            edit(config);
            config.clamp_ranges();
        }
        self.apply_debounced();
        self.save_debounced();
    }

    // ==================== 开关 ====================

    /// Show `slot` regardless of the schedule; `None` returns to it.
    pub async fn set_preview(&self, slot: Option<usize>) -> AppResult<()> {
        {
            let mut session = self.session.lock().await;
            session.store.set_preview(slot)?;
            self.persist(&mut session)?;
        }
        self.apply_all(false).await;
        Ok(())
    }

    pub async fn set_global_enabled(&self, enabled: bool) -> AppResult<()> {
        {
            let mut session = self.session.lock().await;
            session.store.global_mut().enabled = enabled;
            self.persist(&mut session)?;
        }
        self.apply_all(false).await;
        Ok(())
    }

    pub async fn set_advanced_mode(&self, enabled: bool) -> AppResult<()> {
        {
            let mut session = self.session.lock().await;
            session.settings.advanced_mode = enabled;
            self.persist(&mut session)?;
        }
        self.apply_all(true).await;
        Ok(())
    }

    pub async fn set_size_limited(&self, enabled: bool) -> AppResult<()> {
        let mut session = self.session.lock().await;
        session.settings.size_limited = enabled;
        self.persist(&mut session)
    }

    // ==================== 持久化 ====================

    /// Write the settings blob now.
    pub async fn save(&self) -> AppResult<()> {
        let mut session = self.session.lock().await;
        self.persist(&mut session)
    }

    /// Save after a quiet period; repeated calls collapse into one.
    pub fn save_debounced(&self) {
        let this = self.this.clone();
        self.save_debounce.call(move || async move {
            if let Some(engine) = this.upgrade() {
                if let Err(e) = engine.save().await {
                    tracing::warn!("保存设置失败: {}", e);
                }
            }
        });
    }

    fn persist(&self, session: &mut Session) -> AppResult<()> {
        let Session {
            store,
            history,
            settings,
            current,
        } = session;
        store.write_to(settings, &current.config);
        settings.history = history.entries().to_vec();
        self.settings_manager.save(settings)?;
        self.core
            .events()
            .emit_typed(names::SETTINGS_CHANGED, &*settings);
        Ok(())
    }

    fn emit_history(&self, history: &HistoryList) {
        self.core.events().emit_typed(
            names::HISTORY_CHANGED,
            &HistoryChangedEvent {
                entries: history.entries().to_vec(),
            },
        );
    }

    fn notify(&self, message: String) {
        self.core
            .events()
            .emit_typed(names::WALLPAPER_NOTICE, &NoticeEvent::new(message));
    }
}

fn snapshot(session: &Session) -> BackdropSettings {
    let mut settings = session.settings.clone();
    session.store.write_to(&mut settings, &session.current.config);
    settings.history = session.history.entries().to_vec();
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSink;
    use crate::host::{MemoryDocument, QueuedFilePicker};
    use crate::models::WallpaperKind;
    use crate::paths::{LocalPathProvider, PathProvider};
    use crate::scheduler::ManualClock;
    use crate::services::history::HISTORY_LIMIT;
    use crate::services::media_applier::CLEANUP_DELAY;
    use crate::vault::{LocalVault, Vault};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(n, _)| n.clone())
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event_name: &str, payload_json: &str) {
            self.events
                .lock()
                .unwrap()
                .push((event_name.to_string(), payload_json.to_string()));
        }
    }

    struct Fixture {
        tmp: TempDir,
        engine: Arc<Backdrop>,
        vault: Arc<LocalVault>,
        sink: Arc<RecordingSink>,
        picker: Arc<QueuedFilePicker>,
        clock: Arc<ManualClock>,
    }

    fn monday(hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn core_in(tmp: &TempDir) -> (BackdropCore, Arc<LocalVault>, Arc<RecordingSink>, Arc<QueuedFilePicker>, Arc<ManualClock>) {
        let paths = Arc::new(LocalPathProvider::with_base_dir(tmp.path().to_path_buf(), "backdrop"));
        let vault = Arc::new(LocalVault::new(tmp.path().to_path_buf()));
        let sink = Arc::new(RecordingSink::default());
        let picker = Arc::new(QueuedFilePicker::new());
        let clock = Arc::new(ManualClock::new(monday(9, 0)));
        let core = BackdropCore::new(paths, sink.clone())
            .with_vault(vault.clone())
            .with_picker(picker.clone())
            .with_clock(clock.clone());
        (core, vault, sink, picker, clock)
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let (core, vault, sink, picker, clock) = core_in(&tmp);
        let engine = Backdrop::load(core).unwrap();
        Fixture {
            tmp,
            engine,
            vault,
            sink,
            picker,
            clock,
        }
    }

    fn png(name: &str) -> PickedFile {
        PickedFile::new(name, vec![1, 2, 3, 4])
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_creates_settings_file() {
        let f = fixture();
        let path = LocalPathProvider::with_base_dir(f.tmp.path().to_path_buf(), "backdrop")
            .settings_path();
        assert!(path.exists());

        let current = f.engine.current().await;
        assert_eq!(current.slot, 0);
        assert!(!current.config.has_path());
        assert_eq!(f.engine.configs().await.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_then_init_document_builds_wallpaper() {
        let f = fixture();
        let stored = f.engine.store_file(png("sky.png"), 0, false).await.unwrap();
        assert_eq!(stored.path, "plugins/backdrop/wallpapers/active/normal/sky.png");

        let doc = MemoryDocument::new(1).shared();
        let outcome = f.engine.init_document(doc.clone()).await;
        assert_eq!(outcome, ApplyOutcome::Built);
        assert_eq!(doc.media_count(), 1);
        assert_eq!(
            f.engine.applier().last(),
            Some(MediaKey {
                path: stored.path.clone(),
                kind: WallpaperKind::Image
            })
        );

        let history = f.engine.history().await;
        assert_eq!(history.len(), 1);
        assert!(f.sink.names().contains(&names::HISTORY_CHANGED.to_string()));
        assert!(f.sink.names().contains(&names::WALLPAPER_APPLIED.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_swaps_every_document() {
        let f = fixture();
        f.engine.store_file(png("a.png"), 0, false).await.unwrap();
        let first = MemoryDocument::new(1).shared();
        let second = MemoryDocument::new(2).shared();
        f.engine.init_document(first.clone()).await;
        f.engine.init_document(second.clone()).await;

        f.engine.store_file(png("b.png"), 0, false).await.unwrap();
        tokio::time::sleep(CLEANUP_DELAY + Duration::from_millis(100)).await;

        for doc in [&first, &second] {
            assert_eq!(doc.media_count(), 1);
            let newest = doc.newest_media().unwrap();
            assert!(newest.spec.path.ends_with("b.png"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_upload_emits_notice() {
        let f = fixture();
        let err = f
            .engine
            .store_file(PickedFile::new("notes.txt", vec![0]), 0, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
        assert!(f.sink.names().contains(&names::WALLPAPER_NOTICE.to_string()));
        assert!(!f.engine.configs().await[0].has_path());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_heals_and_keeps_element() {
        let f = fixture();
        let stored = f.engine.store_file(png("a.png"), 0, false).await.unwrap();
        let doc = MemoryDocument::new(1).shared();
        f.engine.init_document(doc.clone()).await;

        // point slot 0 at a second file, then delete it behind the engine's back
        let second = f.engine.store_file(png("b.png"), 1, true).await.unwrap();
        f.vault.remove(&second.path).unwrap();
        f.engine.update_schedule(ScheduleOptions {
            day_night_mode: true,
            day_start_time: "08:00".into(),
            night_start_time: "20:00".into(),
            ..ScheduleOptions::default()
        })
        .await
        .unwrap();

        assert_eq!(doc.media_count(), 1);
        assert!(doc.newest_media().unwrap().spec.path.ends_with(&stored.file_name));
        assert!(!f.engine.configs().await[1].has_path());
        assert_eq!(f.engine.current().await.config.path, "");
        assert!(f.sink.names().contains(&names::WALLPAPER_MISSING.to_string()));
        f.engine.unload();
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_bounded() {
        let f = fixture();
        for i in 0..(HISTORY_LIMIT + 2) {
            f.engine
                .store_file(png(&format!("{i}.png")), 0, false)
                .await
                .unwrap();
        }
        let history = f.engine.history().await;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].file_name, format!("{}.png", HISTORY_LIMIT + 1));
        assert!(!f.vault.exists("plugins/backdrop/wallpapers/history/0.png"));

        let listed = f.vault.list("plugins/backdrop/wallpapers/active/normal").unwrap();
        assert_eq!(listed.files.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_follows_schedule_and_preview() {
        let f = fixture();
        f.engine.store_file(png("day.png"), 1, true).await.unwrap();
        f.engine.store_file(png("night.png"), 2, true).await.unwrap();
        let doc = MemoryDocument::new(1).shared();
        f.engine.init_document(doc.clone()).await;

        f.engine
            .update_schedule(ScheduleOptions {
                day_night_mode: true,
                interval_check_time: "00:01".into(),
                ..ScheduleOptions::default()
            })
            .await
            .unwrap();
        assert!(f.engine.is_watching());
        assert_eq!(f.engine.current().await.slot, 1);

        f.clock.set(monday(21, 0));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(f.engine.current().await.slot, 2);

        f.engine.set_preview(Some(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(f.engine.current().await.slot, 1);
        assert!(f.engine.current().await.preview);

        f.engine
            .update_schedule(ScheduleOptions::default())
            .await
            .unwrap();
        assert!(!f.engine.is_watching());
        f.engine.unload();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_change_mid_crossfade_shows_new_wallpaper() {
        let f = fixture();
        f.engine.store_file(png("day.png"), 1, true).await.unwrap();
        f.engine.store_file(png("night.png"), 2, true).await.unwrap();
        let doc = MemoryDocument::new(1).shared();
        f.engine.init_document(doc.clone()).await;

        let day_night = ScheduleOptions {
            day_night_mode: true,
            interval_check_time: "00:01".into(),
            ..ScheduleOptions::default()
        };
        f.engine.update_schedule(day_night.clone()).await.unwrap();
        tokio::time::sleep(CLEANUP_DELAY * 2).await;

        // the tick fires at 60s and is still fading when the watcher restarts
        f.clock.set(monday(21, 0));
        tokio::time::sleep(Duration::from_secs(54) + Duration::from_millis(10)).await;
        f.engine
            .update_schedule(ScheduleOptions {
                interval_check_time: "00:02".into(),
                ..day_night
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(f.engine.current().await.slot, 2);
        let media = doc.media();
        assert_eq!(media.len(), 1);
        assert!(media[0].spec.path.ends_with("night.png"));
        assert_eq!(media[0].opacity, 1.0);
        f.engine.unload();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_schedule_is_rejected() {
        let f = fixture();
        let err = f
            .engine
            .update_schedule(ScheduleOptions {
                day_night_mode: true,
                day_start_time: "25:00".into(),
                ..ScheduleOptions::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTime(_)));
        assert!(!f.engine.is_watching());
        assert!(!f.engine.settings().await.schedule.day_night_mode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_folder_fills_pool() {
        let f = fixture();
        f.engine.add_slot().await.unwrap();
        f.picker.push(png("one.png"));
        f.picker.push(PickedFile::new("skip.txt", vec![1]));
        f.picker.push(png("two.gif"));

        let imported = f.engine.open_folder_picker().await.unwrap();
        assert_eq!(imported, 2);

        let configs = f.engine.configs().await;
        assert_eq!(configs.len(), 12);
        assert!(configs[10].path.ends_with("autoSwitch/one.png"));
        assert_eq!(configs[11].kind, WallpaperKind::Gif);
        assert_eq!(configs[11].index, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_management() {
        let f = fixture();
        assert_eq!(f.engine.add_slot().await.unwrap(), 10);
        assert_eq!(f.engine.add_slot().await.unwrap(), 11);
        assert!(matches!(
            f.engine.remove_slot(3).await,
            Err(AppError::InvalidSlot(_))
        ));

        f.engine.remove_slot(10).await.unwrap();
        let configs = f.engine.configs().await;
        assert_eq!(configs.len(), 11);
        assert_eq!(configs[10].index, 10);

        assert_eq!(f.engine.clear_slots_from(0).await.unwrap(), 1);
        assert_eq!(f.engine.configs().await.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_slot_is_debounced_and_clamped() {
        let f = fixture();
        f.engine.set_global_enabled(false).await.unwrap();
        f.engine.store_file(png("a.png"), 0, false).await.unwrap();
        let doc = MemoryDocument::new(1).shared();
        f.engine.init_document(doc.clone()).await;

        for opacity in [10.0, 20.0, 500.0] {
            f.engine
                .update_slot(0, |c| {
                    c.opacity = opacity;
                    c.path = "ignored.png".into();
                })
                .await
                .unwrap();
        }
        assert!(matches!(
            f.engine.update_slot(99, |_| {}).await,
            Err(AppError::InvalidSlot(_))
        ));

        tokio::time::sleep(DEBOUNCE_DELAY + Duration::from_millis(50)).await;
        let slot = &f.engine.configs().await[0];
        assert_eq!(slot.opacity, 100.0);
        assert!(slot.path.ends_with("a.png"));
        let style = doc.container_style().unwrap();
        assert!((style.opacity - crate::host::MAX_OPACITY).abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_history_points_slot() {
        let f = fixture();
        f.engine.store_file(png("a.png"), 0, false).await.unwrap();
        f.engine.store_file(png("b.png"), 0, false).await.unwrap();

        // "a.png" is now the second entry
        f.engine.select_history(1, 4).await.unwrap();
        let configs = f.engine.configs().await;
        assert_eq!(configs[4].path, "plugins/backdrop/wallpapers/history/a.png");
        assert_eq!(f.engine.history().await[0].file_name, "a.png");

        assert!(f.engine.select_history(9, 4).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_survive_reload() {
        let f = fixture();
        f.engine.store_file(png("a.png"), 0, false).await.unwrap();
        f.engine.set_advanced_mode(true).await.unwrap();
        f.engine.set_preview(Some(0)).await.unwrap();
        f.engine.unload();

        let (core, ..) = core_in(&f.tmp);
        let reloaded = Backdrop::load(core).unwrap();
        let settings = reloaded.settings().await;
        assert!(settings.advanced_mode);
        assert!(settings.preview);
        assert_eq!(settings.history.len(), 1);
        assert!(reloaded.current().await.preview);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_prunes_history_with_missing_files() {
        let f = fixture();
        let kept = f.engine.store_file(png("kept.png"), 0, false).await.unwrap();
        let gone = f.engine.store_file(png("gone.png"), 1, true).await.unwrap();
        assert_eq!(f.engine.history().await.len(), 2);
        f.engine.unload();
        f.vault.remove(&gone.history_path).unwrap();

        let (core, ..) = core_in(&f.tmp);
        let reloaded = Backdrop::load(core).unwrap();
        let history = reloaded.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].path, kept.history_path);

        let path = LocalPathProvider::with_base_dir(f.tmp.path().to_path_buf(), "backdrop")
            .settings_path();
        let saved = SettingsManager::from_path(path).unwrap().load().unwrap();
        assert_eq!(saved.history, history);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_clears_documents() {
        let f = fixture();
        f.engine.store_file(png("a.png"), 0, false).await.unwrap();
        let doc = MemoryDocument::new(1).shared();
        f.engine.init_document(doc.clone()).await;

        f.engine.unload();
        assert!(f.engine.core().documents().is_empty());
        assert!(doc.container_style().is_none());
        assert_eq!(f.engine.applier().last(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_file_picker_cancelled() {
        let f = fixture();
        assert!(f.engine.open_file_picker(0, false).await.unwrap().is_none());

        f.picker.push(png("picked.png"));
        let stored = f.engine.open_file_picker(0, false).await.unwrap().unwrap();
        assert_eq!(stored.file_name, "picked.png");
    }
}
