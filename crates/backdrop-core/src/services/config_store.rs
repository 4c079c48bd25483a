//! 壁纸配置存储
//!
//! Owns the slot arena and decides which slot is current. Callers hold slot
//! indices, never references into the arena, so edits made through
//! [`WallpaperConfigStore::slot_mut`] are seen by the next resolution.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{
    BackdropSettings, GlobalConfig, SlotRole, WallpaperConfig, WallpaperKind, AUTO_SWITCH_START,
    DEFAULT_SLOT, RESERVED_SLOTS,
};
use crate::scheduler::{select_slot, ScheduleMode, Selection};
use crate::utils::{AppError, AppResult};

/// The configuration selected for "now".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedWallpaper {
    /// Slot the configuration was taken from.
    pub slot: usize,
    pub config: WallpaperConfig,
    /// Resolved from the preview override rather than the schedule.
    pub preview: bool,
}

/// 配置存储
#[derive(Debug, Clone)]
pub struct WallpaperConfigStore {
    configs: Vec<WallpaperConfig>,
    global: GlobalConfig,
    mode: ScheduleMode,
    preview: Option<usize>,
    current_slot: usize,
}

impl WallpaperConfigStore {
    /// Build a store; the slot array is padded and reindexed.
    pub fn new(configs: Vec<WallpaperConfig>, global: GlobalConfig, mode: ScheduleMode) -> Self {
        let mut store = Self {
            configs,
            global,
            mode,
            preview: None,
            current_slot: DEFAULT_SLOT,
        };
        store.pad_and_reindex();
        store
    }

    /// Build from persisted settings.
    ///
    /// Malformed schedule times fall back to manual mode. A persisted preview
    /// is restored onto the slot recorded in `currentWallpaper`.
    pub fn from_settings(settings: &BackdropSettings) -> Self {
        let mode = ScheduleMode::from_options(&settings.schedule).unwrap_or_else(|e| {
            tracing::warn!("定时设置无效，回退到手动模式: {}", e);
            ScheduleMode::Off
        });
        let mut store = Self::new(
            settings.wallpaper_configs.clone(),
            settings.global_config.clone(),
            mode,
        );
        let recorded = settings.current_wallpaper.index;
        if recorded < store.configs.len() {
            store.current_slot = recorded;
            if settings.preview {
                store.preview = Some(recorded);
            }
        }
        store
    }

    /// Copy the store state back into the settings blob.
    pub fn write_to(&self, settings: &mut BackdropSettings, current: &WallpaperConfig) {
        settings.wallpaper_configs = self.configs.clone();
        settings.global_config = self.global.clone();
        settings.preview = self.preview.is_some();
        settings.current_wallpaper = current.clone();
    }

    fn pad_and_reindex(&mut self) {
        let len = self.configs.len();
        if len < RESERVED_SLOTS {
            self.configs
                .extend((len..RESERVED_SLOTS).map(WallpaperConfig::for_slot));
        }
        for (i, config) in self.configs.iter_mut().enumerate() {
            config.index = i;
        }
    }

    // ==================== 访问 ====================

    pub fn configs(&self) -> &[WallpaperConfig] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&WallpaperConfig> {
        self.configs.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut WallpaperConfig> {
        self.configs.get_mut(index)
    }

    fn require_slot(&self, index: usize) -> AppResult<()> {
        if index < self.configs.len() {
            Ok(())
        } else {
            Err(AppError::InvalidSlot(format!(
                "{index} (only {} slots exist)",
                self.configs.len()
            )))
        }
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut GlobalConfig {
        &mut self.global
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ScheduleMode) {
        self.mode = mode;
    }

    pub fn preview(&self) -> Option<usize> {
        self.preview
    }

    /// Force `slot` to be shown regardless of the schedule; `None` clears it.
    pub fn set_preview(&mut self, slot: Option<usize>) -> AppResult<()> {
        if let Some(index) = slot {
            self.require_slot(index)?;
        }
        self.preview = slot;
        Ok(())
    }

    // ==================== 解析 ====================

    /// Resolve the configuration to show at `now`.
    ///
    /// Preview wins over the schedule and is returned verbatim. Otherwise
    /// the scheduler picks a slot (auto-rotate may grow an empty pool by one
    /// slot) and the global preset, when enabled, supplies the visual fields.
    pub fn resolve_current_config(&mut self, now: NaiveDateTime) -> ResolvedWallpaper {
        if let Some(index) = self.preview {
            let slot = self.checked_slot(index);
            self.current_slot = slot;
            return ResolvedWallpaper {
                slot,
                config: self.configs[slot].clone(),
                preview: true,
            };
        }

        let slot = match select_slot(&self.mode, now) {
            None => DEFAULT_SLOT,
            Some(Selection::Advance) => self.next_rotation_slot(),
            Some(selection) => selection.slot().unwrap_or(DEFAULT_SLOT),
        };
        let slot = self.checked_slot(slot);
        self.current_slot = slot;

        let selected = &self.configs[slot];
        let config = if self.global.enabled {
            self.global.merge_onto(selected)
        } else {
            selected.clone()
        };
        ResolvedWallpaper {
            slot,
            config,
            preview: false,
        }
    }

    /// Next pool slot after the current one, wrapping. An empty pool gains
    /// a fresh slot, which is selected.
    fn next_rotation_slot(&mut self) -> usize {
        let range = SlotRole::AutoSwitch.range(self.configs.len());
        if range.is_empty() {
            let index = self.add_slot();
            tracing::debug!(slot = index, "自动切换池为空，已新增槽位");
            return index;
        }
        let start = range.start as i64;
        let size = range.len() as i64;
        let next = (self.current_slot as i64 + 1 - start).rem_euclid(size) + start;
        next as usize
    }

    /// The slot array never shrinks below the reserved range, so an out of
    /// range slot is a bug. Release builds fall back to slot 0.
    fn checked_slot(&self, slot: usize) -> usize {
        debug_assert!(
            slot < self.configs.len(),
            "slot {slot} out of range ({} slots)",
            self.configs.len()
        );
        if slot < self.configs.len() {
            slot
        } else {
            tracing::error!(slot, len = self.configs.len(), "槽位越界，回退到默认槽位");
            DEFAULT_SLOT
        }
    }

    /// Paths of every slot in `role`'s range.
    pub fn paths_for_role(&self, role: SlotRole) -> Vec<String> {
        self.configs[role.range(self.configs.len())]
            .iter()
            .map(|c| c.path.clone())
            .collect()
    }

    // ==================== 槽位管理 ====================

    /// Append a default slot to the auto-rotate pool. Returns its index.
    pub fn add_slot(&mut self) -> usize {
        let index = self.configs.len();
        self.configs.push(WallpaperConfig::for_slot(index));
        index
    }

    /// Remove a pool slot and renumber the ones after it.
    pub fn remove_slot(&mut self, index: usize) -> AppResult<WallpaperConfig> {
        if index < AUTO_SWITCH_START {
            return Err(AppError::InvalidSlot(format!(
                "{index} is reserved and cannot be removed"
            )));
        }
        self.require_slot(index)?;

        let removed = self.configs.remove(index);
        self.pad_and_reindex();

        self.preview = match self.preview {
            Some(p) if p == index => None,
            Some(p) if p > index => Some(p - 1),
            other => other,
        };
        if self.current_slot == index {
            self.current_slot = DEFAULT_SLOT;
        } else if self.current_slot > index {
            self.current_slot -= 1;
        }
        Ok(removed)
    }

    /// Drop every slot at or after `start` (never below the reserved range).
    pub fn clear_from(&mut self, start: usize) -> Vec<WallpaperConfig> {
        let start = start.max(AUTO_SWITCH_START);
        if start >= self.configs.len() {
            return Vec::new();
        }
        let removed = self.configs.split_off(start);
        if self.preview.is_some_and(|p| p >= start) {
            self.preview = None;
        }
        if self.current_slot >= start {
            self.current_slot = DEFAULT_SLOT;
        }
        removed
    }

    /// Point a slot at a stored file.
    pub fn set_slot_media(&mut self, index: usize, path: &str, kind: WallpaperKind) -> AppResult<()> {
        self.require_slot(index)?;
        let slot = &mut self.configs[index];
        slot.path = path.to_string();
        slot.kind = kind;
        Ok(())
    }

    /// Clear the path of every slot referencing `path`. Returns the slots
    /// that were cleared.
    pub fn clear_path(&mut self, path: &str) -> Vec<usize> {
        let mut cleared = Vec::new();
        for config in self.configs.iter_mut().filter(|c| c.path == path) {
            config.path.clear();
            cleared.push(config.index);
        }
        if self.global.config.path == path {
            self.global.config.path.clear();
        }
        cleared
    }
}
