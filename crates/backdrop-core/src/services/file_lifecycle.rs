//! 壁纸文件生命周期管理
//!
//! Uploads land in the active folder of the slot's role plus a history copy.
//! Afterwards the active folder is pruned so that only referenced files stay.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{HistoryEntry, SlotRole, WallpaperKind};
use crate::paths::WallpaperLayout;
use crate::services::config_store::WallpaperConfigStore;
use crate::services::history::{HistoryList, HISTORY_LIMIT};
use crate::utils::{file_extension, sanitize_filename_component, with_name_suffix, AppError, AppResult};
use crate::vault::{remove_quietly, SharedVault};

/// Accepted upload extensions (lower-case).
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "webm", "avif"];

/// Upload size limit when size limiting is on.
pub const SIZE_LIMIT_MB: u64 = 12;

const QUALITY_SUFFIX: &str = "_quality";

/// Media kind implied by a file name.
pub fn wallpaper_kind_for(file_name: &str) -> WallpaperKind {
    file_extension(file_name)
        .map(|ext| WallpaperKind::from_extension(&ext))
        .unwrap_or_default()
}

/// Reject unsupported or oversized uploads before touching the disk.
pub fn validate_upload(file_name: &str, size: u64, size_limited: bool) -> AppResult<WallpaperKind> {
    let ext = file_extension(file_name).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::UnsupportedFormat(file_name.to_string()));
    }
    if size_limited && size > SIZE_LIMIT_MB * 1024 * 1024 {
        return Err(AppError::FileTooLarge {
            name: file_name.to_string(),
            limit_mb: SIZE_LIMIT_MB,
        });
    }
    Ok(WallpaperKind::from_extension(&ext))
}

/// Result of a successful store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWallpaper {
    pub slot: usize,
    /// Active copy, now referenced by the slot.
    pub path: String,
    pub history_path: String,
    pub kind: WallpaperKind,
    pub file_name: String,
}

/// 文件生命周期管理器
pub struct FileLifecycleManager {
    vault: SharedVault,
    layout: WallpaperLayout,
}

impl FileLifecycleManager {
    pub fn new(vault: SharedVault, layout: WallpaperLayout) -> Self {
        Self { vault, layout }
    }

    pub fn layout(&self) -> &WallpaperLayout {
        &self.layout
    }

    pub fn vault(&self) -> &SharedVault {
        &self.vault
    }

    /// Store an upload for `slot` and point the slot at it.
    ///
    /// Both the active and the history copy are written before the slot is
    /// updated. If the history copy fails, a newly written active file is
    /// removed again and the error is returned.
    pub fn store(
        &self,
        store: &mut WallpaperConfigStore,
        history: &mut HistoryList,
        file_name: &str,
        bytes: &[u8],
        slot: usize,
        size_limited: bool,
    ) -> AppResult<StoredWallpaper> {
        let Some(target) = store.slot(slot) else {
            return Err(AppError::InvalidSlot(slot.to_string()));
        };
        let kind = validate_upload(file_name, bytes.len() as u64, size_limited)?;

        let mut name = sanitize_filename_component(file_name);
        if target.quality && kind != WallpaperKind::Video {
            name = with_name_suffix(&name, QUALITY_SUFFIX);
        }

        self.vault.mkdir(&self.layout.active_dir(slot))?;
        self.vault.mkdir(&self.layout.history_dir())?;

        let active_path = self.layout.active_file(slot, &name);
        let existed = self.vault.exists(&active_path);
        self.vault.write_binary(&active_path, bytes)?;

        let history_path = self.layout.history_file(&name);
        if !self.vault.exists(&history_path) {
            if let Err(e) = self.vault.copy(&active_path, &history_path) {
                if !existed {
                    remove_quietly(self.vault.as_ref(), &active_path);
                }
                tracing::error!(path = %history_path, "写入历史副本失败: {}", e);
                return Err(e);
            }
        }

        store.set_slot_media(slot, &active_path, kind)?;

        history.prepend(HistoryEntry {
            path: history_path.clone(),
            kind,
            file_name: name.clone(),
        });
        for evicted in history.trim(HISTORY_LIMIT) {
            remove_quietly(self.vault.as_ref(), &evicted.path);
        }

        self.prune_active(store, slot, &active_path);

        tracing::info!(slot, path = %active_path, "壁纸已保存");
        Ok(StoredWallpaper {
            slot,
            path: active_path,
            history_path,
            kind,
            file_name: name,
        })
    }

    /// Delete files of `slot`'s active folder that nothing references.
    ///
    /// The `normal` folder keeps only `keep`. Role folders keep every file
    /// still referenced by a slot of that role.
    pub fn prune_active(&self, store: &WallpaperConfigStore, slot: usize, keep: &str) {
        let dir = self.layout.active_dir(slot);
        let listed = match self.vault.list(&dir) {
            Ok(listed) => listed,
            Err(e) => {
                tracing::debug!(dir = %dir, "无法列出目录，跳过清理: {}", e);
                return;
            }
        };

        let role = SlotRole::for_index(slot);
        let referenced: HashSet<String> = match role {
            SlotRole::Normal => HashSet::from([keep.to_string()]),
            _ => store.paths_for_role(role).into_iter().collect(),
        };

        let mut removed = 0usize;
        for file in listed.files.iter().filter(|f| !referenced.contains(*f)) {
            if remove_quietly(self.vault.as_ref(), file) {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(dir = %dir, removed, "已清理未引用的壁纸文件");
        }
    }

    /// Remove the pre-1.5 single wallpaper folder if it is still around.
    pub fn remove_legacy_folder(&self) {
        let legacy = self.layout.legacy_dir();
        if self.vault.exists(&legacy) {
            if let Err(e) = self.vault.remove_dir(&legacy) {
                tracing::warn!(dir = %legacy, "无法删除旧壁纸目录: {}", e);
            }
        }
    }
}
