//! 壁纸命令

use std::path::PathBuf;

use serde::Deserialize;

use backdrop_core::host::PickedFile;
use backdrop_core::models::{HistoryEntry, WallpaperConfig};
use backdrop_core::services::{ResolvedWallpaper, StoredWallpaper};
use backdrop_core::utils::CommandError;

use crate::AppState;

/// Visual fields the settings UI may change; absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUpdate {
    pub z_index: Option<i32>,
    pub opacity: Option<f64>,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    pub blur_radius: Option<f64>,
    pub playback_speed: Option<f64>,
    pub reposition: Option<bool>,
    pub quality: Option<bool>,
    pub use_object_fit: Option<bool>,
    pub position: Option<String>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub scale: Option<f64>,
}

impl SlotUpdate {
    pub fn apply_to(self, config: &mut WallpaperConfig) {
        if let Some(v) = self.z_index {
            config.z_index = v;
        }
        if let Some(v) = self.opacity {
            config.opacity = v;
        }
        if let Some(v) = self.brightness {
            config.brightness = v;
        }
        if let Some(v) = self.contrast {
            config.contrast = v;
        }
        if let Some(v) = self.blur_radius {
            config.blur_radius = v;
        }
        if let Some(v) = self.playback_speed {
            config.playback_speed = v;
        }
        if let Some(v) = self.reposition {
            config.reposition = v;
        }
        if let Some(v) = self.quality {
            config.quality = v;
        }
        if let Some(v) = self.use_object_fit {
            config.use_object_fit = v;
        }
        if let Some(v) = self.position {
            config.position = v;
        }
        if let Some(v) = self.position_x {
            config.position_x = v;
        }
        if let Some(v) = self.position_y {
            config.position_y = v;
        }
        if let Some(v) = self.scale {
            config.scale = v;
        }
    }
}

/// 获取当前壁纸
///
/// Re-resolves for "now", so in auto-rotate mode each call advances the pool.
pub async fn get_current_wallpaper(state: &AppState) -> Result<ResolvedWallpaper, CommandError> {
    Ok(state.engine.resolve_current_config().await)
}

/// 获取全部槽位
pub async fn get_wallpaper_configs(state: &AppState) -> Result<Vec<WallpaperConfig>, CommandError> {
    Ok(state.engine.configs().await)
}

/// 重新应用壁纸到所有窗口
pub async fn apply_wallpaper(state: &AppState, skip_reload: bool) -> Result<(), CommandError> {
    state.engine.apply_all(skip_reload).await;
    Ok(())
}

/// 通过文件对话框选择并上传壁纸
///
/// `path` is what the host dialog returned; `None` means cancelled.
pub async fn open_file_picker(
    state: &AppState,
    path: Option<PathBuf>,
    slot: usize,
    is_scheduled: bool,
) -> Result<Option<StoredWallpaper>, CommandError> {
    state.picker.select(path.into_iter().collect());
    state
        .engine
        .open_file_picker(slot, is_scheduled)
        .await
        .map_err(CommandError::from)
}

/// 上传壁纸内容
pub async fn upload_wallpaper(
    state: &AppState,
    file_name: String,
    bytes: Vec<u8>,
    slot: usize,
    is_scheduled: bool,
) -> Result<StoredWallpaper, CommandError> {
    state
        .engine
        .store_file(PickedFile::new(file_name, bytes), slot, is_scheduled)
        .await
        .map_err(CommandError::from)
}

/// 导入文件夹到自动切换池
pub async fn import_folder(state: &AppState, dir: Option<PathBuf>) -> Result<usize, CommandError> {
    state.picker.select(dir.into_iter().collect());
    state
        .engine
        .open_folder_picker()
        .await
        .map_err(CommandError::from)
}

/// 获取最近使用记录
pub async fn get_history(state: &AppState) -> Result<Vec<HistoryEntry>, CommandError> {
    Ok(state.engine.history().await)
}

/// 从最近使用记录中选择壁纸
pub async fn select_history(
    state: &AppState,
    entry: usize,
    slot: usize,
) -> Result<(), CommandError> {
    state
        .engine
        .select_history(entry, slot)
        .await
        .map_err(CommandError::from)
}

/// 新增自动切换槽位
pub async fn add_slot(state: &AppState) -> Result<usize, CommandError> {
    state.engine.add_slot().await.map_err(CommandError::from)
}

/// 删除自动切换槽位
pub async fn remove_slot(state: &AppState, slot: usize) -> Result<(), CommandError> {
    state
        .engine
        .remove_slot(slot)
        .await
        .map_err(CommandError::from)
}

/// 清空指定位置之后的槽位
pub async fn clear_slots_from(state: &AppState, start: usize) -> Result<usize, CommandError> {
    state
        .engine
        .clear_slots_from(start)
        .await
        .map_err(CommandError::from)
}

/// 修改槽位样式
pub async fn update_slot(
    state: &AppState,
    slot: usize,
    update: SlotUpdate,
) -> Result<(), CommandError> {
    state
        .engine
        .update_slot(slot, |config| update.apply_to(config))
        .await
        .map_err(CommandError::from)
}

/// 修改全局样式
pub async fn update_global(state: &AppState, update: SlotUpdate) -> Result<(), CommandError> {
    state
        .engine
        .update_global(|config| update.apply_to(config))
        .await;
    Ok(())
}
