//! 插件设置数据模型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::wallpaper::{GlobalConfig, HistoryEntry, WallpaperConfig, RESERVED_SLOTS};

/// Settings schema version written by this build.
pub const CURRENT_VERSION: &str = "1.5.8";

/// 定时切换设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleOptions {
    pub day_night_mode: bool,
    pub weekly: bool,
    pub auto_switch: bool,
    /// HH:MM, 24h
    pub day_start_time: String,
    /// HH:MM, 24h
    pub night_start_time: String,
    /// HH:MM re-evaluation period
    pub interval_check_time: String,
    pub is_custom_interval: bool,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            day_night_mode: false,
            weekly: false,
            auto_switch: false,
            day_start_time: String::from("08:00"),
            night_start_time: String::from("20:00"),
            interval_check_time: String::from("00:10"),
            is_custom_interval: false,
        }
    }
}

/// 插件设置
///
/// Mirrors the persisted `data.json` blob. Keys this crate does not model
/// (colours, modal styles, text areas...) are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackdropSettings {
    #[serde(rename = "LatestVersion")]
    pub latest_version: String,
    /// Last resolved configuration; only its `Index` is read back on load.
    #[serde(rename = "currentWallpaper")]
    pub current_wallpaper: WallpaperConfig,
    #[serde(rename = "globalConfig")]
    pub global_config: GlobalConfig,
    /// Preview override active.
    #[serde(rename = "Preview")]
    pub preview: bool,
    #[serde(rename = "WallpaperConfigs")]
    pub wallpaper_configs: Vec<WallpaperConfig>,
    #[serde(rename = "HistoryPaths")]
    pub history: Vec<HistoryEntry>,
    /// Advanced mode: full opacity, z-index 0.
    #[serde(rename = "AdnvOpend")]
    pub advanced_mode: bool,
    #[serde(rename = "SizeLimited")]
    pub size_limited: bool,
    #[serde(rename = "ScheduledOptions")]
    pub schedule: ScheduleOptions,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BackdropSettings {
    fn default() -> Self {
        Self {
            latest_version: CURRENT_VERSION.to_string(),
            current_wallpaper: WallpaperConfig::default(),
            global_config: GlobalConfig::default(),
            preview: false,
            wallpaper_configs: (0..RESERVED_SLOTS).map(WallpaperConfig::for_slot).collect(),
            history: Vec::new(),
            advanced_mode: false,
            size_limited: true,
            schedule: ScheduleOptions::default(),
            extra: Map::new(),
        }
    }
}

impl BackdropSettings {
    /// Pad the slot array to the reserved length, make `index == position`
    /// and clamp every numeric field.
    pub fn normalize(&mut self) {
        let len = self.wallpaper_configs.len();
        if len < RESERVED_SLOTS {
            self.wallpaper_configs
                .extend((len..RESERVED_SLOTS).map(WallpaperConfig::for_slot));
        }
        for (i, config) in self.wallpaper_configs.iter_mut().enumerate() {
            config.index = i;
            config.clamp_ranges();
        }
        self.global_config.config.clamp_ranges();
        self.current_wallpaper.clamp_ranges();
    }
}
