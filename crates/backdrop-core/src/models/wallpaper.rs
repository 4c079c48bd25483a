//! 壁纸配置数据模型

use serde::{Deserialize, Serialize};

/// Slot 0: the manual / default wallpaper.
pub const DEFAULT_SLOT: usize = 0;
/// Slot 1: day wallpaper of the day/night pair.
pub const DAY_SLOT: usize = 1;
/// Slot 2: night wallpaper of the day/night pair.
pub const NIGHT_SLOT: usize = 2;
/// Slots 3..=9: Monday..Sunday.
pub const WEEKLY_START: usize = 3;
/// First slot of the auto-rotating pool.
pub const AUTO_SWITCH_START: usize = 10;
/// Number of slots that always exist.
pub const RESERVED_SLOTS: usize = AUTO_SWITCH_START;

/// Media kind of a wallpaper file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperKind {
    #[default]
    Image,
    Video,
    Gif,
}

impl WallpaperKind {
    /// Media kind implied by a file extension (without dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "webm" => WallpaperKind::Video,
            "gif" => WallpaperKind::Gif,
            _ => WallpaperKind::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WallpaperKind::Image => "image",
            WallpaperKind::Video => "video",
            WallpaperKind::Gif => "gif",
        }
    }
}

/// Scheduling role of a slot, derived purely from its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotRole {
    Normal,
    DayNight,
    Weekly,
    AutoSwitch,
}

impl SlotRole {
    pub fn for_index(index: usize) -> Self {
        match index {
            DEFAULT_SLOT => SlotRole::Normal,
            DAY_SLOT | NIGHT_SLOT => SlotRole::DayNight,
            i if i < AUTO_SWITCH_START => SlotRole::Weekly,
            _ => SlotRole::AutoSwitch,
        }
    }

    /// Storage subfolder under `wallpapers/active/`.
    pub fn subfolder(&self) -> &'static str {
        match self {
            SlotRole::Normal => "normal",
            SlotRole::DayNight => "daily",
            SlotRole::Weekly => "weekly",
            SlotRole::AutoSwitch => "autoSwitch",
        }
    }

    /// Slot indices belonging to this role in a set of `len` slots.
    pub fn range(&self, len: usize) -> std::ops::Range<usize> {
        let (start, end) = match self {
            SlotRole::Normal => (DEFAULT_SLOT, DAY_SLOT),
            SlotRole::DayNight => (DAY_SLOT, WEEKLY_START),
            SlotRole::Weekly => (WEEKLY_START, AUTO_SWITCH_START),
            SlotRole::AutoSwitch => (AUTO_SWITCH_START, len.max(AUTO_SWITCH_START)),
        };
        start.min(len)..end.min(len)
    }
}

/// Storage subfolder for a slot index.
pub fn compute_active_subfolder(index: usize) -> &'static str {
    SlotRole::for_index(index).subfolder()
}

/// One wallpaper configuration slot.
///
/// Field names follow the persisted settings blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallpaperConfig {
    /// Resource path relative to the host config dir; empty means unset.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: WallpaperKind,
    #[serde(rename = "zIndex")]
    pub z_index: i32,
    /// 0..=100
    pub opacity: f64,
    /// Percent, 20..=130
    pub brightness: f64,
    /// Percent, 0..=200
    pub contrast: f64,
    /// Pixels, 0..=20
    #[serde(rename = "blurRadius")]
    pub blur_radius: f64,
    /// 0.25..=2.0, video only
    #[serde(rename = "playbackSpeed")]
    pub playback_speed: f64,
    #[serde(rename = "Reposition")]
    pub reposition: bool,
    /// Keep full resolution on upload.
    #[serde(rename = "Quality")]
    pub quality: bool,
    #[serde(rename = "useObjectFit")]
    pub use_object_fit: bool,
    /// Named anchor used when not repositioning.
    pub position: String,
    #[serde(rename = "positionX")]
    pub position_x: f64,
    #[serde(rename = "positionY")]
    pub position_y: f64,
    #[serde(rename = "Scale")]
    pub scale: f64,
    /// Equals the slot's position in the owning sequence.
    #[serde(rename = "Index")]
    pub index: usize,
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            kind: WallpaperKind::Image,
            z_index: 5,
            opacity: 40.0,
            brightness: 100.0,
            contrast: 100.0,
            blur_radius: 8.0,
            playback_speed: 1.0,
            reposition: false,
            quality: false,
            use_object_fit: true,
            position: String::from("Center"),
            position_x: 50.0,
            position_y: 50.0,
            scale: 1.0,
            index: 0,
        }
    }
}

impl WallpaperConfig {
    /// Default configuration for the slot at `index`.
    pub fn for_slot(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn has_path(&self) -> bool {
        !self.path.trim().is_empty()
    }

    /// Clamp every numeric field into its valid range.
    pub fn clamp_ranges(&mut self) {
        self.opacity = clamp_or(self.opacity, 0.0, 100.0, 40.0);
        self.brightness = clamp_or(self.brightness, 20.0, 130.0, 100.0);
        self.contrast = clamp_or(self.contrast, 0.0, 200.0, 100.0);
        self.blur_radius = clamp_or(self.blur_radius, 0.0, 20.0, 8.0);
        self.playback_speed = clamp_or(self.playback_speed, 0.25, 2.0, 1.0);
        self.position_x = clamp_or(self.position_x, 0.0, 100.0, 50.0);
        self.position_y = clamp_or(self.position_y, 0.0, 100.0, 50.0);
        self.scale = clamp_or(self.scale, 0.5, 2.0, 1.0);
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// A visual preset applied to whichever slot the scheduler selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub config: WallpaperConfig,
    pub enabled: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            config: WallpaperConfig::default(),
            enabled: true,
        }
    }
}

impl GlobalConfig {
    /// The preset's visual fields with the slot's `path`, `type` and `index`.
    pub fn merge_onto(&self, slot: &WallpaperConfig) -> WallpaperConfig {
        WallpaperConfig {
            path: slot.path.clone(),
            kind: slot.kind,
            index: slot.index,
            ..self.config.clone()
        }
    }
}

/// A recently uploaded wallpaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: WallpaperKind,
    pub file_name: String,
}
