//! Backdrop 服务模块
//!
//! 包含所有业务逻辑服务

pub mod config_store;
pub mod engine;
pub mod file_lifecycle;
pub mod history;
pub mod media_applier;
pub mod migration;
pub mod settings;
pub mod watcher;

// 重新导出常用类型
pub use config_store::{ResolvedWallpaper, WallpaperConfigStore};
pub use engine::{Backdrop, DEBOUNCE_DELAY};
pub use file_lifecycle::{
    validate_upload, wallpaper_kind_for, FileLifecycleManager, StoredWallpaper,
    ALLOWED_EXTENSIONS, SIZE_LIMIT_MB,
};
pub use history::{HistoryList, HISTORY_LIMIT};
pub use media_applier::{ApplyOutcome, MediaApplier, MediaKey, MediaState};
pub use migration::{is_version_less, migrate_legacy, needs_migration};
pub use settings::SettingsManager;
pub use watcher::WallpaperWatcher;
