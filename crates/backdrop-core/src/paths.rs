//! Path provider abstraction.
//!
//! Resolves the host configuration directory and the plugin's own folders
//! without depending on any particular host.

use std::path::PathBuf;
use std::sync::Arc;

use crate::models::compute_active_subfolder;

/// Trait for providing plugin data paths.
pub trait PathProvider: Send + Sync {
    /// The host configuration directory. Vault paths are relative to it.
    fn config_dir(&self) -> PathBuf;

    /// Plugin identifier, used as the folder name under `plugins/`.
    fn plugin_id(&self) -> &str;

    /// `<config-dir>/plugins/<id>`
    fn plugin_dir(&self) -> PathBuf {
        self.config_dir().join("plugins").join(self.plugin_id())
    }

    /// Get the settings file path.
    fn settings_path(&self) -> PathBuf {
        self.plugin_dir().join("data.json")
    }

    /// Get the logs directory.
    fn logs_dir(&self) -> PathBuf {
        self.plugin_dir().join("logs")
    }
}

/// Shared reference to a PathProvider implementation.
pub type SharedPathProvider = Arc<dyn PathProvider>;

/// Local path provider rooted at the platform config directory.
#[derive(Debug, Clone)]
pub struct LocalPathProvider {
    config_dir: PathBuf,
    plugin_id: String,
}

impl LocalPathProvider {
    /// Uses `<platform config dir>/Backdrop`.
    pub fn new(plugin_id: impl Into<String>) -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Backdrop");
        Self {
            config_dir,
            plugin_id: plugin_id.into(),
        }
    }

    /// Create a LocalPathProvider with a custom base directory.
    ///
    /// Useful for testing.
    pub fn with_base_dir(base_dir: PathBuf, plugin_id: impl Into<String>) -> Self {
        Self {
            config_dir: base_dir,
            plugin_id: plugin_id.into(),
        }
    }
}

impl PathProvider for LocalPathProvider {
    fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

/// Vault-relative wallpaper folder layout (`/`-separated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperLayout {
    plugin_root: String,
    base: String,
}

impl WallpaperLayout {
    pub fn new(plugin_id: &str) -> Self {
        let plugin_root = format!("plugins/{plugin_id}");
        Self {
            base: format!("{plugin_root}/wallpapers"),
            plugin_root,
        }
    }

    pub fn from_provider(provider: &dyn PathProvider) -> Self {
        Self::new(provider.plugin_id())
    }

    /// `plugins/<id>/wallpapers`
    pub fn base_dir(&self) -> &str {
        &self.base
    }

    /// Active folder for the role of `slot`.
    pub fn active_dir(&self, slot: usize) -> String {
        format!("{}/active/{}", self.base, compute_active_subfolder(slot))
    }

    pub fn active_file(&self, slot: usize, file_name: &str) -> String {
        format!("{}/{}", self.active_dir(slot), file_name)
    }

    pub fn history_dir(&self) -> String {
        format!("{}/history", self.base)
    }

    pub fn history_file(&self, file_name: &str) -> String {
        format!("{}/{}", self.history_dir(), file_name)
    }

    /// Single-folder layout used before the per-role folders existed.
    pub fn legacy_dir(&self) -> String {
        format!("{}/wallpaper", self.plugin_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_provider_paths() {
        let tmp = TempDir::new().unwrap();
        let provider = LocalPathProvider::with_base_dir(tmp.path().to_path_buf(), "backdrop");
        assert_eq!(
            provider.settings_path(),
            tmp.path().join("plugins").join("backdrop").join("data.json")
        );
        assert_eq!(
            provider.logs_dir(),
            tmp.path().join("plugins").join("backdrop").join("logs")
        );
    }

    #[test]
    fn test_wallpaper_layout() {
        let layout = WallpaperLayout::new("backdrop");
        assert_eq!(layout.active_dir(0), "plugins/backdrop/wallpapers/active/normal");
        assert_eq!(
            layout.active_file(12, "a.png"),
            "plugins/backdrop/wallpapers/active/autoSwitch/a.png"
        );
        assert_eq!(layout.history_file("a.png"), "plugins/backdrop/wallpapers/history/a.png");
        assert_eq!(layout.legacy_dir(), "plugins/backdrop/wallpaper");
    }
}
