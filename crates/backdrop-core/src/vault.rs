//! 文件存储抽象
//!
//! The host owns the file system the wallpapers live in. Paths handed to a
//! [`Vault`] are `/`-separated and relative to the host configuration dir.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::utils::{AppError, AppResult};

/// Contents of one vault directory, as vault-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListedFiles {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

/// File-system-like interface the wallpaper files are stored through.
pub trait Vault: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    /// Direct children of `dir`.
    fn list(&self, dir: &str) -> AppResult<ListedFiles>;

    fn write_binary(&self, path: &str, data: &[u8]) -> AppResult<()>;

    /// Remove a file.
    fn remove(&self, path: &str) -> AppResult<()>;

    /// Remove a directory and everything below it.
    fn remove_dir(&self, path: &str) -> AppResult<()>;

    /// Create `path` and its parents. Existing directories are fine.
    fn mkdir(&self, path: &str) -> AppResult<()>;

    fn copy(&self, from: &str, to: &str) -> AppResult<()>;

    /// URL the document layer loads the file from.
    fn resource_url(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Shared reference to a Vault implementation.
pub type SharedVault = Arc<dyn Vault>;

/// Best-effort delete. Failures are logged and swallowed.
pub fn remove_quietly(vault: &dyn Vault, path: &str) -> bool {
    match vault.remove(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(path, "清理文件失败（已忽略）: {}", e);
            false
        }
    }
}

/// Vault backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalVault {
    root: PathBuf,
}

impl LocalVault {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AppError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn join_relative(dir: &str, name: &str) -> String {
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{dir}/{name}")
        }
    }
}

impl Vault for LocalVault {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn list(&self, dir: &str) -> AppResult<ListedFiles> {
        let full = self.resolve(dir)?;
        let mut listed = ListedFiles::default();
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = Self::join_relative(dir, &name);
            if entry.file_type()?.is_dir() {
                listed.folders.push(relative);
            } else {
                listed.files.push(relative);
            }
        }
        listed.files.sort();
        listed.folders.sort();
        Ok(listed)
    }

    fn write_binary(&self, path: &str, data: &[u8]) -> AppResult<()> {
        let full = self.resolve(path)?;
        fs::write(full, data)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        fs::remove_file(full)?;
        Ok(())
    }

    fn remove_dir(&self, path: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        fs::remove_dir_all(full)?;
        Ok(())
    }

    fn mkdir(&self, path: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(full)?;
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> AppResult<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if !src.exists() {
            return Err(AppError::FileNotFound(from.to_string()));
        }
        fs::copy(src, dst)?;
        Ok(())
    }

    fn resource_url(&self, path: &str) -> String {
        self.resolve(path)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string())
    }
}
