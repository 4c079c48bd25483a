//! Backdrop Core Library
//!
//! This crate provides the core logic of Backdrop, a live-wallpaper plugin
//! that shows an image, GIF or video behind the host application's UI. It is
//! frontend-agnostic: the host hands it a vault, an event sink, a document
//! registry, a file picker and a path provider.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `models`: Data structures (WallpaperConfig, GlobalConfig, settings blob)
//! - `scheduler`: Time-of-day, weekday and rotation slot selection
//! - `services`: Config store, file lifecycle, media applier, watcher, engine
//! - `host`: Window document, file picker and in-memory implementations
//! - `vault`: File access relative to the host config directory
//! - `events`: Event emission abstraction (EventSink trait)
//! - `paths`: Path provider abstraction (PathProvider trait)
//! - `utils`: Error handling and utilities
//!
//! # Example
//!
//! ```no_run
//! use backdrop_core::{BackdropCore, LocalPathProvider, NoOpEventSink, services::Backdrop};
//! use std::sync::Arc;
//!
//! # async fn run() -> backdrop_core::AppResult<()> {
//! let core = BackdropCore::new(
//!     Arc::new(LocalPathProvider::new("backdrop")),
//!     Arc::new(NoOpEventSink),
//! );
//! let engine = Backdrop::load(core)?;
//! engine.sync_watcher().await;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod host;
pub mod models;
pub mod paths;
pub mod scheduler;
pub mod services;
pub mod utils;
pub mod vault;

// Re-export commonly used types
pub use events::{EventSink, EventSinkExt, NoOpEventSink, SharedEventSink};
pub use host::{
    DocumentId, DocumentRegistry, FilePicker, MemoryDocument, PickedFile, QueuedFilePicker,
    SharedDocument, SharedFilePicker, WallpaperDocument,
};
pub use models::{BackdropSettings, GlobalConfig, HistoryEntry, ScheduleOptions, WallpaperConfig, WallpaperKind};
pub use paths::{LocalPathProvider, PathProvider, SharedPathProvider, WallpaperLayout};
pub use scheduler::{Clock, ManualClock, ScheduleMode, SharedClock, SystemClock};
pub use services::{Backdrop, SettingsManager, WallpaperConfigStore};
pub use utils::{AppError, AppResult, CommandError};
pub use vault::{LocalVault, SharedVault, Vault};

use std::sync::Arc;

/// Backdrop core application context.
///
/// Holds the host collaborators shared by every service.
#[derive(Clone)]
pub struct BackdropCore {
    /// Path provider for resolving plugin paths
    pub path_provider: SharedPathProvider,
    /// File access relative to the host config directory
    pub vault: SharedVault,
    /// Event sink for emitting events to the settings UI
    pub event_sink: SharedEventSink,
    /// Open windows
    pub documents: Arc<DocumentRegistry>,
    pub picker: SharedFilePicker,
    pub clock: SharedClock,
}

impl BackdropCore {
    /// Create a context with a local vault rooted at the config directory,
    /// the system clock and a picker that never returns a file.
    pub fn new(path_provider: SharedPathProvider, event_sink: SharedEventSink) -> Self {
        let vault: SharedVault = Arc::new(LocalVault::new(path_provider.config_dir()));
        Self {
            path_provider,
            vault,
            event_sink,
            documents: Arc::new(DocumentRegistry::new()),
            picker: Arc::new(QueuedFilePicker::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_vault(mut self, vault: SharedVault) -> Self {
        self.vault = vault;
        self
    }

    pub fn with_picker(mut self, picker: SharedFilePicker) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Get the path provider reference.
    pub fn paths(&self) -> &SharedPathProvider {
        &self.path_provider
    }

    /// Get the vault reference.
    pub fn vault(&self) -> &SharedVault {
        &self.vault
    }

    /// Get the event sink reference.
    pub fn events(&self) -> &SharedEventSink {
        &self.event_sink
    }

    /// Get the document registry reference.
    pub fn documents(&self) -> &Arc<DocumentRegistry> {
        &self.documents
    }

    pub fn picker(&self) -> &SharedFilePicker {
        &self.picker
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}
