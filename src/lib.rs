//! Backdrop - 动态壁纸插件
//!
//! Host bridge around `backdrop-core`: logging, event forwarding and the
//! command surface called by the settings UI.

pub mod adapters;
pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;

use backdrop_core::paths::{LocalPathProvider, PathProvider};
use backdrop_core::services::Backdrop;
use backdrop_core::BackdropCore;

use adapters::{ChannelEventSink, DiskFilePicker, HostEventReceiver};

/// Default plugin identifier, also the folder name under `plugins/`.
pub const PLUGIN_ID: &str = "backdrop";

/// How the host starts the plugin.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Host configuration directory; `None` uses the platform default.
    pub config_dir: Option<PathBuf>,
    pub plugin_id: String,
    /// Install the global tracing subscriber.
    pub init_logging: bool,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            config_dir: None,
            plugin_id: PLUGIN_ID.to_string(),
            init_logging: true,
        }
    }
}

/// 应用程序状态
pub struct AppState {
    pub engine: Arc<Backdrop>,
    pub picker: Arc<DiskFilePicker>,
    _log_guard: Option<WorkerGuard>,
}

/// Load the plugin and start the watcher.
///
/// Must be called from within a tokio runtime. Events for the settings UI
/// arrive on the returned receiver.
pub async fn start(options: HostOptions) -> anyhow::Result<(AppState, HostEventReceiver)> {
    let paths = match options.config_dir {
        Some(dir) => LocalPathProvider::with_base_dir(dir, options.plugin_id.as_str()),
        None => LocalPathProvider::new(options.plugin_id.as_str()),
    };

    // 初始化日志系统
    let log_guard = if options.init_logging {
        Some(logging::init_logging(&paths.logs_dir())?)
    } else {
        None
    };
    tracing::info!("Backdrop 启动中...");
    tracing::info!("配置目录: {:?}", paths.config_dir());

    let (event_sink, receiver) = ChannelEventSink::shared();
    let picker = Arc::new(DiskFilePicker::new());
    let core = BackdropCore::new(Arc::new(paths), event_sink).with_picker(picker.clone());

    let engine = Backdrop::load(core).context("无法加载壁纸引擎")?;
    engine.sync_watcher().await;
    tracing::info!("Backdrop 初始化完成");

    Ok((
        AppState {
            engine,
            picker,
            _log_guard: log_guard,
        },
        receiver,
    ))
}

impl AppState {
    /// Tear the plugin down. Settings are saved one last time.
    pub async fn shutdown(self) {
        if let Err(e) = self.engine.save().await {
            tracing::warn!("退出时保存设置失败: {}", e);
        }
        self.engine.unload();
        tracing::info!("Backdrop 已退出");
    }
}
