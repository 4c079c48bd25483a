//! 日志初始化
//!
//! Console output plus a daily rolling file under the plugin's `logs/`
//! folder. `RUST_LOG` overrides the default `info` level.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Log file prefix; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "backdrop.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must live as
/// long as the plugin.
pub fn init_logging(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("无法创建日志目录: {:?}", log_dir))?;

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(std::io::stdout.and(file_writer))
        .try_init()
        .map_err(|e| anyhow::anyhow!("日志系统已初始化: {}", e))?;

    tracing::info!("日志目录: {:?}", log_dir);
    Ok(guard)
}

/// Files written so far, oldest first.
pub fn log_files(log_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_logging_writes_daily_file() {
        let tmp = TempDir::new().unwrap();
        let log_dir = tmp.path().join("logs");

        // another test may already own the global subscriber
        match init_logging(&log_dir) {
            Ok(guard) => {
                tracing::info!("hello from test");
                drop(guard);
                assert_eq!(log_files(&log_dir).len(), 1);
            }
            Err(_) => assert!(log_dir.is_dir()),
        }
    }

    #[test]
    fn test_log_files_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(log_files(&tmp.path().join("nope")).is_empty());
    }
}
