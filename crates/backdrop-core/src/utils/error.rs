//! Backdrop 错误处理模块
//!
//! 定义核心库错误类型

use serde::Serialize;
use thiserror::Error;

/// Core error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 路径无效
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// 文件未找到
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// 不支持的格式
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Upload exceeds the size limit.
    #[error("File is too large (max {limit_mb}MB): {name}")]
    FileTooLarge { name: String, limit_mb: u64 },

    /// Malformed schedule input.
    #[error("Invalid time value: {0}. Use HH:MM format")]
    InvalidTime(String),

    /// Slot index outside the addressable or removable range.
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    /// 通用错误
    #[error("{0}")]
    General(String),
}

/// Error wrapper returned across the UI boundary.
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl From<AppError> for CommandError {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::Io(_) => "E_IO_ERROR",
            AppError::InvalidPath(_) => "E_PATH_INVALID",
            AppError::FileNotFound(_) => "E_FILE_NOT_FOUND",
            AppError::UnsupportedFormat(_) => "E_UNSUPPORTED_FORMAT",
            AppError::FileTooLarge { .. } => "E_FILE_TOO_LARGE",
            AppError::InvalidTime(_) => "E_INVALID_TIME",
            AppError::InvalidSlot(_) => "E_INVALID_SLOT",
            AppError::Config(_) => "E_CONFIG",
            AppError::General(_) => "E_GENERAL",
        };

        CommandError {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let cmd_error = CommandError::from(AppError::General(self.to_string()));
        cmd_error.serialize(serializer)
    }
}

/// 结果类型别名
pub type AppResult<T> = Result<T, AppError>;
