//! 插件设置服务
//!
//! 负责设置的读取、迁移、保存和管理

use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use crate::models::BackdropSettings;
use crate::paths::PathProvider;
use crate::services::migration::migrate_legacy;
use crate::utils::error::AppError;

/// 设置管理器
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// 使用 PathProvider 创建设置管理器
    pub fn new(provider: &dyn PathProvider) -> Result<Self, AppError> {
        Self::from_path(provider.settings_path())
    }

    /// 从指定路径创建设置管理器
    pub fn from_path(settings_path: PathBuf) -> Result<Self, AppError> {
        // 确保父目录存在
        if let Some(parent) = settings_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("无法创建配置目录: {}", e)))?;
        }

        Ok(Self { settings_path })
    }

    /// 加载设置
    ///
    /// Legacy blobs are migrated before parsing. The result is always
    /// normalised to at least the reserved slot count.
    pub fn load(&self) -> Result<BackdropSettings, AppError> {
        if !self.settings_path.exists() {
            tracing::info!("设置文件不存在，使用默认设置");
            return Ok(BackdropSettings::default());
        }

        let content = fs::read_to_string(&self.settings_path)
            .map_err(|e| AppError::Config(format!("无法读取设置文件: {}", e)))?;
        if content.trim().is_empty() {
            tracing::info!("设置文件为空，使用默认设置");
            return Ok(BackdropSettings::default());
        }

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("设置文件格式错误: {}", e)))?;
        let Value::Object(mut blob) = value else {
            return Err(AppError::Config("设置文件格式错误: 顶层必须是对象".to_string()));
        };

        if migrate_legacy(&mut blob) {
            tracing::info!("旧版设置已迁移: {:?}", self.settings_path);
        }

        let mut settings: BackdropSettings = serde_json::from_value(Value::Object(blob))
            .map_err(|e| AppError::Config(format!("设置文件格式错误: {}", e)))?;
        settings.normalize();

        tracing::info!("成功加载设置: {:?}", self.settings_path);
        Ok(settings)
    }

    /// 保存设置
    pub fn save(&self, settings: &BackdropSettings) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Config(format!("无法序列化设置: {}", e)))?;

        fs::write(&self.settings_path, content)
            .map_err(|e| AppError::Config(format!("无法保存设置文件: {}", e)))?;

        tracing::debug!("成功保存设置: {:?}", self.settings_path);
        Ok(())
    }

    /// 获取设置文件路径
    pub fn path(&self) -> &PathBuf {
        &self.settings_path
    }
}
