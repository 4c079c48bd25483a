//! 设置管理命令

use backdrop_core::models::BackdropSettings;
use backdrop_core::utils::CommandError;

use crate::AppState;

/// 获取插件设置
pub async fn get_settings(state: &AppState) -> Result<BackdropSettings, CommandError> {
    Ok(state.engine.settings().await)
}

/// 保存插件设置
pub async fn save_settings(state: &AppState) -> Result<(), CommandError> {
    state.engine.save().await.map_err(CommandError::from)
}

/// 预览指定槽位；`None` 退出预览
pub async fn set_preview(state: &AppState, slot: Option<usize>) -> Result<(), CommandError> {
    state
        .engine
        .set_preview(slot)
        .await
        .map_err(CommandError::from)
}

/// 启用或停用全局样式
pub async fn set_global_enabled(state: &AppState, enabled: bool) -> Result<(), CommandError> {
    state
        .engine
        .set_global_enabled(enabled)
        .await
        .map_err(CommandError::from)
}

/// 高级模式：不透明度 100%，层级 0
pub async fn set_advanced_mode(state: &AppState, enabled: bool) -> Result<(), CommandError> {
    state
        .engine
        .set_advanced_mode(enabled)
        .await
        .map_err(CommandError::from)
}

/// 上传大小限制开关
pub async fn set_size_limited(state: &AppState, enabled: bool) -> Result<(), CommandError> {
    state
        .engine
        .set_size_limited(enabled)
        .await
        .map_err(CommandError::from)
}
