//! 定时切换命令

use backdrop_core::models::ScheduleOptions;
use backdrop_core::scheduler::is_valid_time;
use backdrop_core::utils::CommandError;

use crate::AppState;

/// 获取定时设置
pub async fn get_schedule(state: &AppState) -> Result<ScheduleOptions, CommandError> {
    Ok(state.engine.settings().await.schedule)
}

/// 保存定时设置并重新应用
pub async fn update_schedule(
    state: &AppState,
    options: ScheduleOptions,
) -> Result<(), CommandError> {
    state
        .engine
        .update_schedule(options)
        .await
        .map(|_| ())
        .map_err(CommandError::from)
}

/// 校验时间输入（HH:MM）
pub fn validate_time(value: String) -> bool {
    is_valid_time(&value)
}

/// 启动定时检查
pub async fn start_watcher(state: &AppState) -> Result<bool, CommandError> {
    state.engine.start_watcher().await;
    Ok(state.engine.is_watching())
}

/// 停止定时检查
pub async fn stop_watcher(state: &AppState) -> Result<(), CommandError> {
    state.engine.stop_watcher();
    Ok(())
}
