//! Backdrop 命令模块
//!
//! 设置界面调用的命令。每个命令返回 `Result<_, CommandError>`。

pub mod schedule;
pub mod settings;
pub mod wallpaper;

pub use schedule::*;
pub use settings::*;
pub use wallpaper::*;
