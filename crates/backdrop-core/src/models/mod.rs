//! Backdrop 数据模型

pub mod settings;
pub mod wallpaper;

pub use settings::*;
pub use wallpaper::*;
