//! Backdrop 工具模块
//!
//! 包含通用工具函数

pub mod debounce;
pub mod error;
pub mod sanitize;

pub use debounce::Debouncer;
pub use error::*;
pub use sanitize::*;
