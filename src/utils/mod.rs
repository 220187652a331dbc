//! # 工具函数模块
//!
//! 提供美化输出、流水线 Reporter 与进度条。
//!
//! ## 依赖关系
//! - 被 `commands/`、`reduction/`、`batch/` 使用
//! - 子模块: output, progress

pub mod output;
pub mod progress;
