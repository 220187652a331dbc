//! # 批量约化模块
//!
//! 对一个目录中的多份约化配置并行执行完整流程。
//!
//! ## 功能
//! - 收集匹配的配置文件
//! - 并行处理，每份配置一个独立的工作区存储
//! - 进度反馈与失败汇总
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchRunner, ProcessResult};
