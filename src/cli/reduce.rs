//! # reduce 子命令 CLI 定义
//!
//! 按 JSON 配置执行一次完整约化
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/reduce.rs`

use clap::Args;
use std::path::PathBuf;

/// reduce 子命令参数
#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// Path to the reduction configuration (JSON)
    pub config: PathBuf,

    /// Override the configured OutputDir
    #[arg(short, long, env = "TOTSCAT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override the configured CacheDir (location of the focused bank files)
    #[arg(long, env = "TOTSCAT_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Only print warnings and the final summary
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}
