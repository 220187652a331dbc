//! # batch 子命令 CLI 定义
//!
//! 并行约化一个目录中的多份配置
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/batch.rs`

use clap::Args;
use std::path::PathBuf;

/// batch 子命令参数
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory containing configuration files (or a single file)
    pub input: PathBuf,

    /// Glob pattern(s) for configuration files, comma-separated
    #[arg(long, default_value = "*.json")]
    pub pattern: String,

    /// Number of parallel reductions (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Override OutputDir for every configuration
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Override CacheDir for every configuration
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Re-reduce configurations whose GSAS output already exists
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
