//! # runs 子命令 CLI 定义
//!
//! 运行号范围工具：
//! - `expand`: `"1-3,8"` → 逐个运行号
//! - `compress`: `"1,2,3,8"` → `"1-3, 8"`
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/runs.rs`

use clap::{Args, Subcommand};

/// runs 主命令参数
#[derive(Args, Debug)]
pub struct RunsArgs {
    #[command(subcommand)]
    pub command: RunsCommands,
}

/// runs 子命令
#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// Expand a range string such as "1-3,8-9,12" into run numbers
    Expand {
        /// Range string
        ranges: String,

        /// Print one run number per line
        #[arg(long, default_value_t = false)]
        lines: bool,
    },

    /// Compress a run list such as "1,2,3,8" into "1-3, 8"
    Compress {
        /// Comma-separated run numbers (ranges are accepted too)
        runs: String,
    },
}
