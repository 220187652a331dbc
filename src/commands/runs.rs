//! # runs 命令实现
//!
//! 运行号范围的展开与压缩。
//!
//! ## 依赖关系
//! - 使用 `cli/runs.rs` 定义的参数
//! - 使用 `config/runs.rs`

use crate::cli::runs::{RunsArgs, RunsCommands};
use crate::config::{compress_ints, expand_ints};
use crate::error::Result;

/// 执行 runs 命令
pub fn execute(args: RunsArgs) -> Result<()> {
    match args.command {
        RunsCommands::Expand { ranges, lines } => {
            let runs = expand_ints(&ranges)?;
            let separator = if lines { "\n" } else { ", " };
            println!("{}", join(&runs, separator));
        }
        RunsCommands::Compress { runs } => {
            println!("{}", compress(&runs)?);
        }
    }
    Ok(())
}

/// 逗号分隔的运行号（也接受范围）→ 压缩后的范围串
fn compress(runs: &str) -> Result<String> {
    let mut runs = expand_ints(runs)?;
    runs.sort_unstable();
    runs.dedup();
    Ok(compress_ints(&runs))
}

fn join(runs: &[u32], separator: &str) -> String {
    runs.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}
