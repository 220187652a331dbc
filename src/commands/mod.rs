//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config/`, `reduction/`, `batch/`, `utils/`
//! - 子模块: reduce, batch, runs, material

pub mod batch;
pub mod material;
pub mod reduce;
pub mod runs;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Reduce(args) => reduce::execute(args),
        Commands::Batch(args) => batch::execute(args),
        Commands::Runs(args) => runs::execute(args),
        Commands::Material(args) => material::execute(args),
    }
}
