//! # totscat - 全散射中子衍射数据约化
//!
//! 把样品、容器、钒和本底的 bank 数据约化为 S(Q)/F(Q)，统一成单一可执行文件。
//!
//! ## 子命令
//! - `reduce`   - 按 JSON 配置执行完整约化
//! - `batch`    - 并行约化多份配置
//! - `runs`     - 运行号范围展开/压缩
//! - `material` - 材料散射常数
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── config/     (JSON 配置与校验)
//!   │     ├── reduction/  (工作区存储、各约化阶段、流水线)
//!   │     ├── inelastic/  (Placzek 校正)
//!   │     ├── neutron/    (散射常数与材料)
//!   │     ├── io/         (加载器、保存器、GSAS)
//!   │     └── models/     (数据模型)
//!   ├── batch/      (并行批处理)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod inelastic;
mod io;
mod models;
mod neutron;
mod reduction;
mod utils;

use clap::Parser;
use cli::Cli;
use error::TotscatError;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        report(&e);
        std::process::exit(1);
    }
}

/// 打印错误类别、阶段和底层原因链
fn report(err: &TotscatError) {
    match err {
        TotscatError::Stage { stage, source } => {
            utils::output::print_error(&format!("{} in stage '{}': {}", err.kind(), stage, source));
            print_causes(source.as_ref());
        }
        other => {
            utils::output::print_error(&format!("{}: {}", other.kind(), other));
            print_causes(other);
        }
    }
}

fn print_causes(err: &dyn std::error::Error) {
    let mut cause = err.source();
    while let Some(e) = cause {
        utils::output::print_error(&format!("  caused by: {}", e));
        cause = e.source();
    }
}
