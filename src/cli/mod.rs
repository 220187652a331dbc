//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `reduce`: 按一份 JSON 配置执行完整约化
//! - `batch`: 并行约化一个目录中的多份配置
//! - `runs`: 运行号范围展开/压缩（嵌套子命令）
//!   - `expand`
//!   - `compress`
//! - `material`: 打印材料散射常数与原子数
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: reduce, batch, runs, material

pub mod batch;
pub mod material;
pub mod reduce;
pub mod runs;

use clap::{Parser, Subcommand};

/// totscat - 全散射中子衍射数据约化
#[derive(Parser)]
#[command(name = "totscat")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Total-scattering neutron diffraction reduction: raw banks to S(Q)/F(Q)", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Reduce one experiment described by a JSON configuration file
    Reduce(reduce::ReduceArgs),

    /// Reduce every configuration file in a directory in parallel
    Batch(batch::BatchArgs),

    /// Expand or compress run-number ranges
    Runs(runs::RunsArgs),

    /// Print neutron scattering constants of a material
    Material(material::MaterialArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reduce() {
        let cli = Cli::try_parse_from([
            "totscat",
            "reduce",
            "silicon.json",
            "--output-dir",
            "out",
            "--quiet",
        ])
        .unwrap();
        let Commands::Reduce(args) = cli.command else {
            panic!("expected reduce");
        };
        assert_eq!(args.config.to_str(), Some("silicon.json"));
        assert_eq!(args.output_dir.as_deref().and_then(|p| p.to_str()), Some("out"));
        assert!(args.quiet);
    }

    #[test]
    fn test_parse_runs_compress() {
        let cli = Cli::try_parse_from(["totscat", "runs", "compress", "1,2,3,8"]).unwrap();
        let Commands::Runs(args) = cli.command else {
            panic!("expected runs");
        };
        assert!(matches!(args.command, runs::RunsCommands::Compress { .. }));
    }
}
