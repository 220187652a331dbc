//! # reduce 命令实现
//!
//! 读取 JSON 配置，运行完整约化流水线并打印摘要。
//!
//! ## 功能
//! - 命令行覆盖 OutputDir / CacheDir
//! - 静默模式下显示 spinner
//! - 以表格打印检查点与散射常数
//!
//! ## 依赖关系
//! - 使用 `cli/reduce.rs` 定义的参数
//! - 使用 `config/`、`reduction/pipeline.rs`、`io/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::reduce::ReduceArgs;
use crate::config::ReductionConfig;
use crate::error::Result;
use crate::io::{BankFileSaver, CsvLoader};
use crate::reduction::{run_reduction, ReductionSummary};
use crate::utils::output::{self, Reporter};
use crate::utils::progress;

use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// 检查点表格行
#[derive(Debug, Clone, Tabled)]
struct CheckpointRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Workspace")]
    workspace: String,
}

/// 数值摘要表格行
#[derive(Debug, Clone, Tabled)]
struct QuantityRow {
    #[tabled(rename = "Quantity")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// 执行 reduce 命令
pub fn execute(args: ReduceArgs) -> Result<()> {
    output::print_header("Total Scattering Reduction");

    let config = load_config(&args.config, args.output_dir, args.cache_dir)?;
    output::print_info(&format!(
        "'{}' on {} ({}), calibration '{}', output in '{}'",
        config.title,
        config.instrument,
        config.facility,
        config.calibration_file,
        config.output_dir.display()
    ));

    let reporter = if args.quiet {
        Reporter::quiet()
    } else {
        Reporter::verbose()
    };
    let spinner = progress::reduction_spinner(reporter, &config.title);

    let loader = CsvLoader::new();
    let mut saver = BankFileSaver::new();
    let result = run_reduction(&config, &loader, &mut saver, reporter);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let summary = result?;
    print_summary(&summary);
    output::print_success(&format!("Reduction of '{}' complete", summary.title));
    Ok(())
}

/// 读取配置并应用命令行覆盖
pub fn load_config(
    path: &Path,
    output_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
) -> Result<ReductionConfig> {
    let mut config = ReductionConfig::from_file(path)?;
    if let Some(dir) = output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(dir) = cache_dir {
        config = config.with_cache_dir(dir);
    }
    Ok(config)
}

fn print_summary(summary: &ReductionSummary) {
    output::print_header("Summary");

    let rows: Vec<CheckpointRow> = summary
        .checkpoints
        .iter()
        .enumerate()
        .map(|(i, c)| CheckpointRow {
            index: i + 1,
            title: c.title.clone(),
            file: c.file.clone(),
            workspace: c.handle.to_string(),
        })
        .collect();
    println!("{}", Table::new(&rows));
    println!();

    let constants = &summary.constants;
    let mut quantities = vec![
        QuantityRow {
            name: "Sample atoms",
            value: format!("{:.6e}", summary.sample_atoms),
        },
        QuantityRow {
            name: "Vanadium atoms",
            value: format!("{:.6e}", summary.vanadium_atoms),
        },
        QuantityRow {
            name: "<b>^2 (fm^2)",
            value: format!("{:.6}", constants.bcoh_avg_sqrd),
        },
        QuantityRow {
            name: "<b^2> (fm^2)",
            value: format!("{:.6}", constants.btot_sqrd_avg),
        },
        QuantityRow {
            name: "Laue term",
            value: format!("{:.6}", constants.laue_term()),
        },
        QuantityRow {
            name: "Sample total xs (b)",
            value: format!("{:.4}", summary.sample_xs),
        },
        QuantityRow {
            name: "Vanadium total xs (b)",
            value: format!("{:.4}", summary.vanadium_xs),
        },
        QuantityRow {
            name: "sigma_v / 4pi",
            value: format!("{:.6}", summary.prefactor),
        },
    ];
    for (bank, qmin, qmax) in &summary.q_ranges {
        quantities.push(QuantityRow {
            name: "Q range (1/Å)",
            value: format!("bank {}: {:.4} - {:.4}", bank, qmin, qmax),
        });
    }
    println!("{}", Table::new(&quantities));

    match &summary.gsas_file {
        Some(path) => output::print_info(&format!("GSAS file: {}", path.display())),
        None => output::print_warning("No GSAS file written"),
    }
}
