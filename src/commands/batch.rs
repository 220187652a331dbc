//! # batch 命令实现
//!
//! 并行约化多份配置。每份配置拥有独立的工作区存储和保存器，
//! 单个约化内部仍按阶段顺序执行。
//!
//! ## 依赖关系
//! - 使用 `cli/batch.rs` 定义的参数
//! - 使用 `batch/`、`reduction/pipeline.rs`
//! - 使用 `utils/output.rs`

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::batch::BatchArgs;
use crate::commands::reduce::load_config;
use crate::error::{Result, TotscatError};
use crate::io::{BankFileSaver, CsvLoader};
use crate::reduction::run_reduction;
use crate::utils::output::{self, Reporter};

use std::path::PathBuf;
use tabled::{Table, Tabled};

/// 失败列表行
#[derive(Debug, Clone, Tabled)]
struct FailureRow {
    #[tabled(rename = "Config")]
    config: String,
    #[tabled(rename = "Error")]
    kind: String,
    #[tabled(rename = "Stage")]
    stage: String,
}

/// 执行 batch 命令
pub fn execute(args: BatchArgs) -> Result<()> {
    output::print_header("Batch Reduction");

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect()?;

    if files.is_empty() {
        output::print_warning(&format!(
            "No configuration files matching '{}' in '{}'",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Found {} configurations, running {} in parallel",
        files.len(),
        runner.jobs()
    ));

    let result = runner.run(files, |path| reduce_one(path, &args))?;

    output::print_separator();
    output::print_success(&format!(
        "Batch complete: {} success, {} skipped, {} failed",
        result.success,
        result.skipped,
        result.failed()
    ));

    if result.failures.is_empty() {
        return Ok(());
    }

    let rows: Vec<FailureRow> = result
        .failures
        .iter()
        .map(|f| FailureRow {
            config: f.path.display().to_string(),
            kind: f.kind.clone(),
            stage: f.stage.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(&rows));
    for failure in &result.failures {
        output::print_error(&format!("{}: {}", failure.path.display(), failure.message));
    }

    Err(TotscatError::Other(format!(
        "{} of {} reductions failed",
        result.failed(),
        result.total()
    )))
}

/// 约化单份配置（静默）
fn reduce_one(path: &PathBuf, args: &BatchArgs) -> ProcessResult {
    let config = match load_config(path, args.output_dir.clone(), args.cache_dir.clone()) {
        Ok(config) => config,
        Err(e) => return ProcessResult::failed(path, &e),
    };

    let gsas = config.gsas_path();
    if gsas.exists() && !args.overwrite {
        return ProcessResult::Skipped(format!("'{}' exists", gsas.display()));
    }

    let loader = CsvLoader::new();
    let mut saver = BankFileSaver::new();
    match run_reduction(&config, &loader, &mut saver, Reporter::quiet()) {
        Ok(summary) => ProcessResult::Success(format!(
            "{}: {} checkpoints",
            summary.title,
            summary.checkpoints.len()
        )),
        Err(e) => ProcessResult::failed(path, &e),
    }
}
