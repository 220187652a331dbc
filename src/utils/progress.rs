//! # 进度显示
//!
//! 封装 `indicatif`：批处理用计数进度条，单次静默约化用 spinner。
//!
//! ## 依赖关系
//! - 被 `batch/runner.rs` 和 `commands/reduce.rs` 使用
//! - 使用 `indicatif` crate

use crate::utils::output::Reporter;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// 批处理进度条，消息显示最近完成的配置
pub fn batch_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} configs ({eta}) {msg}",
        )
        .expect("valid progress template")
        .progress_chars("#>-"),
    );
    pb
}

/// 静默模式下的 spinner；详细模式逐阶段打印，不需要 spinner
pub fn reduction_spinner(reporter: Reporter, title: &str) -> Option<ProgressBar> {
    if reporter.is_verbose() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {elapsed_precise} {msg}")
            .expect("valid spinner template")
            .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]),
    );
    pb.set_message(format!("Reducing {}", title));
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}
