//! # 美化输出工具
//!
//! 提供统一的终端输出样式，以及流水线使用的 `Reporter`。
//!
//! 批处理模式下多个约化并行运行，使用静默的 Reporter 避免输出交错；
//! 警告和错误在静默模式下仍然输出。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `reduction/` 使用
//! - 使用 `colored` crate

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印检查点保存消息
pub fn print_checkpoint(title: &str, file: &str) {
    println!(
        "{} {} {} {}",
        "[SAVE]".green().bold(),
        title,
        "->".cyan(),
        file.dimmed()
    );
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// 流水线输出级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reporter {
    verbose: bool,
}

impl Reporter {
    pub fn verbose() -> Self {
        Self { verbose: true }
    }

    pub fn quiet() -> Self {
        Self { verbose: false }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// 阶段标题
    pub fn stage(&self, title: &str) {
        if self.verbose {
            print_header(title);
        }
    }

    pub fn info(&self, msg: &str) {
        if self.verbose {
            print_info(msg);
        }
    }

    pub fn checkpoint(&self, title: &str, file: &str) {
        if self.verbose {
            print_checkpoint(title, file);
        }
    }

    /// 警告总是输出
    pub fn warning(&self, msg: &str) {
        print_warning(msg);
    }
}
