//! # 批量执行器
//!
//! 并行执行多个相互独立的约化任务。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代，每个任务内部保持顺序执行
//! - 进度条显示
//! - 失败按错误类别与阶段汇总
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::{Result, TotscatError};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// 单个任务的处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// 完成，附带简短说明
    Success(String),
    /// 跳过（如输出已存在）
    Skipped(String),
    Failed(Failure),
}

impl ProcessResult {
    /// 把约化错误转为失败记录
    pub fn failed(path: &Path, err: &TotscatError) -> Self {
        ProcessResult::Failed(Failure {
            path: path.to_path_buf(),
            kind: err.kind().to_string(),
            stage: err.stage().map(str::to_string),
            message: err.to_string(),
        })
    }
}

/// 失败任务的详情
#[derive(Debug, Clone)]
pub struct Failure {
    pub path: PathBuf,
    pub kind: String,
    pub stage: Option<String>,
    pub message: String,
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    pub success: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,
}

impl BatchResult {
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Success(_) => self.success += 1,
            ProcessResult::Skipped(_) => self.skipped += 1,
            ProcessResult::Failed(failure) => self.failures.push(failure),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed()
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// `jobs == 0` 时使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理任务列表，结果按输入顺序合并
    pub fn run<T, F>(&self, items: Vec<T>, processor: F) -> Result<BatchResult>
    where
        T: Sync,
        F: Fn(&T) -> ProcessResult + Sync + Send,
    {
        let pb = progress::batch_bar(items.len() as u64);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| TotscatError::Other(format!("failed to build thread pool: {}", e)))?;

        let results: Vec<ProcessResult> = pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    let result = processor(item);
                    if let ProcessResult::Success(msg) | ProcessResult::Skipped(msg) = &result {
                        pb.set_message(msg.clone());
                    }
                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut batch_result = BatchResult::default();
        for result in results {
            batch_result.merge(result);
        }
        Ok(batch_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_collects_all_outcomes() {
        let runner = BatchRunner::new(2);
        let items: Vec<u32> = (0..9).collect();
        let result = runner
            .run(items, |&i| match i % 3 {
                0 => ProcessResult::Success(format!("{}", i)),
                1 => ProcessResult::Skipped(format!("{}", i)),
                _ => ProcessResult::failed(
                    Path::new("x.json"),
                    &TotscatError::MissingMaterial {
                        workspace: "sample".to_string(),
                    },
                ),
            })
            .unwrap();
        assert_eq!(result.total(), 9);
        assert_eq!((result.success, result.skipped, result.failed()), (3, 3, 3));
        assert_eq!(result.failures[0].kind, "MissingMaterialError");
        assert_eq!(result.failures[0].stage, None);
    }

    #[test]
    fn test_auto_jobs() {
        assert!(BatchRunner::new(0).jobs() >= 1);
    }
}
