//! # 配置文件收集器
//!
//! 根据输入路径和文件名模式收集待约化的配置文件列表。
//!
//! ## 功能
//! - 单个文件直接返回
//! - 目录按逗号分隔的多个 glob 模式过滤
//! - 可选递归搜索，结果按路径排序
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use crate::error::{Result, TotscatError};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 配置文件收集器
pub struct FileCollector {
    input: PathBuf,
    patterns: Vec<Pattern>,
    recursive: bool,
}

impl FileCollector {
    /// 默认收集 `*.json`
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: vec![Pattern::new("*.json").expect("valid default pattern")],
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    TotscatError::InvalidArgument(format!("invalid pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if !patterns.is_empty() {
            self.patterns = patterns;
        }
        Ok(self)
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }
        if !self.input.is_dir() {
            return Err(TotscatError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.patterns.iter().any(|p| p.matches(filename))
    }
}
