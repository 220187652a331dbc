//! # 运行号范围语法
//!
//! 在文本范围和整数列表之间双向转换：
//! - 展开: `"1-3, 8-9, 12"` -> `[1, 2, 3, 8, 9, 12]`
//! - 压缩: `[1, 2, 3, 8, 9, 12]` -> `"1-3, 8-9, 12"`
//!
//! 对已排序、连续段输入两者互为逆运算。
//!
//! ## 依赖关系
//! - 被 `config/mod.rs` 和 `commands/runs.rs` 使用
//! - 使用 `regex` 校验每个片段

use crate::error::{Result, TotscatError};

use regex::Regex;
use std::sync::LazyLock;

/// 单个片段: `12` 或 `1-3`（允许空白）
static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").expect("valid regex"));

/// 展开逗号/短横线范围字符串
pub fn expand_ints(spec: &str) -> Result<Vec<u32>> {
    if spec.trim().is_empty() {
        return Err(TotscatError::InvalidRange(format!("'{}' (empty)", spec)));
    }

    let mut runs = Vec::new();
    for segment in spec.split(',') {
        let caps = SEGMENT
            .captures(segment)
            .ok_or_else(|| TotscatError::InvalidRange(spec.to_string()))?;

        let start: u32 = caps[1]
            .parse()
            .map_err(|_| TotscatError::InvalidRange(spec.to_string()))?;
        let end: u32 = match caps.get(2) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| TotscatError::InvalidRange(spec.to_string()))?,
            None => start,
        };

        if end < start {
            return Err(TotscatError::InvalidRange(format!(
                "{} (descending span {}-{})",
                spec, start, end
            )));
        }
        runs.extend(start..=end);
    }

    Ok(runs)
}

/// 把整数序列压缩为最短的范围表示
pub fn compress_ints(runs: &[u32]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut iter = runs.iter().copied();

    let Some(first) = iter.next() else {
        return String::new();
    };

    let mut start = first;
    let mut last = first;
    for value in iter {
        if last.checked_add(1) == Some(value) {
            last = value;
            continue;
        }
        parts.push(format_span(start, last));
        start = value;
        last = value;
    }
    parts.push(format_span(start, last));

    parts.join(", ")
}

fn format_span(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
