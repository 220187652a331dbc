//! # 仪器特征文件
//!
//! 每行 `bank d_min d_max`（空白或逗号分隔），`#` 开头为注释。
//! 约化只用它报告各 bank 的 Q 范围 `2π/d_max … 2π/d_min`。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs` 调用

use crate::error::{Result, TotscatError};

use std::f64::consts::PI;
use std::fs;
use std::path::Path;

/// 单个 bank 的 d 范围
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BankRange {
    pub bank: usize,
    pub d_min: f64,
    pub d_max: f64,
}

impl BankRange {
    /// 对应的 (Q_min, Q_max)
    pub fn q_range(&self) -> (f64, f64) {
        (2.0 * PI / self.d_max, 2.0 * PI / self.d_min)
    }
}

/// 读取特征文件
pub fn read_characterizations(path: &Path) -> Result<Vec<BankRange>> {
    if !path.exists() {
        return Err(TotscatError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = fs::read_to_string(path).map_err(|e| TotscatError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_characterizations(&content, &path.display().to_string())
}

/// 从文本解析
pub fn parse_characterizations(content: &str, source: &str) -> Result<Vec<BankRange>> {
    let error = |line: usize, reason: String| TotscatError::ParseError {
        format: "characterizations".to_string(),
        path: source.to_string(),
        reason: format!("line {}: {}", line, reason),
    };

    let mut ranges = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() < 3 {
            return Err(error(number + 1, format!("expected 'bank d_min d_max', got '{}'", line)));
        }
        let bank = parts[0]
            .parse()
            .map_err(|_| error(number + 1, format!("invalid bank '{}'", parts[0])))?;
        let d_min: f64 = parts[1]
            .parse()
            .map_err(|_| error(number + 1, format!("invalid d_min '{}'", parts[1])))?;
        let d_max: f64 = parts[2]
            .parse()
            .map_err(|_| error(number + 1, format!("invalid d_max '{}'", parts[2])))?;
        if !(d_min > 0.0 && d_max > d_min) {
            return Err(error(number + 1, format!("bad d range {}..{}", d_min, d_max)));
        }
        ranges.push(BankRange { bank, d_min, d_max });
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_q_range() {
        let text = "# bank dmin dmax\n1 0.2 3.0\n2, 0.5, 6.28318\n";
        let ranges = parse_characterizations(text, "mem").unwrap();
        assert_eq!(ranges.len(), 2);
        let (qmin, qmax) = ranges[1].q_range();
        assert!((qmin - 1.0).abs() < 1e-5);
        assert!((qmax - 4.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_rows() {
        assert!(parse_characterizations("1 0.5\n", "mem").is_err());
        assert!(parse_characterizations("1 2.0 1.0\n", "mem").is_err());
    }
}
