//! # 重分箱参数
//!
//! 解析形如 `x0,dx0,x1[,dx1,x2...]` 的重分箱参数：
//! - 正步长为线性 bin
//! - 负步长为对数 bin（x_{i+1} = x_i · (1 + |dx|)）
//!
//! 例: Q 分箱 `"0.0,0.02,40.0"`，TOF 输出 `"300,-0.01,16000"`
//!
//! ## 依赖关系
//! - 被 `config/`、`reduction/units.rs`、`inelastic/` 使用
//! - 无外部模块依赖

use crate::error::{Result, TotscatError};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 单段允许的最大 bin 数
const MAX_BINS: f64 = 1.0e7;

/// 重分箱参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    params: Vec<f64>,
}

impl Binning {
    /// 从参数列表构造（长度须为奇数且 ≥ 3）
    pub fn new(params: Vec<f64>) -> Result<Self> {
        if params.len() < 3 || params.len() % 2 == 0 {
            return Err(TotscatError::InvalidArgument(format!(
                "binning needs x0,dx,x1[,dx,x2...] (got {} values)",
                params.len()
            )));
        }
        for chunk in params.windows(3).step_by(2) {
            let (lo, step, hi) = (chunk[0], chunk[1], chunk[2]);
            if !(hi > lo) || step == 0.0 || !step.is_finite() {
                return Err(TotscatError::InvalidArgument(format!(
                    "invalid binning segment {},{},{}",
                    lo, step, hi
                )));
            }
            if step < 0.0 && lo <= 0.0 {
                return Err(TotscatError::InvalidArgument(format!(
                    "logarithmic binning must start above zero (got {})",
                    lo
                )));
            }
            // 步长必须能推进 x，且 bin 数有界
            let (advances, bins) = if step > 0.0 {
                let top = lo.abs().max(hi.abs());
                (top + step > top, (hi - lo) / step)
            } else {
                (1.0 + step.abs() > 1.0, (hi / lo).ln() / step.abs().ln_1p())
            };
            if !advances || !(bins <= MAX_BINS) {
                return Err(TotscatError::InvalidArgument(format!(
                    "binning step {} is too small for {}..{}",
                    step, lo, hi
                )));
            }
        }
        Ok(Self { params })
    }

    /// 线性分箱快捷构造
    #[cfg(test)]
    pub fn linear(min: f64, step: f64, max: f64) -> Result<Self> {
        Self::new(vec![min, step, max])
    }

    /// 生成 bin 边界
    ///
    /// 最后一个 bin 若小于半个步长则并入前一个 bin。
    pub fn edges(&self) -> Vec<f64> {
        let mut edges = vec![self.params[0]];
        for chunk in self.params.windows(3).step_by(2) {
            let (step, hi) = (chunk[1], chunk[2]);
            let mut x = edges[edges.len() - 1];
            loop {
                let next = if step > 0.0 { x + step } else { x * (1.0 - step) };
                if next >= hi {
                    let width = next - x;
                    let remainder = hi - x;
                    if remainder < 0.5 * width && edges.len() > 1 {
                        edges.pop();
                    }
                    edges.push(hi);
                    break;
                }
                edges.push(next);
                x = next;
            }
        }
        edges
    }
}

impl FromStr for Binning {
    type Err = TotscatError;

    fn from_str(s: &str) -> Result<Self> {
        let params = s
            .split(',')
            .map(|p| {
                p.trim().parse::<f64>().map_err(|_| {
                    TotscatError::InvalidArgument(format!("invalid binning '{}'", s))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(params)
    }
}

impl std::fmt::Display for Binning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
