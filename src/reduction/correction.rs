//! # 吸收 / 多重散射校正引擎
//!
//! 校正方法由配置中的两个类型标签决定:
//!
//! | AbsorptionCorrection | MultipleScatteringCorrection | 方法 |
//! |----------------------|------------------------------|------|
//! | Carpenter            | 任意                          | Carpenter |
//! | Mayers               | Mayers                       | Mayers（含多重散射）|
//! | Mayers               | 其他                          | Mayers（不含多重散射）|
//! | None                 | Carpenter / Mayers           | 按多重散射标签选择 |
//! | None                 | None                         | 跳过（仅警告）|
//!
//! 校正必须在波长单位下进行，校正后 I' = I / (A·(1+δ))。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs` 和 `reduction/normalization.rs` 调用
//! - 使用 `reduction/absorption.rs` 数值核

use crate::error::{Result, TotscatError};
use crate::models::{BankData, SampleGeometry, Shape, Unit, Workspace};
use crate::reduction::absorption::AbsorptionKernel;
use crate::utils::output::Reporter;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 每个 bank 上 A 和 δ 的波长节点数
const WAVELENGTH_NODES: usize = 64;

/// 配置中的校正类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorrectionType {
    #[default]
    None,
    Carpenter,
    Mayers,
}

impl FromStr for CorrectionType {
    type Err = TotscatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "None" | "none" => Ok(CorrectionType::None),
            "Carpenter" => Ok(CorrectionType::Carpenter),
            "Mayers" => Ok(CorrectionType::Mayers),
            other => Err(TotscatError::UnsupportedCorrectionType(other.to_string())),
        }
    }
}

impl std::fmt::Display for CorrectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionType::None => write!(f, "None"),
            CorrectionType::Carpenter => write!(f, "Carpenter"),
            CorrectionType::Mayers => write!(f, "Mayers"),
        }
    }
}

/// 实际执行的校正方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMethod {
    None,
    Carpenter,
    Mayers { multiple_scattering: bool },
}

impl CorrectionMethod {
    /// 由吸收和多重散射两个标签决定方法，吸收标签优先
    pub fn resolve(absorption: CorrectionType, multiple_scattering: CorrectionType) -> Self {
        match (absorption, multiple_scattering) {
            (CorrectionType::Carpenter, _) => CorrectionMethod::Carpenter,
            (CorrectionType::Mayers, ms) => CorrectionMethod::Mayers {
                multiple_scattering: ms == CorrectionType::Mayers,
            },
            (CorrectionType::None, CorrectionType::Carpenter) => CorrectionMethod::Carpenter,
            (CorrectionType::None, CorrectionType::Mayers) => CorrectionMethod::Mayers {
                multiple_scattering: true,
            },
            (CorrectionType::None, CorrectionType::None) => CorrectionMethod::None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CorrectionMethod::None => "None",
            CorrectionMethod::Carpenter => "Carpenter",
            CorrectionMethod::Mayers { .. } => "Mayers",
        }
    }
}

/// 在波长单位下对工作区做吸收/多重散射校正，返回新工作区
///
/// `CorrectionMethod::None` 只克隆并打印警告。
pub fn apply_correction(
    ws: &Workspace,
    method: CorrectionMethod,
    geometry: &SampleGeometry,
    out_name: &str,
    reporter: &Reporter,
) -> Result<Workspace> {
    ws.require_unit("absorption/multiple scattering correction", Unit::Wavelength)?;

    let (shape, multiple_scattering) = match method {
        CorrectionMethod::None => {
            reporter.warning(&format!(
                "No absorption/MS correction applied to '{}'",
                ws.name
            ));
            return Ok(ws.renamed(out_name));
        }
        CorrectionMethod::Carpenter => (Shape::Cylinder, true),
        CorrectionMethod::Mayers {
            multiple_scattering,
        } => (geometry.shape, multiple_scattering),
    };

    let radius = geometry.require_radius(method.name())?;
    let material = ws.sample_material()?;
    let kernel = AbsorptionKernel::new(shape, radius, geometry.height);
    let mu_s = material.scattering_coefficient();

    let mut out = ws.renamed(out_name);
    for bank in &mut out.banks {
        let two_theta = bank.geometry.polar;
        let Some((lo, hi)) = bank_range(&bank.data) else {
            continue;
        };

        // 在波长节点上制表
        let nodes: Vec<f64> = (0..WAVELENGTH_NODES)
            .map(|i| lo + (hi - lo) * i as f64 / (WAVELENGTH_NODES - 1) as f64)
            .collect();
        let factors: Vec<f64> = nodes
            .iter()
            .map(|&lambda| {
                let mu_t = mu_s + material.absorption_coefficient(lambda);
                let attenuation = kernel.attenuation(mu_t, two_theta);
                let delta = if multiple_scattering && mu_t > 0.0 {
                    mu_s / mu_t * (1.0 - kernel.escape_probability(mu_t))
                } else {
                    0.0
                };
                attenuation * (1.0 + delta)
            })
            .collect();
        let factor_at = |lambda: f64| interpolate(&nodes, &factors, lambda);

        match &mut bank.data {
            BankData::Histogram(h) => {
                let centers = h.centers();
                for (i, x) in centers.into_iter().enumerate() {
                    let f = factor_at(x);
                    h.y[i] /= f;
                    h.e[i] /= f;
                }
            }
            BankData::Events(events) => {
                for ev in events.iter_mut() {
                    let f = factor_at(ev.x);
                    ev.weight /= f;
                    ev.error_sq /= f * f;
                }
            }
        }
    }
    Ok(out)
}

fn bank_range(data: &BankData) -> Option<(f64, f64)> {
    match data {
        BankData::Histogram(h) => Some((h.edges[0], h.edges[h.edges.len() - 1])),
        BankData::Events(events) => {
            let lo = events.iter().map(|e| e.x).fold(f64::INFINITY, f64::min);
            let hi = events.iter().map(|e| e.x).fold(f64::NEG_INFINITY, f64::max);
            (lo.is_finite() && hi.is_finite()).then_some((lo, hi.max(lo + f64::EPSILON)))
        }
    }
}

/// 线性插值，越界时取端点值
pub fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs.partition_point(|&v| v <= x) - 1;
    let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + t * (ys[i + 1] - ys[i])
}
