//! # 非弹性（Placzek）校正模块
//!
//! ## 子模块
//! - `spectrum`: 入射谱拟合（单调三次样条 / 高斯卷积样条）
//! - `placzek`: 一阶 Placzek 自散射公式
//! - `driver`: 拟合、计算与扣除的编排
//!
//! ## 依赖关系
//! - 被 `reduction/normalization.rs` 和 `reduction/pipeline.rs` 调用
//! - 使用 `reduction/` 的单位转换、重分箱和二元运算

pub mod driver;
pub mod placzek;
pub mod spectrum;

pub use driver::{subtract_placzek, PlaczekRequest};
pub use spectrum::{fit_incident_spectrum, FittedSpectrum, MonitorSpectrum};

use crate::error::{Result, TotscatError};
use crate::models::Binning;

use std::str::FromStr;

/// 默认波长分箱
pub const DEFAULT_LAMBDA_BINNING: &str = "0.16,0.04,2.8";

/// 非弹性校正类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InelasticType {
    #[default]
    None,
    Placzek,
}

impl FromStr for InelasticType {
    type Err = TotscatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "None" | "none" => Ok(InelasticType::None),
            "Placzek" => Ok(InelasticType::Placzek),
            other => Err(TotscatError::UnsupportedCorrectionType(format!(
                "inelastic correction '{}'",
                other
            ))),
        }
    }
}

/// 入射谱拟合函数族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitFamily {
    CubicSpline,
    #[default]
    GaussConvCubicSpline,
}

impl FromStr for FitFamily {
    type Err = TotscatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "CubicSpline" => Ok(FitFamily::CubicSpline),
            "GaussConvCubicSpline" => Ok(FitFamily::GaussConvCubicSpline),
            other => Err(TotscatError::UnsupportedCorrectionType(format!(
                "incident spectrum fit '{}'",
                other
            ))),
        }
    }
}

/// 校正阶数（只支持一阶）
pub fn parse_order(order: &str) -> Result<u32> {
    match order.trim() {
        "1st" | "1" => Ok(1),
        other => Err(TotscatError::UnsupportedCorrectionType(format!(
            "Placzek order '{}'",
            other
        ))),
    }
}

/// 非弹性校正设置（默认值与用户设置合并后）
#[derive(Debug, Clone, PartialEq)]
pub struct InelasticSpec {
    pub kind: InelasticType,
    pub order: u32,
    pub self_scattering: bool,
    pub interference: bool,
    pub fit_with: FitFamily,
    pub lambda_binning_fit: Binning,
    pub lambda_binning_calc: Binning,
}

impl Default for InelasticSpec {
    fn default() -> Self {
        let binning: Binning = DEFAULT_LAMBDA_BINNING
            .parse()
            .expect("valid default lambda binning");
        Self {
            kind: InelasticType::None,
            order: 1,
            self_scattering: true,
            interference: false,
            fit_with: FitFamily::default(),
            lambda_binning_fit: binning.clone(),
            lambda_binning_calc: binning,
        }
    }
}

impl InelasticSpec {
    /// 是否需要运行 Placzek 驱动
    pub fn is_placzek(&self) -> bool {
        self.kind == InelasticType::Placzek
    }
}
