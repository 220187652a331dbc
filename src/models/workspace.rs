//! # 工作区数据模型
//!
//! 工作区（Workspace）是约化流水线中的核心实体：按探测器 bank 分组的
//! 直方图或事件列表，加上物理单位、分布标志和样品材料等元数据。
//!
//! ## 不变量
//! - 直方图的 bin 边界严格递增，`edges.len() == y.len() + 1 == e.len() + 1`
//! - 事件数据不能是分布（distribution）
//!
//! ## 依赖关系
//! - 被 `reduction/`、`inelastic/`、`io/` 使用
//! - 使用 `neutron/material.rs` 的 SampleMaterial

use crate::error::{Result, TotscatError};
use crate::neutron::SampleMaterial;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 默认主飞行路径 L1（m）
pub const DEFAULT_L1: f64 = 19.5;

/// 自变量轴的物理单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// 飞行时间（μs）
    TimeOfFlight,
    /// 波长（Å）
    Wavelength,
    /// d 间距（Å）
    DSpacing,
    /// 动量转移 Q（1/Å）
    MomentumTransfer,
}

impl FromStr for Unit {
    type Err = TotscatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "TOF" | "TimeOfFlight" => Ok(Unit::TimeOfFlight),
            "Wavelength" => Ok(Unit::Wavelength),
            "dSpacing" | "DSpacing" => Ok(Unit::DSpacing),
            "MomentumTransfer" | "Q" => Ok(Unit::MomentumTransfer),
            other => Err(TotscatError::UnsupportedUnit(other.to_string())),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::TimeOfFlight => write!(f, "TOF"),
            Unit::Wavelength => write!(f, "Wavelength"),
            Unit::DSpacing => write!(f, "dSpacing"),
            Unit::MomentumTransfer => write!(f, "MomentumTransfer"),
        }
    }
}

/// 单个 bank 的探测器几何
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BankGeometry {
    /// 次级飞行路径 L2（m）
    pub l2: f64,
    /// 散射角 2θ（度）
    pub polar: f64,
}

impl BankGeometry {
    pub fn new(l2: f64, polar: f64) -> Self {
        Self { l2, polar }
    }

    /// sin(θ)，θ 为散射角的一半
    pub fn sin_theta(&self) -> f64 {
        (self.polar.to_radians() / 2.0).sin()
    }
}

/// 直方图（bin 边界 + 计数 + 误差）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub y: Vec<f64>,
    pub e: Vec<f64>,
}

impl Histogram {
    /// 构造并检查长度与边界单调性
    pub fn new(edges: Vec<f64>, y: Vec<f64>, e: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 || edges.len() != y.len() + 1 || y.len() != e.len() {
            return Err(TotscatError::InvalidArgument(format!(
                "histogram needs n+1 edges for n values (got {} edges, {} y, {} e)",
                edges.len(),
                y.len(),
                e.len()
            )));
        }
        if edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(TotscatError::InvalidArgument(
                "histogram edges must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { edges, y, e })
    }

    /// 以泊松误差 √N 构造
    #[cfg(test)]
    pub fn from_counts(edges: Vec<f64>, counts: Vec<f64>) -> Result<Self> {
        let e = counts.iter().map(|c| c.abs().sqrt()).collect();
        Self::new(edges, counts, e)
    }

    /// bin 数
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// 各 bin 宽度
    pub fn widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// 各 bin 中心
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }
}

/// 带权重的中子事件
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 当前单位下的坐标
    pub x: f64,
    pub weight: f64,
    /// 权重误差的平方
    pub error_sq: f64,
}

impl Event {
    pub fn new(x: f64, weight: f64) -> Self {
        Self {
            x,
            weight,
            error_sq: weight * weight,
        }
    }
}

/// bank 数据：直方图或事件列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BankData {
    Histogram(Histogram),
    Events(Vec<Event>),
}

/// 一个探测器 bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub geometry: BankGeometry,
    pub data: BankData,
}

impl Bank {
    pub fn histogram(geometry: BankGeometry, histogram: Histogram) -> Self {
        Self {
            geometry,
            data: BankData::Histogram(histogram),
        }
    }

    #[cfg(test)]
    pub fn events(geometry: BankGeometry, events: Vec<Event>) -> Self {
        Self {
            geometry,
            data: BankData::Events(events),
        }
    }

    /// 以直方图形式借用
    pub fn as_histogram(&self) -> Option<&Histogram> {
        match &self.data {
            BankData::Histogram(h) => Some(h),
            BankData::Events(_) => None,
        }
    }

    pub fn as_histogram_mut(&mut self) -> Option<&mut Histogram> {
        match &mut self.data {
            BankData::Histogram(h) => Some(h),
            BankData::Events(_) => None,
        }
    }
}

/// 工作区
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// 在 WorkspaceStore 中的键
    pub name: String,
    pub unit: Unit,
    /// y 是否为 计数/bin 宽度
    pub distribution: bool,
    /// 主飞行路径 L1（m）
    pub l1: f64,
    pub banks: Vec<Bank>,
    pub sample: Option<SampleMaterial>,
}

impl Workspace {
    /// 创建非分布工作区
    pub fn new(name: &str, unit: Unit, banks: Vec<Bank>) -> Self {
        Self {
            name: name.to_string(),
            unit,
            distribution: false,
            l1: DEFAULT_L1,
            banks,
            sample: None,
        }
    }

    pub fn with_l1(mut self, l1: f64) -> Self {
        self.l1 = l1;
        self
    }

    pub fn with_sample(mut self, sample: SampleMaterial) -> Self {
        self.sample = Some(sample);
        self
    }

    /// 以新名字克隆
    pub fn renamed(&self, name: &str) -> Self {
        let mut ws = self.clone();
        ws.name = name.to_string();
        ws
    }

    pub fn number_of_banks(&self) -> usize {
        self.banks.len()
    }

    /// 是否含事件数据
    pub fn has_events(&self) -> bool {
        self.banks
            .iter()
            .any(|b| matches!(b.data, BankData::Events(_)))
    }

    /// 要求当前单位
    pub fn require_unit(&self, operation: &str, expected: Unit) -> Result<()> {
        if self.unit != expected {
            return Err(TotscatError::InvalidUnitState {
                operation: operation.to_string(),
                workspace: self.name.clone(),
                expected: expected.to_string(),
                actual: self.unit.to_string(),
            });
        }
        Ok(())
    }

    /// 要求所有 bank 均为直方图
    pub fn require_histogram(&self, operation: &str) -> Result<()> {
        if self.has_events() {
            return Err(TotscatError::EventData {
                operation: operation.to_string(),
                workspace: self.name.clone(),
            });
        }
        Ok(())
    }

    /// 借用所有直方图（含事件时报错）
    pub fn histograms(&self, operation: &str) -> Result<Vec<&Histogram>> {
        self.banks
            .iter()
            .map(|b| {
                b.as_histogram().ok_or_else(|| TotscatError::EventData {
                    operation: operation.to_string(),
                    workspace: self.name.clone(),
                })
            })
            .collect()
    }

    /// 样品材料，未设置时报 MissingMaterial
    pub fn sample_material(&self) -> Result<&SampleMaterial> {
        match &self.sample {
            Some(s) if !s.material.name().trim().is_empty() => Ok(s),
            _ => Err(TotscatError::MissingMaterial {
                workspace: self.name.clone(),
            }),
        }
    }

    /// 把误差带全部置零
    pub fn zero_errors(&mut self) {
        for bank in &mut self.banks {
            match &mut bank.data {
                BankData::Histogram(h) => h.e.iter_mut().for_each(|e| *e = 0.0),
                BankData::Events(events) => events.iter_mut().for_each(|ev| ev.error_sq = 0.0),
            }
        }
    }

    /// 所有 y 之和
    #[cfg(test)]
    pub fn total_intensity(&self) -> f64 {
        self.banks
            .iter()
            .map(|b| match &b.data {
                BankData::Histogram(h) => {
                    if self.distribution {
                        h.y.iter().zip(h.widths()).map(|(y, w)| y * w).sum::<f64>()
                    } else {
                        h.y.iter().sum::<f64>()
                    }
                }
                BankData::Events(events) => events.iter().map(|ev| ev.weight).sum::<f64>(),
            })
            .sum()
    }
}
