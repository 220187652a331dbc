//! # 样品几何
//!
//! 束流中样品的形状与体积。长度单位为 cm。
//!
//! ## 依赖关系
//! - 被 `neutron/material.rs`（原子数）和 `reduction/correction.rs`（吸收）使用
//! - 无外部模块依赖

use crate::error::{Result, TotscatError};

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// 支持的样品形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shape {
    #[default]
    Cylinder,
    Sphere,
}

impl FromStr for Shape {
    type Err = TotscatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Cylinder" | "cylinder" => Ok(Shape::Cylinder),
            "Sphere" | "sphere" => Ok(Shape::Sphere),
            other => Err(TotscatError::UnsupportedGeometry(other.to_string())),
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Cylinder => write!(f, "Cylinder"),
            Shape::Sphere => write!(f, "Sphere"),
        }
    }
}

/// 样品几何
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleGeometry {
    pub shape: Shape,
    /// 半径（cm）
    pub radius: Option<f64>,
    /// 高度（cm，仅圆柱）
    pub height: Option<f64>,
}

impl SampleGeometry {
    /// 半径，缺失时报 MissingGeometry
    pub fn require_radius(&self, required_by: &str) -> Result<f64> {
        self.radius.ok_or_else(|| TotscatError::MissingGeometry {
            field: "Radius".to_string(),
            required_by: required_by.to_string(),
        })
    }

    /// 样品体积（cm³）
    pub fn volume(&self) -> Result<f64> {
        let radius = self.require_radius(&format!("{} volume", self.shape))?;
        match self.shape {
            Shape::Cylinder => {
                let height = self.height.ok_or_else(|| TotscatError::MissingGeometry {
                    field: "Height".to_string(),
                    required_by: "Cylinder volume".to_string(),
                })?;
                Ok(PI * radius * radius * height)
            }
            Shape::Sphere => Ok(4.0 / 3.0 * PI * radius * radius * radius),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volumes() {
        let sphere = SampleGeometry {
            shape: Shape::Sphere,
            radius: Some(2.0),
            height: None,
        };
        assert!((sphere.volume().unwrap() - 32.0 / 3.0 * PI).abs() < 1e-12);

        let cylinder = SampleGeometry {
            shape: Shape::Cylinder,
            radius: Some(0.3),
            height: Some(1.8),
        };
        assert!((cylinder.volume().unwrap() - PI * 0.09 * 1.8).abs() < 1e-12);
    }

    #[test]
    fn test_unsupported_shape() {
        assert!(matches!(
            "Annulus".parse::<Shape>(),
            Err(TotscatError::UnsupportedGeometry(_))
        ));
    }
}
