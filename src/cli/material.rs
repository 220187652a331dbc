//! # material 子命令 CLI 定义
//!
//! 打印材料的中子散射常数，给出几何时同时计算束流中的原子数
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/material.rs`

use crate::models::Shape;

use clap::{Args, ValueEnum};

/// 样品形状
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ShapeArg {
    /// Cylinder (needs --radius and --height)
    Cylinder,
    /// Sphere (needs --radius)
    Sphere,
}

impl From<ShapeArg> for Shape {
    fn from(arg: ShapeArg) -> Self {
        match arg {
            ShapeArg::Cylinder => Shape::Cylinder,
            ShapeArg::Sphere => Shape::Sphere,
        }
    }
}

/// material 子命令参数
#[derive(Args, Debug)]
pub struct MaterialArgs {
    /// Chemical formula, e.g. "Si" or "SiO2"
    pub formula: String,

    /// Mass density in g/cm³
    #[arg(short, long)]
    pub density: Option<f64>,

    /// Packing fraction
    #[arg(short, long, default_value_t = 1.0)]
    pub packing: f64,

    /// Sample shape
    #[arg(long, value_enum, default_value = "cylinder")]
    pub shape: ShapeArg,

    /// Sample radius in cm
    #[arg(long)]
    pub radius: Option<f64>,

    /// Sample height in cm (cylinder only)
    #[arg(long)]
    pub height: Option<f64>,

    /// Wavelength (Å) at which the absorption cross-section is reported
    #[arg(long, default_value_t = 1.7982)]
    pub wavelength: f64,
}
