//! # 中子散射物理常数模块
//!
//! ## 子模块
//! - `scattering`: 元素中子散射长度/截面数据库
//! - `material`: 化学式解析与材料常数、原子数
//!
//! ## 依赖关系
//! - 被 `reduction/`、`inelastic/`、`commands/material.rs` 使用

pub mod material;
pub mod scattering;

pub use material::{Material, SampleMaterial};
