//! # 约化模块
//!
//! 全散射数据约化的各个阶段与编排。
//!
//! ## 子模块
//! - `store`: 命名工作区存储与检查点日志
//! - `units`: TOF / 波长 / d / Q 单位转换
//! - `rebin`: 重分箱、事件直方化、裁剪
//! - `arithmetic`: 带误差传播的工作区加减除
//! - `absorption`: 圆柱/球形样品的吸收与多重散射因子
//! - `correction`: 校正方式选择与应用
//! - `stripping`, `smoothing`: 钒峰剥离与 FFT 平滑
//! - `normalization`: 钒标定工作区制备与归一化
//! - `structure_factor`: 原子数/截面缩放，F(Q)/S(Q)
//! - `checkpoint`: 阶段检查点保存
//! - `pipeline`: 完整约化流程
//!
//! ## 依赖关系
//! - 被 `commands/reduce.rs`、`batch/runner.rs` 使用
//! - 使用 `models/`、`neutron/`、`inelastic/`、`io/`

pub mod absorption;
pub mod arithmetic;
pub mod checkpoint;
pub mod correction;
pub mod normalization;
pub mod pipeline;
pub mod rebin;
pub mod smoothing;
pub mod store;
pub mod stripping;
pub mod structure_factor;
pub mod units;

pub use pipeline::{run_reduction, ReductionSummary};
