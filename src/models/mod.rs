//! # 数据模型模块
//!
//! 定义工作区、重分箱参数和样品几何等数据模型。
//!
//! ## 依赖关系
//! - 被 `reduction/`、`inelastic/`、`io/` 和 `commands/` 使用
//! - 子模块: workspace, binning, geometry

pub mod binning;
pub mod geometry;
pub mod workspace;

pub use binning::Binning;
pub use geometry::{SampleGeometry, Shape};
pub use workspace::{Bank, BankData, BankGeometry, Event, Histogram, Unit, Workspace, DEFAULT_L1};
