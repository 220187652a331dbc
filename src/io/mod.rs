//! # 输入输出协作者
//!
//! 约化核心只通过这里的窄接口读写数据。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs`、`commands/` 使用
//! - 子模块: loader, saver, gsas, characterizations

pub mod characterizations;
pub mod gsas;
pub mod loader;
pub mod saver;

pub use loader::CsvLoader;
pub use saver::BankFileSaver;
