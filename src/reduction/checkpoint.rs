//! # 检查点
//!
//! 把存储中的某个工作区交给 `Saver` 保存，并在存储的检查点日志中记下当时的句柄。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs`、`reduction/normalization.rs`、`inelastic/driver.rs` 使用
//! - 使用 `io/saver.rs`

use crate::error::Result;
use crate::io::saver::{SaveRequest, Saver};
use crate::models::Binning;
use crate::reduction::store::{WorkspaceHandle, WorkspaceStore};
use crate::utils::output::Reporter;

use std::path::PathBuf;

/// 保存上下文：主文件、输出目录、分组与 Q 分箱
pub struct Checkpointer<'a> {
    saver: &'a mut dyn Saver,
    /// 主输出文件名（`<Title>.nxs`）
    pub filename: String,
    pub output_dir: PathBuf,
    pub grouping: Option<String>,
    pub binning: Binning,
    pub reporter: Reporter,
}

impl<'a> Checkpointer<'a> {
    pub fn new(
        saver: &'a mut dyn Saver,
        filename: &str,
        output_dir: PathBuf,
        grouping: Option<String>,
        binning: Binning,
        reporter: Reporter,
    ) -> Self {
        Self {
            saver,
            filename: filename.to_string(),
            output_dir,
            grouping,
            binning,
            reporter,
        }
    }

    /// 清除上次运行留下的主文件
    pub fn reset(&mut self) -> Result<()> {
        self.saver.reset(&self.filename, &self.output_dir)
    }

    /// 清除任意输出文件
    pub fn reset_file(&mut self, filename: &str) -> Result<()> {
        self.saver.reset(filename, &self.output_dir)
    }

    /// 保存到主文件
    pub fn save(
        &mut self,
        store: &mut WorkspaceStore,
        name: &str,
        title: &str,
    ) -> Result<WorkspaceHandle> {
        let filename = self.filename.clone();
        self.save_to(store, name, title, &filename)
    }

    /// 保存到指定文件
    pub fn save_to(
        &mut self,
        store: &mut WorkspaceStore,
        name: &str,
        title: &str,
        filename: &str,
    ) -> Result<WorkspaceHandle> {
        let handle = store.handle(name)?;
        let request = SaveRequest {
            filename,
            title,
            output_dir: &self.output_dir,
            grouping: self.grouping.as_deref(),
            binning: &self.binning,
        };
        self.saver.save(store.get(name)?, &request)?;
        store.record_checkpoint(title, filename, handle.clone());
        self.reporter.checkpoint(title, filename);
        Ok(handle)
    }
}
