//! # 检查点保存
//!
//! `Saver` 把工作区作为带标题的 "banks" 段追加到输出文件中。
//!
//! ## 实现
//! - `BankFileSaver`: 每个段写成一行 JSON，追加到 `<OutputDir>/<filename>`
//! - `MemorySaver`: 只在内存中记录（测试用）
//!
//! 写盘前在副本上做两件事：Q 数据重分箱到 Q 分箱，计数转为分布。
//! 被保存的工作区本身不受影响。
//!
//! ## 依赖关系
//! - 被 `reduction/checkpoint.rs` 使用
//! - 使用 `serde_json` 序列化

use crate::error::{Result, TotscatError};
use crate::models::{BankData, Binning, Unit, Workspace};
use crate::reduction::rebin::{histogram_events, rebin, AUTO_HISTOGRAM_BINS};
use crate::reduction::units::set_distribution;

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 一次保存请求
#[derive(Debug, Clone)]
pub struct SaveRequest<'a> {
    pub filename: &'a str,
    pub title: &'a str,
    pub output_dir: &'a Path,
    /// 分组工作区（Merging.Grouping.Output）
    pub grouping: Option<&'a str>,
    pub binning: &'a Binning,
}

/// 检查点保存协作者
pub trait Saver {
    /// 追加一个段
    fn save(&mut self, ws: &Workspace, request: &SaveRequest) -> Result<()>;

    /// 删除上一次运行残留的同名文件
    fn reset(&mut self, _filename: &str, _output_dir: &Path) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct BankSection<'a> {
    l2: f64,
    polar: f64,
    x: &'a [f64],
    y: &'a [f64],
    e: &'a [f64],
}

#[derive(Serialize)]
struct Section<'a> {
    title: &'a str,
    workspace: &'a str,
    unit: String,
    distribution: bool,
    grouping: Option<&'a str>,
    banks: Vec<BankSection<'a>>,
}

/// 追加 JSON 行的文件保存器
#[derive(Debug, Default)]
pub struct BankFileSaver;

impl BankFileSaver {
    pub fn new() -> Self {
        Self
    }

    fn path(filename: &str, output_dir: &Path) -> PathBuf {
        output_dir.join(filename)
    }
}

/// 保存前的规范化: Q 数据重分箱，转为分布
pub fn prepare_for_save(ws: &Workspace, binning: &Binning) -> Result<Workspace> {
    let mut out = ws.clone();
    if out.unit == Unit::MomentumTransfer {
        rebin(&mut out, binning)?;
    } else if out.has_events() {
        histogram_events(&mut out, AUTO_HISTOGRAM_BINS)?;
    }
    set_distribution(&mut out, true)?;
    Ok(out)
}

impl Saver for BankFileSaver {
    fn save(&mut self, ws: &Workspace, request: &SaveRequest) -> Result<()> {
        let prepared = prepare_for_save(ws, request.binning)?;
        let banks = prepared
            .banks
            .iter()
            .filter_map(|b| match &b.data {
                BankData::Histogram(h) => Some(BankSection {
                    l2: b.geometry.l2,
                    polar: b.geometry.polar,
                    x: &h.edges,
                    y: &h.y,
                    e: &h.e,
                }),
                BankData::Events(_) => None,
            })
            .collect();
        let section = Section {
            title: request.title,
            workspace: &ws.name,
            unit: prepared.unit.to_string(),
            distribution: prepared.distribution,
            grouping: request.grouping,
            banks,
        };
        let line = serde_json::to_string(&section)?;

        let path = Self::path(request.filename, request.output_dir);
        let write_err = |e| TotscatError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        };
        std::fs::create_dir_all(request.output_dir).map_err(write_err)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(write_err)?;
        writeln!(file, "{}", line).map_err(write_err)?;
        Ok(())
    }

    fn reset(&mut self, filename: &str, output_dir: &Path) -> Result<()> {
        let path = Self::path(filename, output_dir);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| TotscatError::FileWriteError {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// 内存中记录的一个段
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SavedSection {
    pub filename: String,
    pub title: String,
    pub workspace: Workspace,
}

/// 只记录不落盘的保存器
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySaver {
    pub sections: Vec<SavedSection>,
}

#[cfg(test)]
impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序列出某个文件中的段标题
    pub fn titles(&self, filename: &str) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.filename == filename)
            .map(|s| s.title.as_str())
            .collect()
    }

    /// 查找某个标题最近一次保存的内容
    pub fn section(&self, title: &str) -> Option<&SavedSection> {
        self.sections.iter().rev().find(|s| s.title == title)
    }
}

#[cfg(test)]
impl Saver for MemorySaver {
    fn save(&mut self, ws: &Workspace, request: &SaveRequest) -> Result<()> {
        self.sections.push(SavedSection {
            filename: request.filename.to_string(),
            title: request.title.to_string(),
            workspace: ws.clone(),
        });
        Ok(())
    }
}
