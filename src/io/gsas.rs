//! # GSAS 粉末衍射文件导出
//!
//! 把 TOF 单位的直方图工作区写成 GSAS SLOG 格式（FXYE 记录，扩展头）。
//! 每个 bank 一个 `BANK` 段，y 和误差乘以 bin 宽度。
//!
//! ```text
//! <title, 80 列>
//! # 3 Histograms
//! # Total flight path 21.500m, tth 90.000deg, DIFC 7686.2
//! # Data for spectrum :1
//! BANK 1 2000 2000 SLOG 350.0 26233.0 0.0100000 0 FXYE
//!       350.000       12.34567890        1.23456789
//! ```
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs` 调用
//! - 使用 `models/workspace.rs`

use crate::error::{Result, TotscatError};
use crate::models::{Unit, Workspace};
use crate::reduction::units::H_OVER_MN;

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// GSAS 记录宽度
const RECORD_WIDTH: usize = 80;

fn record(line: &str) -> String {
    format!("{:<width$}\n", line, width = RECORD_WIDTH)
}

/// 生成 GSAS 文本
pub fn format_gsas(ws: &Workspace, title: &str) -> Result<String> {
    ws.require_unit("SaveGSS", Unit::TimeOfFlight)?;
    let histograms = ws.histograms("SaveGSS")?;

    let mut out = String::new();
    out.push_str(&record(title));
    out.push_str(&record(&format!("# {} Histograms", histograms.len())));
    out.push_str(&record("# File generated by totscat"));

    for (index, (bank, h)) in ws.banks.iter().zip(&histograms).enumerate() {
        let flight_path = ws.l1 + bank.geometry.l2;
        let difc = 2.0 * bank.geometry.sin_theta() * flight_path / H_OVER_MN;
        out.push_str(&record(&format!(
            "# Total flight path {:.3}m, tth {:.3}deg, DIFC {:.1}",
            flight_path, bank.geometry.polar, difc
        )));
        out.push_str(&record(&format!("# Data for spectrum :{}", index + 1)));

        let first = h.edges[0];
        let last = h.edges[h.edges.len() - 1];
        let log_step = if h.edges.len() > 2 {
            h.edges[1] / h.edges[0] - 1.0
        } else {
            0.0
        };
        out.push_str(&record(&format!(
            "BANK {} {} {} SLOG {:.1} {:.1} {:.7} 0 FXYE",
            index + 1,
            h.len(),
            h.len(),
            first,
            last,
            log_step
        )));

        for (i, width) in h.widths().iter().enumerate() {
            // 分布数据乘回 bin 宽度；计数数据本身即每 bin 计数
            let factor = if ws.distribution { *width } else { 1.0 };
            let mut line = String::new();
            let _ = write!(
                line,
                "{:>15.3}{:>20.8}{:>20.8}",
                h.edges[i],
                h.y[i] * factor,
                h.e[i] * factor
            );
            out.push_str(&record(&line));
        }
    }

    Ok(out)
}

/// 写出 `.gsa` 文件（覆盖已有文件）
pub fn write_gsas(ws: &Workspace, path: &Path, title: &str) -> Result<()> {
    let text = format_gsas(ws, title)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| TotscatError::FileWriteError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    fs::write(path, text).map_err(|e| TotscatError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
