//! # 结构因子组装
//!
//! 对完全校正后的样品工作区 C:
//! - 原子数缩放: C *= N_van / N_sample
//! - 截面缩放:   C *= σ_V / 4π
//! - F(Q) = C
//! - S(Q) = C / <b>² − <b²>/<b>² + 1
//!
//! <b>² 和 <b²> 都取自样品材料；未设置材料时报 MissingMaterial，且不修改任何工作区。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs` 调用
//! - 使用 `neutron/material.rs`

use crate::error::{Result, TotscatError};
use crate::models::{BankData, Workspace};
use crate::neutron::Material;
use crate::reduction::arithmetic::scale;

use serde::Serialize;
use std::f64::consts::PI;

/// 样品的散射长度常数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatteringConstants {
    /// <b>²（fm²）
    pub bcoh_avg_sqrd: f64,
    /// <b²>（fm²）
    pub btot_sqrd_avg: f64,
}

impl ScatteringConstants {
    pub fn of(material: &Material) -> Result<Self> {
        let bcoh = material.coh_scatter_length();
        let constants = Self {
            bcoh_avg_sqrd: bcoh * bcoh,
            btot_sqrd_avg: material.total_scatter_length_sqrd(),
        };
        if constants.bcoh_avg_sqrd == 0.0 {
            return Err(TotscatError::InvalidArgument(format!(
                "material '{}' has zero average coherent scattering length",
                material.name()
            )));
        }
        Ok(constants)
    }

    /// Laue 单调漫散射项 <b²>/<b>²
    pub fn laue_term(&self) -> f64 {
        self.btot_sqrd_avg / self.bcoh_avg_sqrd
    }
}

/// C *= N_van / N_sample
pub fn scale_by_atoms(ws: &mut Workspace, vanadium_atoms: f64, sample_atoms: f64) -> Result<()> {
    if !(sample_atoms > 0.0) {
        return Err(TotscatError::InvalidArgument(format!(
            "sample atom count must be positive (got {})",
            sample_atoms
        )));
    }
    scale(ws, vanadium_atoms / sample_atoms);
    Ok(())
}

/// C *= σ_V / 4π，返回所用的前置因子
pub fn scale_by_vanadium_xs(ws: &mut Workspace, vanadium_xs: f64) -> f64 {
    let prefactor = vanadium_xs / (4.0 * PI);
    scale(ws, prefactor);
    prefactor
}

/// 由 F(Q) 得到 S(Q)
pub fn sq_from_fq(fq: &Workspace, constants: &ScatteringConstants, out_name: &str) -> Workspace {
    let mut sq = fq.renamed(out_name);
    let inv = 1.0 / constants.bcoh_avg_sqrd;
    let offset = 1.0 - constants.laue_term();
    for bank in &mut sq.banks {
        match &mut bank.data {
            BankData::Histogram(h) => {
                h.y.iter_mut().for_each(|y| *y = *y * inv + offset);
                h.e.iter_mut().for_each(|e| *e *= inv);
            }
            BankData::Events(events) => {
                // 常数偏移没有事件语义，只缩放权重
                for ev in events.iter_mut() {
                    ev.weight *= inv;
                    ev.error_sq *= inv * inv;
                }
            }
        }
    }
    sq
}

/// 组装 F(Q) 与 S(Q)
///
/// 先检查样品材料，任何失败都不会产生新工作区。
pub fn assemble(
    corrected: &Workspace,
    fq_name: &str,
    sq_name: &str,
) -> Result<(Workspace, Workspace, ScatteringConstants)> {
    let material = corrected.sample_material()?;
    corrected.require_histogram("S(Q) assembly")?;
    let constants = ScatteringConstants::of(&material.material)?;

    let fq = corrected.renamed(fq_name);
    let sq = sq_from_fq(corrected, &constants, sq_name);
    Ok((fq, sq, constants))
}
