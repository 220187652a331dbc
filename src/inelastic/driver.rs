//! # Placzek 校正驱动
//!
//! 对母工作区（钒或样品）执行完整的非弹性校正:
//! 1. 拟合入射谱（需要样品材料，否则 MissingMaterial）
//! 2. 在计算分箱上求 Placzek 自散射，得到 `<prefix>_placzek`
//! 3. 两者转到 Q 并按 Q 分箱重分箱，保存 `<title>_placzek`
//! 4. 两者转到波长并按计算分箱重分箱
//! 5. 两者转为分布后相减（必须在波长、分布状态下进行）
//! 6. 两者转回 Q，母工作区恢复原来的分布状态
//!
//! ## 依赖关系
//! - 被 `reduction/normalization.rs` 和 `reduction/pipeline.rs` 调用
//! - 使用 `inelastic/spectrum.rs`、`inelastic/placzek.rs`、`reduction/`

use crate::error::{Result, TotscatError};
use crate::inelastic::placzek::placzek_self_scattering;
use crate::inelastic::{fit_incident_spectrum, InelasticSpec, MonitorSpectrum};
use crate::models::{BankGeometry, Unit};
use crate::neutron::SampleMaterial;
use crate::reduction::arithmetic::minus;
use crate::reduction::checkpoint::Checkpointer;
use crate::reduction::rebin::rebin;
use crate::reduction::store::{WorkspaceHandle, WorkspaceStore};
use crate::reduction::units::{convert_units, set_distribution};

/// 一次 Placzek 校正的输入
pub struct PlaczekRequest<'a> {
    /// 工作区名前缀（"van" / "sam"）
    pub prefix: &'a str,
    /// 检查点标题前缀（"vanadium" / "sample"）
    pub title_prefix: &'a str,
    /// 母工作区名，校正结果写回同名工作区
    pub parent: &'a str,
    pub spec: &'a InelasticSpec,
    /// 第一个 run 的监视器谱
    pub monitor: &'a MonitorSpectrum,
    pub material: Option<&'a SampleMaterial>,
    /// 仪器几何表（L2/Polar），缺省时使用母工作区自身的 bank 几何
    pub geometry: Option<&'a [BankGeometry]>,
    pub l1: f64,
}

/// 从母工作区中扣除 Placzek 自散射
pub fn subtract_placzek(
    store: &mut WorkspaceStore,
    checkpointer: &mut Checkpointer,
    request: &PlaczekRequest,
) -> Result<WorkspaceHandle> {
    let spec = request.spec;
    let reporter = checkpointer.reporter;
    if !spec.self_scattering {
        reporter.warning("Placzek self term disabled, nothing subtracted");
        return store.handle(request.parent);
    }
    if spec.interference {
        reporter.warning("Placzek interference term is not computed");
    }

    let incident = format!("{}_incident_wksp", request.prefix);
    let material = request
        .material
        .filter(|m| !m.material.name().trim().is_empty())
        .ok_or(TotscatError::MissingMaterial {
            workspace: incident.clone(),
        })?;

    reporter.info(&format!(
        "Fitting incident spectrum for {} with {:?}",
        request.parent, spec.fit_with
    ));
    let spectrum = fit_incident_spectrum(
        request.monitor,
        spec.fit_with,
        &spec.lambda_binning_fit,
        &spec.lambda_binning_calc,
    )?;

    let parent = store.get(request.parent)?;
    let restore_distribution = parent.distribution;
    let geometry: Vec<BankGeometry> = match request.geometry {
        Some(table) => table.to_vec(),
        None => parent.banks.iter().map(|b| b.geometry).collect(),
    };
    let placzek_name = format!("{}_placzek", request.prefix);
    let placzek = placzek_self_scattering(
        &spectrum,
        parent,
        material,
        &geometry,
        request.l1,
        &placzek_name,
    )?;
    store.insert(placzek);

    let names = [placzek_name.as_str(), request.parent];
    let q_binning = checkpointer.binning.clone();
    for name in names {
        store.update(name, |ws| {
            convert_units(ws, Unit::MomentumTransfer)?;
            rebin(ws, &q_binning)
        })?;
    }
    checkpointer.save(
        store,
        &placzek_name,
        &format!("{}_placzek", request.title_prefix),
    )?;

    // 相减必须在波长、分布状态下进行
    for name in names {
        store.update(name, |ws| {
            convert_units(ws, Unit::Wavelength)?;
            rebin(ws, &spec.lambda_binning_calc)?;
            set_distribution(ws, true)
        })?;
    }
    let corrected = minus(
        store.get(request.parent)?,
        store.get(&placzek_name)?,
        request.parent,
    )?;
    store.insert(corrected);

    store.update(&placzek_name, |ws| convert_units(ws, Unit::MomentumTransfer))?;
    store.update(request.parent, |ws| {
        convert_units(ws, Unit::MomentumTransfer)?;
        set_distribution(ws, restore_distribution)
    })
}
