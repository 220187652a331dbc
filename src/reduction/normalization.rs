//! # 钒归一化
//!
//! 制备钒标定工作区（calibrant），每一步之后保存检查点:
//! 1. 转到波长，吸收/多重散射校正
//! 2. 转到 Q，保存 `_ms_abs_corrected`（以及 `_with_peaks`）
//! 3. 转到 d 间距剥峰（事件数据在此变为直方图）
//! 4. 转到 Q，保存 `_peaks_stripped`
//! 5. 转到 TOF，Butterworth 平滑（20, 2）
//! 6. 转到 Q，保存 `_smoothed`
//! 7. 可选的 Placzek 扣除，保存 `_placzek_corrected`
//! 8. 误差清零
//!
//! 然后样品和容器按 Q 分箱重分箱后除以标定工作区。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs` 调用
//! - 使用 `reduction/correction.rs`、`reduction/stripping.rs`、`reduction/smoothing.rs`
//! - 使用 `inelastic/driver.rs`

use crate::error::{Result, ResultExt, TotscatError};
use crate::inelastic::{subtract_placzek, PlaczekRequest};
use crate::models::{Binning, SampleGeometry, Unit};
use crate::reduction::arithmetic::divide;
use crate::reduction::checkpoint::Checkpointer;
use crate::reduction::correction::{apply_correction, CorrectionMethod};
use crate::reduction::rebin::rebin;
use crate::reduction::smoothing::{smooth_workspace, DEFAULT_CUTOFF, DEFAULT_ORDER};
use crate::reduction::store::{WorkspaceHandle, WorkspaceStore};
use crate::reduction::stripping::strip_vanadium_peaks;
use crate::reduction::units::{convert_units, set_distribution};

/// 标定工作区的制备参数
pub struct CalibrantSpec<'a> {
    /// 背景扣除后的钒工作区
    pub source: &'a str,
    /// 标定工作区名（"van_corrected"）
    pub name: &'a str,
    /// 起始检查点标题（"vanadium_minus_back"）
    pub title: &'a str,
    pub method: CorrectionMethod,
    pub geometry: &'a SampleGeometry,
    /// Placzek 扣除；其 `parent` 必须等于 `name`
    pub placzek: Option<PlaczekRequest<'a>>,
}

/// 制备钒标定工作区
pub fn prepare_calibrant(
    store: &mut WorkspaceStore,
    checkpointer: &mut Checkpointer,
    spec: &CalibrantSpec,
) -> Result<WorkspaceHandle> {
    let reporter = checkpointer.reporter;
    let mut title = spec.title.to_string();
    let name = spec.name;

    // 吸收 / 多重散射
    store.clone_as(spec.source, name)?;
    store.update(name, |ws| convert_units(ws, Unit::Wavelength))?;
    let corrected = apply_correction(
        store.get(name)?,
        spec.method,
        spec.geometry,
        name,
        &reporter,
    )
    .in_stage("vanadium absorption/multiple scattering")?;
    store.insert(corrected);
    store.update(name, |ws| convert_units(ws, Unit::MomentumTransfer))?;
    title.push_str("_ms_abs_corrected");
    checkpointer.save(store, name, &title)?;
    checkpointer.save(store, name, &format!("{}_with_peaks", title))?;

    // 剥峰
    store
        .update(name, |ws| {
            convert_units(ws, Unit::DSpacing)?;
            strip_vanadium_peaks(ws)?;
            convert_units(ws, Unit::MomentumTransfer)
        })
        .in_stage("vanadium peak stripping")?;
    title.push_str("_peaks_stripped");
    checkpointer.save(store, name, &title)?;

    // 平滑
    store
        .update(name, |ws| {
            convert_units(ws, Unit::TimeOfFlight)?;
            smooth_workspace(ws, DEFAULT_CUTOFF, DEFAULT_ORDER)?;
            convert_units(ws, Unit::MomentumTransfer)
        })
        .in_stage("vanadium smoothing")?;
    title.push_str("_smoothed");
    checkpointer.save(store, name, &title)?;

    if let Some(request) = &spec.placzek {
        if request.parent != name {
            return Err(TotscatError::InvalidArgument(format!(
                "Placzek parent '{}' is not the calibrant '{}'",
                request.parent, name
            )));
        }
        subtract_placzek(store, checkpointer, request).in_stage("vanadium Placzek correction")?;
        title.push_str("_placzek_corrected");
        checkpointer.save(store, name, &title)?;
    }

    store.update(name, |ws| {
        convert_units(ws, Unit::MomentumTransfer)?;
        ws.zero_errors();
        Ok(())
    })
}

/// 工作区按 Q 分箱重分箱后除以标定工作区，结果写回同名工作区
///
/// 标定工作区同样被重分箱，并转为与分子一致的分布状态。
pub fn normalize_by_calibrant(
    store: &mut WorkspaceStore,
    name: &str,
    calibrant: &str,
    binning: &Binning,
) -> Result<WorkspaceHandle> {
    let rebin_q = |ws: &mut crate::models::Workspace| {
        convert_units(ws, Unit::MomentumTransfer)?;
        rebin(ws, binning)
    };
    store.update(name, rebin_q)?;
    let distribution = store.get(name)?.distribution;
    store.update(calibrant, |ws| {
        rebin_q(ws)?;
        set_distribution(ws, distribution)
    })?;

    let normalized = divide(store.get(name)?, store.get(calibrant)?, name)?;
    Ok(store.insert(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::saver::MemorySaver;
    use crate::models::{Bank, BankGeometry, Histogram, Shape, Workspace};
    use crate::neutron::{Material, SampleMaterial};
    use crate::utils::output::Reporter;

    use std::path::PathBuf;

    fn van_geometry() -> SampleGeometry {
        SampleGeometry {
            shape: Shape::Cylinder,
            radius: Some(0.3),
            height: Some(4.0),
        }
    }

    fn vanadium_in_q() -> Workspace {
        let edges: Vec<f64> = (0..=300).map(|i| 1.0 + 0.1 * i as f64).collect();
        let y: Vec<f64> = edges
            .windows(2)
            .map(|w| 100.0 + 5.0 * (w[0] * 3.0).sin())
            .collect();
        let banks = [(2.0, 65.0), (2.0, 150.0)]
            .iter()
            .map(|&(l2, polar)| {
                Bank::histogram(
                    BankGeometry::new(l2, polar),
                    Histogram::from_counts(edges.clone(), y.clone()).unwrap(),
                )
            })
            .collect();
        let sample = SampleMaterial::new(
            Material::from_formula("V").unwrap(),
            6.11,
            1.0,
            Some(van_geometry()),
        );
        Workspace::new("vanadium", Unit::MomentumTransfer, banks).with_sample(sample)
    }

    #[test]
    fn test_calibrant_checkpoint_chain() {
        let mut store = WorkspaceStore::new();
        store.insert(vanadium_in_q());
        let mut saver = MemorySaver::new();
        let mut checkpointer = Checkpointer::new(
            &mut saver,
            "run.nxs",
            PathBuf::from("."),
            None,
            Binning::linear(1.0, 0.1, 31.0).unwrap(),
            Reporter::quiet(),
        );
        let geometry = van_geometry();
        let spec = CalibrantSpec {
            source: "vanadium",
            name: "van_corrected",
            title: "vanadium_minus_back",
            method: CorrectionMethod::Carpenter,
            geometry: &geometry,
            placzek: None,
        };
        prepare_calibrant(&mut store, &mut checkpointer, &spec).unwrap();

        let titles: Vec<&str> = store.checkpoints().iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "vanadium_minus_back_ms_abs_corrected",
                "vanadium_minus_back_ms_abs_corrected_with_peaks",
                "vanadium_minus_back_ms_abs_corrected_peaks_stripped",
                "vanadium_minus_back_ms_abs_corrected_peaks_stripped_smoothed",
            ]
        );
        let calibrant = store.get("van_corrected").unwrap();
        assert_eq!(calibrant.unit, Unit::MomentumTransfer);
        assert!(calibrant.banks.iter().all(|b| b
            .as_histogram()
            .unwrap()
            .e
            .iter()
            .all(|e| *e == 0.0)));
        // 源工作区不受影响
        let source = store.get("vanadium").unwrap();
        assert_eq!(source.unit, Unit::MomentumTransfer);
        assert_eq!(store.handle("vanadium").unwrap().version, 1);
    }

    #[test]
    fn test_normalize_by_calibrant() {
        let mut store = WorkspaceStore::new();
        let mut van = vanadium_in_q().renamed("van_corrected");
        van.zero_errors();
        store.insert(van);
        store.insert(vanadium_in_q().renamed("sample"));

        let binning = Binning::linear(2.0, 0.5, 20.0).unwrap();
        normalize_by_calibrant(&mut store, "sample", "van_corrected", &binning).unwrap();
        let h = store.get("sample").unwrap().banks[0].as_histogram().unwrap().clone();
        assert_eq!(h.edges, binning.edges());
        assert!(h.y.iter().all(|y| (y - 1.0).abs() < 1e-9));
    }
}
