//! # 约化流水线
//!
//! 从原始 bank 数据到 S(Q)/F(Q) 的完整顺序流程。每个阶段读写同一个
//! `WorkspaceStore`，同名工作区被原地覆盖；每个阶段边界保存一个检查点。
//!
//! ## 阶段
//! 1. 加载样品、容器、（容器本底）、钒、（钒本底），各存一个检查点
//! 2. 读取仪器特征文件，报告各 bank 的 Q 范围
//! 3. 扣除本底
//! 4. 制备钒标定工作区
//! 5. 样品与容器除以标定工作区
//! 6. 样品吸收/多重散射、原子数缩放、截面缩放、Placzek
//! 7. 组装 F(Q)/S(Q)
//! 8. 导出 GSAS 布拉格衍射文件
//!
//! 任一阶段失败即中止整个约化，错误带有阶段名；已写出的检查点保留在磁盘上。
//!
//! ## 依赖关系
//! - 被 `commands/reduce.rs` 和 `batch/runner.rs` 调用
//! - 使用 `reduction/` 各阶段、`inelastic/driver.rs` 和 `io/` 协作者

use crate::config::{ReductionConfig, RunSet};
use crate::error::{Result, ResultExt, TotscatError};
use crate::inelastic::{subtract_placzek, MonitorSpectrum, PlaczekRequest};
use crate::io::characterizations::read_characterizations;
use crate::io::gsas::write_gsas;
use crate::io::loader::{LoadRequest, Loader};
use crate::io::saver::Saver;
use crate::models::{BankGeometry, Binning, Unit, DEFAULT_L1};
use crate::neutron::SampleMaterial;
use crate::reduction::arithmetic::minus;
use crate::reduction::checkpoint::Checkpointer;
use crate::reduction::correction::apply_correction;
use crate::reduction::normalization::{normalize_by_calibrant, prepare_calibrant, CalibrantSpec};
use crate::reduction::rebin::{crop_to_data, histogram_events, rebin, AUTO_HISTOGRAM_BINS};
use crate::reduction::store::{Checkpoint, WorkspaceHandle, WorkspaceStore};
use crate::reduction::structure_factor::{
    assemble, scale_by_atoms, scale_by_vanadium_xs, ScatteringConstants,
};
use crate::reduction::units::convert_units;
use crate::utils::output::Reporter;

use std::path::PathBuf;

const SAMPLE: &str = "sample";
const CONTAINER: &str = "container";
const CONTAINER_BG: &str = "container_background";
const VANADIUM: &str = "vanadium";
const VANADIUM_BG: &str = "vanadium_background";
const SAM_RAW: &str = "sam_raw";
const CONTAINER_RAW: &str = "container_raw";
const VAN_CORRECTED: &str = "van_corrected";
const SAM_CORRECTED: &str = "sam_corrected";
const FQ_BANKS: &str = "FQ_banks_ws";
const SQ_BANKS: &str = "SQ_banks_ws";

/// GSAS 导出的对数分箱步长
const BRAGG_LOG_STEP: f64 = -0.01;

/// 一次约化的结果摘要
#[derive(Debug, Clone)]
pub struct ReductionSummary {
    pub title: String,
    pub output_dir: PathBuf,
    pub checkpoints: Vec<Checkpoint>,
    pub sample_atoms: f64,
    pub vanadium_atoms: f64,
    pub constants: ScatteringConstants,
    pub sample_xs: f64,
    pub vanadium_xs: f64,
    /// σ_V / 4π
    pub prefactor: f64,
    /// (bank, Q_min, Q_max)
    pub q_ranges: Vec<(usize, f64, f64)>,
    pub gsas_file: Option<PathBuf>,
}

/// 运行完整约化
pub fn run_reduction(
    config: &ReductionConfig,
    loader: &dyn Loader,
    saver: &mut dyn Saver,
    reporter: Reporter,
) -> Result<ReductionSummary> {
    let checkpointer = Checkpointer::new(
        saver,
        &config.nexus_filename(),
        config.output_dir.clone(),
        config.merging.grouping_output.clone(),
        config.merging.q_binning.clone(),
        reporter,
    );
    let mut reduction = Reduction {
        config,
        loader,
        store: WorkspaceStore::new(),
        checkpointer,
        reporter,
        sample_material: config.sample.sample_material(),
        vanadium_material: config.vanadium.sample_material(),
        geometry_table: config.align_and_focus.geometry_table()?,
    };
    reduction.run()
}

/// 流水线状态
struct Reduction<'c, 's> {
    config: &'c ReductionConfig,
    loader: &'c dyn Loader,
    store: WorkspaceStore,
    checkpointer: Checkpointer<'s>,
    reporter: Reporter,
    sample_material: Option<SampleMaterial>,
    vanadium_material: Option<SampleMaterial>,
    geometry_table: Option<Vec<BankGeometry>>,
}

impl Reduction<'_, '_> {
    fn run(&mut self) -> Result<ReductionSummary> {
        let title = self.config.title.clone();
        self.reset_outputs().in_stage("reset outputs")?;

        self.load_all().in_stage("load")?;
        let q_ranges = self.characterizations().in_stage("characterizations")?;

        self.subtract_backgrounds()
            .in_stage("background subtraction")?;
        self.prepare_vanadium().in_stage("vanadium calibrant")?;
        self.normalize().in_stage("vanadium normalization")?;

        let mut sample_title = "sample_minus_back_normalized".to_string();
        self.correct_sample(&mut sample_title)
            .in_stage("sample absorption/multiple scattering")?;
        let (sample_atoms, vanadium_atoms) = self
            .scale_sample_by_atoms(&mut sample_title)
            .in_stage("atom scaling")?;
        let (vanadium_xs, prefactor) = self
            .scale_by_cross_section(&mut sample_title)
            .in_stage("cross-section scaling")?;
        self.sample_placzek(&mut sample_title)
            .in_stage("sample Placzek correction")?;

        let constants = self.structure_factors().in_stage("structure factor")?;
        let sample_xs = self
            .sample_material
            .as_ref()
            .map(|m| m.material.total_scatter_xsection())
            .unwrap_or(0.0);
        self.reporter.info(&format!("<b>^2: {}", constants.bcoh_avg_sqrd));
        self.reporter.info(&format!("<b^2>: {}", constants.btot_sqrd_avg));
        self.reporter.info(&format!("Laue term: {}", constants.laue_term()));
        self.reporter
            .info(&format!("sample total xsection: {}", sample_xs));
        self.reporter
            .info(&format!("vanadium total xsection: {}", vanadium_xs));

        let gsas_file = self.bragg_export().in_stage("Bragg export")?;

        Ok(ReductionSummary {
            title,
            output_dir: self.config.output_dir.clone(),
            checkpoints: self.store.checkpoints().to_vec(),
            sample_atoms,
            vanadium_atoms,
            constants,
            sample_xs,
            vanadium_xs,
            prefactor,
            q_ranges,
            gsas_file,
        })
    }

    fn initial_iofq_file(&self) -> String {
        format!("{}_initial_iofq_banks.nxs", self.config.title)
    }

    fn fofq_file(&self) -> String {
        format!("{}_fofq_banks_corrected.nxs", self.config.title)
    }

    fn sofq_file(&self) -> String {
        format!("{}_sofq_banks_corrected.nxs", self.config.title)
    }

    /// 删除上次运行残留的输出文件
    fn reset_outputs(&mut self) -> Result<()> {
        self.checkpointer.reset()?;
        for file in [self.initial_iofq_file(), self.fofq_file(), self.sofq_file()] {
            self.checkpointer.reset_file(&file)?;
        }
        Ok(())
    }

    fn save(&mut self, name: &str, title: &str) -> Result<WorkspaceHandle> {
        self.checkpointer.save(&mut self.store, name, title)
    }

    fn save_to(&mut self, name: &str, title: &str, filename: &str) -> Result<WorkspaceHandle> {
        self.checkpointer
            .save_to(&mut self.store, name, title, filename)
    }

    fn to_unit(&mut self, name: &str, unit: Unit) -> Result<WorkspaceHandle> {
        self.store.update(name, |ws| convert_units(ws, unit))
    }

    /// out(lhs) = lhs - rhs
    fn subtract(&mut self, lhs: &str, rhs: &str) -> Result<WorkspaceHandle> {
        let out = minus(self.store.get(lhs)?, self.store.get(rhs)?, lhs)?;
        Ok(self.store.insert(out))
    }

    // ─────────────────────────────────────────────────────────
    // 1. 加载
    // ─────────────────────────────────────────────────────────

    fn load(
        &mut self,
        name: &str,
        title: &str,
        runs: &RunSet,
        sample: Option<&SampleMaterial>,
    ) -> Result<()> {
        self.reporter.stage(&format!("Load {} ({})", title, runs.label()));
        let request = LoadRequest {
            scans: &runs.scans,
            sample,
            options: &self.config.align_and_focus,
        };
        let ws = self.loader.load(name, &request)?;
        self.reporter
            .info(&format!("{} banks in '{}'", ws.number_of_banks(), name));
        self.store.insert(ws);
        self.to_unit(name, Unit::MomentumTransfer)?;
        self.save(name, title)?;
        Ok(())
    }

    fn load_all(&mut self) -> Result<()> {
        let config = self.config;
        let sample = self.sample_material.clone();
        let vanadium = self.vanadium_material.clone();

        self.load(SAMPLE, "sample_and_container", &config.sample.runs, sample.as_ref())
            .in_stage("load sample")?;

        let container = config
            .sample
            .background
            .as_ref()
            .ok_or_else(|| TotscatError::config("Sample.Background", "missing required key"))?;
        self.load(CONTAINER, "container", &container.runs, None)
            .in_stage("load container")?;
        if let Some(runs) = &container.background {
            self.load(CONTAINER_BG, "container_background", runs, None)
                .in_stage("load container background")?;
        }

        self.load(
            VANADIUM,
            "vanadium_and_background",
            &config.vanadium.runs,
            vanadium.as_ref(),
        )
        .in_stage("load vanadium")?;
        if let Some(background) = &config.vanadium.background {
            self.load(VANADIUM_BG, "vanadium_background", &background.runs, None)
                .in_stage("load vanadium background")?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // 2. 仪器特征
    // ─────────────────────────────────────────────────────────

    fn characterizations(&mut self) -> Result<Vec<(usize, f64, f64)>> {
        let Some(path) = &self.config.merging.characterizations else {
            return Ok(Vec::new());
        };
        let ranges = read_characterizations(path)?;
        Ok(ranges
            .iter()
            .map(|range| {
                let (qmin, qmax) = range.q_range();
                self.reporter
                    .info(&format!("Qrange bank {}: {:.4} {:.4}", range.bank, qmin, qmax));
                (range.bank, qmin, qmax)
            })
            .collect())
    }

    // ─────────────────────────────────────────────────────────
    // 3. 本底扣除
    // ─────────────────────────────────────────────────────────

    fn subtract_backgrounds(&mut self) -> Result<()> {
        self.reporter.stage("Subtract backgrounds");
        self.store.clone_as(SAMPLE, SAM_RAW)?;
        self.store.clone_as(CONTAINER, CONTAINER_RAW)?;

        if self.store.contains(VANADIUM_BG) {
            self.subtract(VANADIUM, VANADIUM_BG)?;
        }
        self.subtract(SAMPLE, CONTAINER)?;
        if self.store.contains(CONTAINER_BG) {
            self.subtract(CONTAINER, CONTAINER_BG)?;
        }

        for name in [CONTAINER, VANADIUM, SAMPLE] {
            self.to_unit(name, Unit::MomentumTransfer)?;
        }
        self.save(CONTAINER, "container_minus_back")?;
        self.save(VANADIUM, "vanadium_minus_back")?;
        self.save(SAMPLE, "sample_minus_back")?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // 4. 钒标定
    // ─────────────────────────────────────────────────────────

    /// 第一个 run 的监视器谱
    fn monitor(&self, runs: &RunSet) -> Result<MonitorSpectrum> {
        let scan = runs.first_scan().ok_or_else(|| {
            TotscatError::InvalidArgument("no scan for incident spectrum".to_string())
        })?;
        self.reporter
            .info(&format!("Incident spectrum from monitor of {}", scan));
        self.loader
            .load_monitor(scan, &self.config.align_and_focus)
            .in_stage("incident spectrum")
    }

    fn prepare_vanadium(&mut self) -> Result<()> {
        self.reporter.stage("Prepare vanadium calibrant");
        let config = self.config;
        let van = &config.vanadium;
        let monitor = if van.inelastic.is_placzek() {
            Some(self.monitor(&van.runs)?)
        } else {
            None
        };
        let placzek = monitor.as_ref().map(|monitor| PlaczekRequest {
            prefix: "van",
            title_prefix: "vanadium",
            parent: VAN_CORRECTED,
            spec: &van.inelastic,
            monitor,
            material: self.vanadium_material.as_ref(),
            geometry: self.geometry_table.as_deref(),
            l1: DEFAULT_L1,
        });
        let spec = CalibrantSpec {
            source: VANADIUM,
            name: VAN_CORRECTED,
            title: "vanadium_minus_back",
            method: van.correction.method(),
            geometry: &van.geometry,
            placzek,
        };
        prepare_calibrant(&mut self.store, &mut self.checkpointer, &spec)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // 5. 归一化
    // ─────────────────────────────────────────────────────────

    fn normalize(&mut self) -> Result<()> {
        self.reporter.stage("Normalize by vanadium");
        let binning: Binning = self.config.merging.q_binning.clone();

        normalize_by_calibrant(&mut self.store, SAMPLE, VAN_CORRECTED, &binning)?;
        normalize_by_calibrant(&mut self.store, SAM_RAW, VAN_CORRECTED, &binning)?;
        self.save(SAMPLE, "sample_minus_back_normalized")?;
        self.save(SAM_RAW, "sample_normalized")?;
        let initial = self.initial_iofq_file();
        self.save_to(SAMPLE, "IQ_banks", &initial)?;

        normalize_by_calibrant(&mut self.store, CONTAINER, VAN_CORRECTED, &binning)?;
        normalize_by_calibrant(&mut self.store, CONTAINER_RAW, VAN_CORRECTED, &binning)?;
        self.save(CONTAINER, "container_minus_back_normalized")?;
        self.save(CONTAINER_RAW, "container_normalized")?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // 6. 样品校正与缩放
    // ─────────────────────────────────────────────────────────

    fn correct_sample(&mut self, title: &mut String) -> Result<()> {
        self.reporter.stage("Sample absorption / multiple scattering");
        let config = self.config;
        let sample = &config.sample;
        self.to_unit(SAMPLE, Unit::Wavelength)?;
        let corrected = apply_correction(
            self.store.get(SAMPLE)?,
            sample.correction.method(),
            &sample.geometry,
            SAM_CORRECTED,
            &self.reporter,
        )?;
        self.store.insert(corrected);
        self.to_unit(SAM_CORRECTED, Unit::MomentumTransfer)?;
        title.push_str("_ms_abs_corrected");
        self.save(SAM_CORRECTED, title)?;
        Ok(())
    }

    fn scale_sample_by_atoms(&mut self, title: &mut String) -> Result<(f64, f64)> {
        let sample_atoms = self
            .sample_material
            .as_ref()
            .ok_or_else(|| TotscatError::MissingMaterial {
                workspace: SAMPLE.to_string(),
            })?
            .number_atoms()?;
        let vanadium_atoms = self
            .vanadium_material
            .as_ref()
            .ok_or_else(|| TotscatError::MissingMaterial {
                workspace: VANADIUM.to_string(),
            })?
            .number_atoms()?;

        self.reporter.info(&format!("Sample natoms: {:.6e}", sample_atoms));
        self.reporter
            .info(&format!("Vanadium natoms: {:.6e}", vanadium_atoms));
        self.reporter.info(&format!(
            "Vanadium natoms / Sample natoms: {:.6}",
            vanadium_atoms / sample_atoms
        ));

        self.store.update(SAM_CORRECTED, |ws| {
            scale_by_atoms(ws, vanadium_atoms, sample_atoms)?;
            convert_units(ws, Unit::MomentumTransfer)
        })?;
        title.push_str("_norm_by_atoms");
        self.save(SAM_CORRECTED, title)?;
        Ok((sample_atoms, vanadium_atoms))
    }

    fn scale_by_cross_section(&mut self, title: &mut String) -> Result<(f64, f64)> {
        let sigma_v = self
            .store
            .get(VAN_CORRECTED)?
            .sample_material()?
            .material
            .total_scatter_xsection();
        let mut prefactor = 0.0;
        self.store.update(SAM_CORRECTED, |ws| {
            prefactor = scale_by_vanadium_xs(ws, sigma_v);
            Ok(())
        })?;
        self.reporter.info(&format!(
            "Total scattering cross-section of Vanadium: {} sigma_v / 4*pi: {}",
            sigma_v, prefactor
        ));
        title.push_str("_multiply_by_vanSelfScat");
        self.save(SAM_CORRECTED, title)?;
        Ok((sigma_v, prefactor))
    }

    fn sample_placzek(&mut self, title: &mut String) -> Result<()> {
        let config = self.config;
        let sample = &config.sample;
        if !sample.inelastic.is_placzek() {
            return Ok(());
        }
        self.reporter.stage("Sample Placzek correction");
        if self.sample_material.is_none() {
            return Err(TotscatError::MissingMaterial {
                workspace: "sam_incident_wksp".to_string(),
            });
        }

        let monitor = self.monitor(&sample.runs)?;
        self.to_unit(SAM_CORRECTED, Unit::Wavelength)?;
        let request = PlaczekRequest {
            prefix: "sam",
            title_prefix: "sample",
            parent: SAM_CORRECTED,
            spec: &sample.inelastic,
            monitor: &monitor,
            material: self.sample_material.as_ref(),
            geometry: self.geometry_table.as_deref(),
            l1: DEFAULT_L1,
        };
        subtract_placzek(&mut self.store, &mut self.checkpointer, &request)?;
        title.push_str("_placzek_corrected");
        self.save(SAM_CORRECTED, title)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // 7. F(Q) / S(Q)
    // ─────────────────────────────────────────────────────────

    fn structure_factors(&mut self) -> Result<ScatteringConstants> {
        self.reporter.stage("Assemble F(Q) and S(Q)");
        self.store.get(SAM_CORRECTED)?.sample_material()?;
        self.to_unit(SAM_CORRECTED, Unit::MomentumTransfer)?;
        let (fq, sq, constants) = assemble(self.store.get(SAM_CORRECTED)?, FQ_BANKS, SQ_BANKS)?;
        self.store.insert(fq);
        self.store.insert(sq);

        self.save(FQ_BANKS, "FQ_banks")?;
        self.save(SQ_BANKS, "SQ_banks")?;
        let (fofq, sofq) = (self.fofq_file(), self.sofq_file());
        self.save_to(FQ_BANKS, "FQ_banks", &fofq)?;
        self.save_to(SQ_BANKS, "SQ_banks", &sofq)?;
        Ok(constants)
    }

    // ─────────────────────────────────────────────────────────
    // 8. 布拉格衍射导出
    // ─────────────────────────────────────────────────────────

    fn bragg_export(&mut self) -> Result<Option<PathBuf>> {
        self.reporter.stage("Export Bragg diffraction");
        let mut ranges = Vec::new();
        self.store.update(SAM_CORRECTED, |ws| {
            convert_units(ws, Unit::TimeOfFlight)?;
            histogram_events(ws, AUTO_HISTOGRAM_BINS)?;
            ranges = crop_to_data(ws)?;
            Ok(())
        })?;

        let (xmin, xmax) = ranges
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
                (lo.min(*a), hi.max(*b))
            });
        if !(xmin.is_finite() && xmax > xmin && xmin > 0.0) {
            self.reporter
                .warning("No finite TOF data in the sample, GSAS file not written");
            return Ok(None);
        }

        let binning = Binning::new(vec![xmin, BRAGG_LOG_STEP, xmax])?;
        self.store.update(SAM_CORRECTED, |ws| {
            rebin(ws, &binning)?;
            crop_to_data(ws)?;
            Ok(())
        })?;

        let path = self.config.gsas_path();
        write_gsas(self.store.get(SAM_CORRECTED)?, &path, &self.config.title)?;
        self.reporter
            .checkpoint("GSAS", &path.display().to_string());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlignAndFocusArgs;
    use crate::io::saver::{MemorySaver, SaveRequest};
    use crate::models::{Bank, Histogram, Workspace};

    use std::collections::HashMap;

    /// 内存加载器：每个扫描名对应一个 TOF 直方图强度
    struct MemoryLoader {
        level: HashMap<String, f64>,
    }

    impl MemoryLoader {
        fn new(levels: &[(&str, f64)]) -> Self {
            Self {
                level: levels
                    .iter()
                    .map(|(scan, level)| (scan.to_string(), *level))
                    .collect(),
            }
        }
    }

    impl Loader for MemoryLoader {
        fn load(&self, name: &str, request: &LoadRequest) -> Result<Workspace> {
            let edges: Vec<f64> = (0..=400).map(|i| 1500.0 + 30.0 * i as f64).collect();
            let total: f64 = request
                .scans
                .iter()
                .map(|scan| self.level.get(scan).copied().unwrap_or(0.0))
                .sum();
            let banks = [(2.0, 65.0), (2.0, 150.0)]
                .iter()
                .map(|&(l2, polar)| {
                    let y: Vec<f64> = edges
                        .windows(2)
                        .map(|w| total * (1.0 + 0.001 * (w[0] / 500.0).sin()))
                        .collect();
                    Bank::histogram(
                        BankGeometry::new(l2, polar),
                        Histogram::from_counts(edges.clone(), y).unwrap(),
                    )
                })
                .collect();
            let mut ws = Workspace::new(name, Unit::TimeOfFlight, banks)
                .with_l1(request.options.primary_flight_path);
            if let Some(sample) = request.sample {
                ws = ws.with_sample(sample.clone());
            }
            Ok(ws)
        }

        fn load_monitor(&self, _scan: &str, _options: &AlignAndFocusArgs) -> Result<MonitorSpectrum> {
            let wavelength: Vec<f64> = (0..700).map(|i| 0.1 + 0.005 * i as f64).collect();
            let counts = wavelength.iter().map(|l| 1000.0 * (-l).exp()).collect();
            Ok(MonitorSpectrum { wavelength, counts })
        }
    }

    fn config(extra: serde_json::Value) -> ReductionConfig {
        let mut json = serde_json::json!({
            "Title": "silicon",
            "Instrument": "NOM",
            "Facility": "SNS",
            "Sample": {
                "Runs": "1",
                "MassDensity": 2.33,
                "PackingFraction": 0.6,
                "Material": "Si",
                "Geometry": {"Radius": 0.3, "Height": 1.8},
                "Background": {"Runs": "2", "Background": {"Runs": "3"}},
                "AbsorptionCorrection": {"Type": "Carpenter"},
                "InelasticCorrection": {"Type": "Placzek"}
            },
            "Vanadium": {
                "Runs": "4",
                "MassDensity": 6.11,
                "Geometry": {"Radius": 0.3, "Height": 1.8},
                "Background": {"Runs": "5"},
                "AbsorptionCorrection": {"Type": "Carpenter"},
                "InelasticCorrection": {"Type": "Placzek"}
            },
            "Calibration": {"Filename": "NOM_cal.h5"},
            "Merging": {"QBinning": "1.0,0.05,20.0"},
            "OutputDir": std::env::temp_dir().join("totscat_pipeline_unused").display().to_string()
        });
        if let (Some(base), Some(extra)) = (json.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        ReductionConfig::from_json_str(&json.to_string()).unwrap()
    }

    fn loader() -> MemoryLoader {
        MemoryLoader::new(&[
            ("NOM_1", 120.0),
            ("NOM_2", 30.0),
            ("NOM_3", 5.0),
            ("NOM_4", 200.0),
            ("NOM_5", 10.0),
        ])
    }

    fn out_dir(dir: &str) -> PathBuf {
        std::env::temp_dir().join(format!("totscat_pipeline_{}_{}", dir, std::process::id()))
    }

    fn run_in(dir: &str, cfg: ReductionConfig) -> (Result<ReductionSummary>, MemorySaver) {
        let cfg = cfg.with_output_dir(out_dir(dir));
        let mut saver = MemorySaver::new();
        let result = run_reduction(&cfg, &loader(), &mut saver, Reporter::quiet());
        (result, saver)
    }

    /// 保存指定标题时报写盘错误
    struct FailingSaver {
        inner: MemorySaver,
        fail_on: &'static str,
    }

    impl Saver for FailingSaver {
        fn save(&mut self, ws: &Workspace, request: &SaveRequest) -> Result<()> {
            if request.title == self.fail_on {
                return Err(TotscatError::FileWriteError {
                    path: request.filename.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.save(ws, request)
        }
    }

    #[test]
    fn test_checkpoint_order() {
        let (result, saver) = run_in("order", config(serde_json::json!({})));
        let summary = result.unwrap();

        let titles = saver.titles("silicon.nxs");
        let expected = [
            "sample_and_container",
            "container",
            "container_background",
            "vanadium_and_background",
            "vanadium_background",
            "container_minus_back",
            "vanadium_minus_back",
            "sample_minus_back",
            "vanadium_minus_back_ms_abs_corrected",
            "vanadium_minus_back_ms_abs_corrected_with_peaks",
            "vanadium_minus_back_ms_abs_corrected_peaks_stripped",
            "vanadium_minus_back_ms_abs_corrected_peaks_stripped_smoothed",
            "vanadium_placzek",
            "vanadium_minus_back_ms_abs_corrected_peaks_stripped_smoothed_placzek_corrected",
            "sample_minus_back_normalized",
            "sample_normalized",
            "container_minus_back_normalized",
            "container_normalized",
            "sample_minus_back_normalized_ms_abs_corrected",
            "sample_minus_back_normalized_ms_abs_corrected_norm_by_atoms",
            "sample_minus_back_normalized_ms_abs_corrected_norm_by_atoms_multiply_by_vanSelfScat",
            "sample_placzek",
            "sample_minus_back_normalized_ms_abs_corrected_norm_by_atoms_multiply_by_vanSelfScat_placzek_corrected",
            "FQ_banks",
            "SQ_banks",
        ];
        assert_eq!(titles, expected);
        assert_eq!(saver.titles("silicon_initial_iofq_banks.nxs"), ["IQ_banks"]);
        assert_eq!(saver.titles("silicon_fofq_banks_corrected.nxs"), ["FQ_banks"]);
        assert_eq!(saver.titles("silicon_sofq_banks_corrected.nxs"), ["SQ_banks"]);

        // 检查点日志与保存顺序一致
        assert_eq!(summary.checkpoints.len(), expected.len() + 3);
        assert!(summary.sample_atoms > 0.0 && summary.vanadium_atoms > 0.0);
        assert!(summary.constants.laue_term() > 0.0);

        let gsas = summary.gsas_file.unwrap();
        assert!(gsas.exists());
        std::fs::remove_dir_all(gsas.parent().unwrap()).ok();
    }

    #[test]
    fn test_optional_branches_skipped() {
        let mut cfg = config(serde_json::json!({}));
        cfg.sample.background.as_mut().unwrap().background = None;
        cfg.vanadium.background = None;
        cfg.sample.inelastic = Default::default();
        cfg.vanadium.inelastic = Default::default();
        cfg.vanadium.correction = Default::default();

        let (result, saver) = run_in("optional", cfg);
        // 未给出 Merging.Characterizations 时不报告 Q 范围
        assert!(result.unwrap().q_ranges.is_empty());
        let titles = saver.titles("silicon.nxs");
        assert!(!titles.contains(&"container_background"));
        assert!(!titles.contains(&"vanadium_background"));
        assert!(!titles.iter().any(|t| t.contains("placzek")));

        // 未配置校正时仍保存 _ms_abs_corrected（克隆）
        assert!(titles.contains(&"vanadium_minus_back_ms_abs_corrected"));
        let final_sq = saver.section("SQ_banks").unwrap();
        assert_eq!(final_sq.workspace.unit, Unit::MomentumTransfer);
    }

    #[test]
    fn test_missing_radius_aborts_with_stage() {
        let mut cfg = config(serde_json::json!({}));
        cfg.vanadium.geometry.radius = None;
        let (result, saver) = run_in("radius", cfg);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "MissingGeometryError");
        assert_eq!(err.stage(), Some("vanadium absorption/multiple scattering"));
        // 失败前的检查点保留
        assert!(saver.titles("silicon.nxs").contains(&"vanadium_minus_back"));
    }

    #[test]
    fn test_missing_sample_material_in_placzek() {
        let mut cfg = config(serde_json::json!({}));
        cfg.sample.material = None;
        cfg.sample.correction = Default::default();
        let (result, _) = run_in("material", cfg);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "MissingMaterialError");
    }

    #[test]
    fn test_save_failures_carry_stage() {
        let cases = [
            ("container", "load container"),
            ("vanadium_minus_back", "background subtraction"),
            (
                "vanadium_minus_back_ms_abs_corrected_peaks_stripped",
                "vanadium calibrant",
            ),
            ("sample_normalized", "vanadium normalization"),
            (
                "sample_minus_back_normalized_ms_abs_corrected",
                "sample absorption/multiple scattering",
            ),
            (
                "sample_minus_back_normalized_ms_abs_corrected_norm_by_atoms_multiply_by_vanSelfScat_placzek_corrected",
                "sample Placzek correction",
            ),
            ("SQ_banks", "structure factor"),
        ];
        let cfg = config(serde_json::json!({})).with_output_dir(out_dir("failing"));
        for (title, stage) in cases {
            let mut saver = FailingSaver {
                inner: MemorySaver::new(),
                fail_on: title,
            };
            let err = run_reduction(&cfg, &loader(), &mut saver, Reporter::quiet()).unwrap_err();
            assert_eq!(err.kind(), "IoError", "{}", title);
            assert_eq!(err.stage(), Some(stage), "{}", title);
            assert!(saver.inner.section(title).is_none());
        }
        std::fs::remove_dir_all(out_dir("failing")).ok();
    }

    #[test]
    fn test_material_checks_precede_store_changes() {
        let mut cfg = config(serde_json::json!({}));
        cfg.sample.material = None;
        let cfg = cfg.with_output_dir(out_dir("precondition"));
        let loader = loader();
        let mut saver = MemorySaver::new();
        let checkpointer = Checkpointer::new(
            &mut saver,
            &cfg.nexus_filename(),
            cfg.output_dir.clone(),
            None,
            cfg.merging.q_binning.clone(),
            Reporter::quiet(),
        );
        let mut reduction = Reduction {
            config: &cfg,
            loader: &loader,
            store: WorkspaceStore::new(),
            checkpointer,
            reporter: Reporter::quiet(),
            sample_material: None,
            vanadium_material: cfg.vanadium.sample_material(),
            geometry_table: None,
        };
        let request = LoadRequest {
            scans: &cfg.sample.runs.scans,
            sample: None,
            options: &cfg.align_and_focus,
        };
        let ws = loader.load(SAM_CORRECTED, &request).unwrap();
        reduction.store.insert(ws);
        reduction.to_unit(SAM_CORRECTED, Unit::MomentumTransfer).unwrap();
        let before = reduction.store.handle(SAM_CORRECTED).unwrap();

        let mut title = String::new();
        let err = reduction.sample_placzek(&mut title).unwrap_err();
        assert_eq!(err.kind(), "MissingMaterialError");
        let err = reduction.structure_factors().unwrap_err();
        assert_eq!(err.kind(), "MissingMaterialError");

        assert_eq!(reduction.store.handle(SAM_CORRECTED).unwrap(), before);
        assert_eq!(
            reduction.store.get(SAM_CORRECTED).unwrap().unit,
            Unit::MomentumTransfer
        );
        assert!(title.is_empty());
    }
}
