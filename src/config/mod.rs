//! # 约化配置
//!
//! JSON 配置先反序列化为原始结构（PascalCase 键），再在加载时一次性校验为
//! 强类型结构。缺少必需键时在读取任何数据之前报 `Config` 错误。
//!
//! ## 配置结构
//! - `Title` / `Instrument` / `Facility`
//! - `Sample { Runs, MassDensity, PackingFraction, Geometry, Material, Background {...},
//!   AbsorptionCorrection, MultipleScatteringCorrection, InelasticCorrection }`
//! - `Vanadium { ...同上... }`
//! - `Calibration { Filename }`
//! - `Merging { QBinning, Characterizations, Grouping { Initial, Output } }`
//! - 可选 `CacheDir` / `OutputDir` / `AlignAndFocusArgs`
//!
//! ## 依赖关系
//! - 被 `commands/reduce.rs`、`batch/runner.rs`、`reduction/pipeline.rs` 使用
//! - 使用 `config/runs.rs` 展开运行号
//! - 使用 `serde` / `serde_json` 反序列化

pub mod runs;

pub use runs::{compress_ints, expand_ints};

use crate::error::{Result, TotscatError};
use crate::inelastic::{parse_order, FitFamily, InelasticSpec, InelasticType};
use crate::models::{BankGeometry, Binning, SampleGeometry, Shape, DEFAULT_L1};
use crate::neutron::{Material, SampleMaterial};
use crate::reduction::correction::{CorrectionMethod, CorrectionType};

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────
// 原始结构（与 JSON 一一对应）
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    title: Option<String>,
    instrument: Option<String>,
    facility: Option<String>,
    sample: Option<RawSample>,
    #[serde(alias = "Normalization")]
    vanadium: Option<RawSample>,
    calibration: Option<RawCalibration>,
    merging: Option<RawMerging>,
    cache_dir: Option<String>,
    output_dir: Option<String>,
    align_and_focus_args: Option<Map<String, Value>>,
}

/// `Runs` 可以是范围字符串、单个整数或整数数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRuns {
    Text(String),
    Number(u32),
    List(Vec<u32>),
}

/// 分箱参数可以是 `"0.,0.02,40."` 或数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBinning {
    Text(String),
    Values(Vec<f64>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSample {
    runs: Option<RawRuns>,
    filenames: Option<Vec<String>>,
    mass_density: Option<f64>,
    packing_fraction: Option<f64>,
    geometry: Option<RawGeometry>,
    material: Option<String>,
    background: Option<RawBackground>,
    absorption_correction: Option<RawCorrection>,
    multiple_scattering_correction: Option<RawCorrection>,
    inelastic_correction: Option<RawInelastic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBackground {
    runs: Option<RawRuns>,
    filenames: Option<Vec<String>>,
    background: Option<Box<RawBackground>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGeometry {
    radius: Option<f64>,
    height: Option<f64>,
    shape: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCorrection {
    #[serde(rename = "Type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInelastic {
    #[serde(rename = "Type")]
    kind: Option<String>,
    order: Option<String>,
    #[serde(rename = "Self")]
    self_scattering: Option<bool>,
    interference: Option<bool>,
    fit_spectrum_with: Option<String>,
    lambda_binning: Option<RawBinning>,
    lambda_binning_for_fit: Option<RawBinning>,
    lambda_binning_for_calc: Option<RawBinning>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCalibration {
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCharacterizations {
    Path(String),
    File {
        #[serde(rename = "Filename")]
        filename: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMerging {
    #[serde(rename = "QBinning")]
    q_binning: Option<RawBinning>,
    characterizations: Option<RawCharacterizations>,
    grouping: Option<RawGrouping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGrouping {
    initial: Option<String>,
    output: Option<String>,
}

// ─────────────────────────────────────────────────────────────
// 强类型配置
// ─────────────────────────────────────────────────────────────

/// 一组运行：运行号与对应的扫描名
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSet {
    pub runs: Vec<u32>,
    pub scans: Vec<String>,
}

impl RunSet {
    /// 第一个扫描名（入射谱取自它）
    pub fn first_scan(&self) -> Option<&str> {
        self.scans.first().map(String::as_str)
    }

    /// 用于打印的紧凑表示
    pub fn label(&self) -> String {
        if self.runs.is_empty() {
            self.scans.join(",")
        } else {
            compress_ints(&self.runs)
        }
    }
}

/// 本底：运行集 + 可选的本底的本底
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSpec {
    pub runs: RunSet,
    pub background: Option<RunSet>,
}

/// 吸收与多重散射校正标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectionSpec {
    pub absorption: CorrectionType,
    pub multiple_scattering: CorrectionType,
}

impl CorrectionSpec {
    pub fn method(&self) -> CorrectionMethod {
        CorrectionMethod::resolve(self.absorption, self.multiple_scattering)
    }
}

/// 样品或钒的完整设置
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSpec {
    pub runs: RunSet,
    pub material: Option<Material>,
    /// 质量密度（g/cm³）
    pub mass_density: f64,
    pub packing_fraction: f64,
    pub geometry: SampleGeometry,
    pub background: Option<BackgroundSpec>,
    pub correction: CorrectionSpec,
    pub inelastic: InelasticSpec,
}

impl SampleSpec {
    /// 附到工作区上的样品信息；未配置材料时为 None
    pub fn sample_material(&self) -> Option<SampleMaterial> {
        self.material.as_ref().map(|m| {
            SampleMaterial::new(
                m.clone(),
                self.mass_density,
                self.packing_fraction,
                Some(self.geometry.clone()),
            )
        })
    }
}

/// 合并设置
#[derive(Debug, Clone, PartialEq)]
pub struct MergingSpec {
    pub q_binning: Binning,
    pub characterizations: Option<PathBuf>,
    pub grouping_initial: Option<String>,
    pub grouping_output: Option<String>,
}

/// 传给加载器的 align-and-focus 参数
#[derive(Debug, Clone, PartialEq)]
pub struct AlignAndFocusArgs {
    pub resample_x: i64,
    pub dspacing: bool,
    pub preserve_events: bool,
    pub max_chunk_size: f64,
    pub cache_dir: PathBuf,
    pub cal_filename: String,
    pub primary_flight_path: f64,
    pub params: Option<Binning>,
    pub tmin: Option<f64>,
    pub tmax: Option<f64>,
    pub group_filename: Option<String>,
    pub l2: Option<Vec<f64>>,
    pub polar: Option<Vec<f64>>,
    /// 未识别的键原样传给加载器
    pub extra: BTreeMap<String, Value>,
}

impl AlignAndFocusArgs {
    fn defaults(cache_dir: &Path, cal_filename: &str) -> Self {
        let mut extra = BTreeMap::new();
        extra.insert("RemovePromptPulseWidth".to_string(), Value::from(50));
        Self {
            resample_x: -6000,
            dspacing: false,
            preserve_events: false,
            max_chunk_size: 8.0,
            cache_dir: cache_dir.to_path_buf(),
            cal_filename: cal_filename.to_string(),
            primary_flight_path: DEFAULT_L1,
            params: None,
            tmin: None,
            tmax: None,
            group_filename: None,
            l2: None,
            polar: None,
            extra,
        }
    }

    /// 用户键覆盖默认值
    fn merge(&mut self, user: &Map<String, Value>) -> Result<()> {
        for (key, value) in user {
            let path = format!("AlignAndFocusArgs.{}", key);
            match key.as_str() {
                "ResampleX" => self.resample_x = number(&path, value)?.round() as i64,
                "Dspacing" => self.dspacing = boolean(&path, value)?,
                "PreserveEvents" => self.preserve_events = boolean(&path, value)?,
                "MaxChunkSize" => self.max_chunk_size = number(&path, value)?,
                "CacheDir" => self.cache_dir = PathBuf::from(string(&path, value)?),
                "CalFilename" => self.cal_filename = string(&path, value)?,
                "PrimaryFlightPath" => self.primary_flight_path = number(&path, value)?,
                "Params" => self.params = Some(binning_value(&path, value)?),
                "TMin" => self.tmin = Some(number(&path, value)?),
                "TMax" => self.tmax = Some(number(&path, value)?),
                "GroupFilename" => self.group_filename = Some(string(&path, value)?),
                "L2" => self.l2 = Some(number_list(&path, value)?),
                "Polar" => self.polar = Some(number_list(&path, value)?),
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    /// 由 `L2` / `Polar` 组成的仪器几何表（两者都缺省时为 None）
    pub fn geometry_table(&self) -> Result<Option<Vec<BankGeometry>>> {
        match (&self.l2, &self.polar) {
            (None, None) => Ok(None),
            (Some(l2), Some(polar)) => {
                if l2.len() != polar.len() {
                    return Err(TotscatError::config(
                        "AlignAndFocusArgs.L2/Polar",
                        format!("{} L2 values but {} Polar values", l2.len(), polar.len()),
                    ));
                }
                Ok(Some(
                    l2.iter()
                        .zip(polar)
                        .map(|(l2, polar)| BankGeometry::new(*l2, *polar))
                        .collect(),
                ))
            }
            (Some(_), None) => Err(TotscatError::config(
                "AlignAndFocusArgs.Polar",
                "required when L2 is given",
            )),
            (None, Some(_)) => Err(TotscatError::config(
                "AlignAndFocusArgs.L2",
                "required when Polar is given",
            )),
        }
    }
}

/// 完整的约化配置
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionConfig {
    pub title: String,
    pub instrument: String,
    pub facility: String,
    pub sample: SampleSpec,
    pub vanadium: SampleSpec,
    pub calibration_file: String,
    pub merging: MergingSpec,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub align_and_focus: AlignAndFocusArgs,
}

impl ReductionConfig {
    /// 从 JSON 文件读取并校验
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TotscatError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| TotscatError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&text).map_err(|e| match e {
            TotscatError::JsonError(err) => TotscatError::ParseError {
                format: "JSON config".to_string(),
                path: path.display().to_string(),
                reason: err.to_string(),
            },
            other => other,
        })
    }

    /// 从 JSON 文本读取并校验
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Self::validate(raw)
    }

    /// 命令行覆盖输出目录
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// 命令行覆盖缓存目录（同时作用于加载器参数）
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.align_and_focus.cache_dir = dir.clone();
        self.cache_dir = dir;
        self
    }

    /// 主检查点文件 `<Title>.nxs`
    pub fn nexus_filename(&self) -> String {
        format!("{}.nxs", self.title)
    }

    /// 布拉格衍射输出 `<OutputDir>/<Title>.gsa`
    pub fn gsas_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.gsa", self.title))
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        let title = required(raw.title, "Title")?;
        let instrument = required(raw.instrument, "Instrument")?;
        let facility = required(raw.facility, "Facility")?;
        let naming = ScanNaming {
            instrument: &instrument,
            facility: &facility,
        };

        let raw_sample = required(raw.sample, "Sample")?;
        let sample = sample_spec(raw_sample, "Sample", &naming, SampleDefaults::sample())?;
        if sample.background.is_none() {
            return Err(TotscatError::config("Sample.Background", "missing required key"));
        }

        let raw_van = required(raw.vanadium, "Vanadium")?;
        let vanadium = sample_spec(
            raw_van,
            "Vanadium",
            &naming,
            SampleDefaults::vanadium(sample.mass_density),
        )?;

        let calibration = required(raw.calibration, "Calibration")?;
        let calibration_file = required(calibration.filename, "Calibration.Filename")?;

        let raw_merging = required(raw.merging, "Merging")?;
        let q_binning = binning(
            required(raw_merging.q_binning, "Merging.QBinning")?,
            "Merging.QBinning",
        )?;
        let characterizations = raw_merging.characterizations.map(|c| match c {
            RawCharacterizations::Path(p) => PathBuf::from(p),
            RawCharacterizations::File { filename } => PathBuf::from(filename),
        });
        let (grouping_initial, grouping_output) = match raw_merging.grouping {
            Some(g) => (g.initial, g.output),
            None => (None, None),
        };
        let merging = MergingSpec {
            q_binning,
            characterizations,
            grouping_initial,
            grouping_output,
        };

        let cache_dir = PathBuf::from(raw.cache_dir.unwrap_or_else(|| ".".to_string()));
        let output_dir = PathBuf::from(raw.output_dir.unwrap_or_else(|| ".".to_string()));

        let mut align_and_focus = AlignAndFocusArgs::defaults(&cache_dir, &calibration_file);
        align_and_focus.group_filename = merging.grouping_initial.clone();
        if let Some(user) = &raw.align_and_focus_args {
            align_and_focus.merge(user)?;
        }
        align_and_focus.geometry_table()?;

        Ok(Self {
            title,
            instrument,
            facility,
            sample,
            vanadium,
            calibration_file,
            merging,
            cache_dir,
            output_dir,
            align_and_focus,
        })
    }
}

// ─────────────────────────────────────────────────────────────
// 校验辅助
// ─────────────────────────────────────────────────────────────

/// 扫描名规则：SNS 为 `<Instrument>_<run>`，其他设施为 `<Instrument><run>`
struct ScanNaming<'a> {
    instrument: &'a str,
    facility: &'a str,
}

impl ScanNaming<'_> {
    fn scan(&self, run: u32) -> String {
        if self.facility.eq_ignore_ascii_case("SNS") {
            format!("{}_{}", self.instrument, run)
        } else {
            format!("{}{}", self.instrument, run)
        }
    }

    /// 运行号展开 + `Filenames` 覆盖
    fn run_set(
        &self,
        runs: Option<RawRuns>,
        filenames: Option<Vec<String>>,
        key: &str,
    ) -> Result<RunSet> {
        let runs = match runs {
            Some(RawRuns::Text(s)) => expand_ints(&s)
                .map_err(|e| TotscatError::config(&format!("{}.Runs", key), e.to_string()))?,
            Some(RawRuns::Number(n)) => vec![n],
            Some(RawRuns::List(list)) => list,
            None => Vec::new(),
        };
        let scans = match filenames {
            Some(names) if !names.is_empty() => names,
            _ => runs.iter().map(|r| self.scan(*r)).collect(),
        };
        if scans.is_empty() {
            return Err(TotscatError::config(
                &format!("{}.Runs", key),
                "missing required key (or Filenames)",
            ));
        }
        Ok(RunSet { runs, scans })
    }
}

/// 样品与钒的默认值差异
struct SampleDefaults {
    packing_fraction: Option<f64>,
    material: Option<&'static str>,
    mass_density: Option<f64>,
}

impl SampleDefaults {
    fn sample() -> Self {
        Self {
            packing_fraction: None,
            material: None,
            mass_density: None,
        }
    }

    fn vanadium(sample_density: f64) -> Self {
        Self {
            packing_fraction: Some(1.0),
            material: Some("V"),
            mass_density: Some(sample_density),
        }
    }
}

fn sample_spec(
    raw: RawSample,
    key: &str,
    naming: &ScanNaming,
    defaults: SampleDefaults,
) -> Result<SampleSpec> {
    let runs = naming.run_set(raw.runs, raw.filenames, key)?;

    let mass_density = raw
        .mass_density
        .or(defaults.mass_density)
        .ok_or_else(|| TotscatError::config(&format!("{}.MassDensity", key), "missing required key"))?;
    let packing_fraction = raw
        .packing_fraction
        .or(defaults.packing_fraction)
        .ok_or_else(|| {
            TotscatError::config(&format!("{}.PackingFraction", key), "missing required key")
        })?;

    let material = match raw.material.as_deref().or(defaults.material) {
        Some(formula) if !formula.trim().is_empty() => Some(
            Material::from_formula(formula)
                .map_err(|e| TotscatError::config(&format!("{}.Material", key), e.to_string()))?,
        ),
        _ => None,
    };

    let geometry = match raw.geometry {
        Some(g) => SampleGeometry {
            shape: match g.shape.as_deref() {
                Some(s) => s.parse()?,
                None => Shape::Cylinder,
            },
            radius: g.radius,
            height: g.height,
        },
        None => SampleGeometry::default(),
    };

    let background = match raw.background {
        Some(bg) => {
            let bg_key = format!("{}.Background", key);
            let runs = naming.run_set(bg.runs, bg.filenames, &bg_key)?;
            let background = match bg.background {
                Some(inner) => Some(naming.run_set(
                    inner.runs,
                    inner.filenames,
                    &format!("{}.Background", bg_key),
                )?),
                None => None,
            };
            Some(BackgroundSpec { runs, background })
        }
        None => None,
    };

    let correction = CorrectionSpec {
        absorption: correction_type(raw.absorption_correction)?,
        multiple_scattering: correction_type(raw.multiple_scattering_correction)?,
    };

    let inelastic = inelastic_spec(raw.inelastic_correction, key)?;

    Ok(SampleSpec {
        runs,
        material,
        mass_density,
        packing_fraction,
        geometry,
        background,
        correction,
        inelastic,
    })
}

fn correction_type(raw: Option<RawCorrection>) -> Result<CorrectionType> {
    match raw.and_then(|c| c.kind) {
        Some(kind) => kind.parse(),
        None => Ok(CorrectionType::None),
    }
}

/// 默认值与用户设置合并
fn inelastic_spec(raw: Option<RawInelastic>, key: &str) -> Result<InelasticSpec> {
    let mut spec = InelasticSpec::default();
    let Some(raw) = raw else {
        return Ok(spec);
    };
    let key = format!("{}.InelasticCorrection", key);

    spec.kind = match raw.kind.as_deref() {
        Some(kind) => kind.parse::<InelasticType>()?,
        None => InelasticType::None,
    };
    if let Some(order) = raw.order.as_deref() {
        spec.order = parse_order(order)?;
    }
    if let Some(value) = raw.self_scattering {
        spec.self_scattering = value;
    }
    if let Some(value) = raw.interference {
        spec.interference = value;
    }
    if let Some(family) = raw.fit_spectrum_with.as_deref() {
        spec.fit_with = family.parse::<FitFamily>()?;
    }

    let common = match raw.lambda_binning {
        Some(b) => Some(binning(b, &format!("{}.LambdaBinning", key))?),
        None => None,
    };
    if let Some(common) = &common {
        spec.lambda_binning_fit = common.clone();
        spec.lambda_binning_calc = common.clone();
    }
    if let Some(b) = raw.lambda_binning_for_fit {
        spec.lambda_binning_fit = binning(b, &format!("{}.LambdaBinningForFit", key))?;
    }
    if let Some(b) = raw.lambda_binning_for_calc {
        spec.lambda_binning_calc = binning(b, &format!("{}.LambdaBinningForCalc", key))?;
    }

    Ok(spec)
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| TotscatError::config(key, "missing required key"))
}

fn binning(raw: RawBinning, key: &str) -> Result<Binning> {
    let parsed = match raw {
        RawBinning::Text(s) => s.parse::<Binning>(),
        RawBinning::Values(v) => Binning::new(v),
    };
    parsed.map_err(|e| TotscatError::config(key, e.to_string()))
}

fn binning_value(key: &str, value: &Value) -> Result<Binning> {
    match value {
        Value::String(s) => binning(RawBinning::Text(s.clone()), key),
        Value::Array(_) => binning(RawBinning::Values(number_list(key, value)?), key),
        _ => Err(TotscatError::config(key, "expected binning string or array")),
    }
}

fn number(key: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| TotscatError::config(key, format!("expected a number, got {}", value)))
}

fn boolean(key: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| TotscatError::config(key, format!("expected a boolean, got {}", value)))
}

fn string(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| TotscatError::config(key, format!("expected a string, got {}", value)))
}

fn number_list(key: &str, value: &Value) -> Result<Vec<f64>> {
    let items = value
        .as_array()
        .ok_or_else(|| TotscatError::config(key, format!("expected an array, got {}", value)))?;
    items.iter().map(|v| number(key, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> serde_json::Value {
        serde_json::json!({
            "Title": "silicon",
            "Instrument": "NOM",
            "Facility": "SNS",
            "Sample": {
                "Runs": "10-12",
                "MassDensity": 2.33,
                "PackingFraction": 0.6,
                "Material": "Si",
                "Geometry": {"Radius": 0.3, "Height": 1.8},
                "Background": {"Runs": 20, "Background": {"Runs": "30"}},
                "AbsorptionCorrection": {"Type": "Mayers"},
                "MultipleScatteringCorrection": {"Type": "Mayers"},
                "InelasticCorrection": {"Type": "Placzek", "LambdaBinning": "0.2,0.05,2.5"}
            },
            "Vanadium": {
                "Runs": [40, 41],
                "MassDensity": 6.11,
                "Geometry": {"Radius": 0.3, "Height": 1.8}
            },
            "Calibration": {"Filename": "NOM_cal.h5"},
            "Merging": {"QBinning": "0.,0.02,40.", "Characterizations": {"Filename": "char.txt"}}
        })
    }

    fn parse(value: serde_json::Value) -> Result<ReductionConfig> {
        ReductionConfig::from_json_str(&value.to_string())
    }

    #[test]
    fn test_minimal_config() {
        let cfg = parse(minimal()).unwrap();
        assert_eq!(cfg.sample.runs.runs, vec![10, 11, 12]);
        assert_eq!(cfg.sample.runs.scans[0], "NOM_10");
        let bg = cfg.sample.background.as_ref().unwrap();
        assert_eq!(bg.runs.scans, vec!["NOM_20".to_string()]);
        assert_eq!(bg.background.as_ref().unwrap().runs, vec![30]);

        assert_eq!(
            cfg.sample.correction.method(),
            CorrectionMethod::Mayers {
                multiple_scattering: true
            }
        );
        assert!(cfg.sample.inelastic.is_placzek());
        assert_eq!(cfg.sample.inelastic.lambda_binning_fit.edges()[0], 0.2);
        assert_eq!(cfg.sample.inelastic.lambda_binning_calc.edges().last(), Some(&2.5));

        // 钒默认值
        assert_eq!(cfg.vanadium.packing_fraction, 1.0);
        assert_eq!(cfg.vanadium.material.as_ref().unwrap().name(), "V");
        assert_eq!(cfg.vanadium.correction.method(), CorrectionMethod::None);
        assert!(!cfg.vanadium.inelastic.is_placzek());

        assert_eq!(cfg.align_and_focus.resample_x, -6000);
        assert!(!cfg.align_and_focus.preserve_events);
        assert_eq!(cfg.align_and_focus.cal_filename, "NOM_cal.h5");
        assert_eq!(cfg.merging.characterizations, Some(PathBuf::from("char.txt")));
        assert_eq!(cfg.nexus_filename(), "silicon.nxs");
    }

    #[test]
    fn test_missing_required_keys() {
        let mut value = minimal();
        value.as_object_mut().unwrap().remove("Title");
        match parse(value) {
            Err(TotscatError::Config { key, .. }) => assert_eq!(key, "Title"),
            other => panic!("expected config error, got {:?}", other),
        }

        let mut value = minimal();
        value["Sample"].as_object_mut().unwrap().remove("Background");
        match parse(value) {
            Err(TotscatError::Config { key, .. }) => assert_eq!(key, "Sample.Background"),
            other => panic!("expected config error, got {:?}", other),
        }

        let mut value = minimal();
        value["Merging"].as_object_mut().unwrap().remove("QBinning");
        assert!(matches!(parse(value), Err(TotscatError::Config { .. })));
    }

    #[test]
    fn test_filenames_override_and_facility_naming() {
        let mut value = minimal();
        value["Facility"] = "ILL".into();
        value["Vanadium"]["Filenames"] = serde_json::json!(["van_a", "van_b"]);
        let cfg = parse(value).unwrap();
        assert_eq!(cfg.sample.runs.scans[0], "NOM10");
        assert_eq!(cfg.vanadium.runs.scans, vec!["van_a", "van_b"]);
        assert_eq!(cfg.vanadium.runs.label(), "40-41");
    }

    #[test]
    fn test_align_and_focus_overrides() {
        let mut value = minimal();
        value["AlignAndFocusArgs"] = serde_json::json!({
            "PreserveEvents": true,
            "Params": "300,-0.001,16600",
            "L2": [2.0, 2.0],
            "Polar": [30.0, 90.0],
            "CompressTolerance": 0.01
        });
        let cfg = parse(value).unwrap();
        assert!(cfg.align_and_focus.preserve_events);
        assert!(cfg.align_and_focus.params.is_some());
        assert!(cfg.align_and_focus.extra.contains_key("CompressTolerance"));
        let table = cfg.align_and_focus.geometry_table().unwrap().unwrap();
        assert_eq!(table[1], BankGeometry::new(2.0, 90.0));

        let mut value = minimal();
        value["AlignAndFocusArgs"] = serde_json::json!({"L2": [2.0], "Polar": [30.0, 90.0]});
        assert!(matches!(parse(value), Err(TotscatError::Config { .. })));
    }

    #[test]
    fn test_unknown_tags_rejected() {
        let mut value = minimal();
        value["Sample"]["AbsorptionCorrection"]["Type"] = "PaalmanPings".into();
        assert!(matches!(
            parse(value),
            Err(TotscatError::UnsupportedCorrectionType(_))
        ));

        let mut value = minimal();
        value["Sample"]["Geometry"]["Shape"] = "Annulus".into();
        assert!(matches!(
            parse(value),
            Err(TotscatError::UnsupportedGeometry(_))
        ));
    }
}
