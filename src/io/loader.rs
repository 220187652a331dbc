//! # 数据加载
//!
//! `Loader` 是约化流水线与原始数据之间的窄接口：给定一组扫描名，返回
//! 已对齐聚焦、处于飞行时间单位的工作区。
//!
//! ## CsvLoader 文件格式
//! `<CacheDir>/<scan>.csv`，两种布局（按表头识别）：
//! ```text
//! bank,tof_min,tof_max,counts[,error][,l2,polar]   直方图
//! bank,tof,weight[,l2,polar]                       事件
//! ```
//! 监视器 `<CacheDir>/<scan>_monitor.csv`：`wavelength,counts`
//!
//! 多个扫描先各自放到公共 TOF 分箱上（`Params`，或 `ResampleX` 个对数/线性
//! bin 覆盖 `TMin..TMax`），再相加。`PreserveEvents=true` 时事件只做范围裁剪。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs` 调用
//! - 使用 `csv` 读取文件，`reduction/arithmetic.rs` 求和，`reduction/rebin.rs` 重分箱

use crate::config::AlignAndFocusArgs;
use crate::error::{Result, TotscatError};
use crate::inelastic::MonitorSpectrum;
use crate::models::{Bank, BankData, BankGeometry, Event, Histogram, Unit, Workspace};
use crate::neutron::SampleMaterial;
use crate::reduction::arithmetic::plus;
use crate::reduction::rebin::rebin_to_edges;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 未给出 TMin 时的默认下限（μs）
pub const DEFAULT_TMIN: f64 = 300.0;

/// 未给出 TMax 时的默认上限（μs，60 Hz 帧）
pub const DEFAULT_TMAX: f64 = 16_666.0;

/// 一次加载请求
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub scans: &'a [String],
    /// 附到工作区上的样品信息（化学式、密度、几何）
    pub sample: Option<&'a SampleMaterial>,
    pub options: &'a AlignAndFocusArgs,
}

/// 加载协作者
pub trait Loader {
    /// 加载并求和一组扫描，结果处于 TOF 单位
    fn load(&self, name: &str, request: &LoadRequest) -> Result<Workspace>;

    /// 读取单个扫描的束流监视器谱
    fn load_monitor(&self, scan: &str, options: &AlignAndFocusArgs) -> Result<MonitorSpectrum>;
}

/// 读取缓存目录中预聚焦 CSV 的加载器
#[derive(Debug, Default)]
pub struct CsvLoader;

impl CsvLoader {
    pub fn new() -> Self {
        Self
    }

    fn scan_path(options: &AlignAndFocusArgs, scan: &str) -> PathBuf {
        options.cache_dir.join(format!("{}.csv", scan))
    }

    fn monitor_path(options: &AlignAndFocusArgs, scan: &str) -> PathBuf {
        options.cache_dir.join(format!("{}_monitor.csv", scan))
    }
}

impl Loader for CsvLoader {
    fn load(&self, name: &str, request: &LoadRequest) -> Result<Workspace> {
        let options = request.options;
        if request.scans.is_empty() {
            return Err(TotscatError::InvalidArgument(format!(
                "no scans to load for '{}'",
                name
            )));
        }

        let table = options.geometry_table()?;
        let edges = common_tof_edges(options)?;

        let mut total: Option<Workspace> = None;
        for scan in request.scans {
            let path = Self::scan_path(options, scan);
            let banks = parse_scan_file(&path, scan)?;
            let mut ws = build_workspace(name, banks, table.as_deref(), options)?;
            place_on_common_binning(&mut ws, &edges, options.preserve_events)?;
            total = Some(match total {
                None => ws,
                Some(acc) => plus(&acc, &ws, name)?,
            });
        }

        let mut ws = total.ok_or_else(|| {
            TotscatError::InvalidArgument(format!("no scans to load for '{}'", name))
        })?;
        if let Some(sample) = request.sample {
            ws = ws.with_sample(sample.clone());
        }
        Ok(ws)
    }

    fn load_monitor(&self, scan: &str, options: &AlignAndFocusArgs) -> Result<MonitorSpectrum> {
        let path = Self::monitor_path(options, scan);
        let content = read(&path)?;
        parse_monitor_csv(&content, &path.display().to_string())
    }
}

/// 公共 TOF 分箱边界
pub fn common_tof_edges(options: &AlignAndFocusArgs) -> Result<Vec<f64>> {
    if let Some(params) = &options.params {
        return Ok(params.edges());
    }

    let tmin = options.tmin.unwrap_or(DEFAULT_TMIN);
    let tmax = options.tmax.unwrap_or(DEFAULT_TMAX);
    if !(tmax > tmin) {
        return Err(TotscatError::config(
            "AlignAndFocusArgs.TMin/TMax",
            format!("empty TOF range {}..{}", tmin, tmax),
        ));
    }
    let bins = options.resample_x.unsigned_abs().max(1) as usize;

    // 负的 ResampleX 表示对数分箱
    if options.resample_x < 0 {
        if tmin <= 0.0 {
            return Err(TotscatError::config(
                "AlignAndFocusArgs.TMin",
                "logarithmic ResampleX needs TMin > 0",
            ));
        }
        let ratio = (tmax / tmin).ln() / bins as f64;
        Ok((0..=bins).map(|i| tmin * (ratio * i as f64).exp()).collect())
    } else {
        let step = (tmax - tmin) / bins as f64;
        Ok((0..=bins).map(|i| tmin + step * i as f64).collect())
    }
}

/// 单个扫描文件中一个 bank 的内容
#[derive(Debug, Clone, PartialEq)]
struct ParsedBank {
    index: usize,
    geometry: Option<BankGeometry>,
    data: BankData,
}

fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(TotscatError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path).map_err(|e| TotscatError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

fn parse_scan_file(path: &Path, scan: &str) -> Result<Vec<ParsedBank>> {
    let content = read(path)?;
    parse_scan_csv(&content, scan)
}

fn parse_error(source: &str, reason: impl Into<String>) -> TotscatError {
    TotscatError::ParseError {
        format: "bank CSV".to_string(),
        path: source.to_string(),
        reason: reason.into(),
    }
}

/// 列名 -> 列号
struct Columns {
    index: BTreeMap<String, usize>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        Self { index }
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn value(&self, record: &csv::StringRecord, name: &str, source: &str) -> Result<f64> {
        let col = *self
            .index
            .get(name)
            .ok_or_else(|| parse_error(source, format!("missing column '{}'", name)))?;
        let text = record
            .get(col)
            .ok_or_else(|| parse_error(source, format!("short row, no '{}'", name)))?;
        text.trim()
            .parse()
            .map_err(|_| parse_error(source, format!("invalid {} value '{}'", name, text)))
    }

    fn optional(&self, record: &csv::StringRecord, name: &str, source: &str) -> Result<Option<f64>> {
        if self.has(name) {
            self.value(record, name, source).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(content.as_bytes())
}

/// 解析扫描 CSV（按表头区分直方图与事件布局）
fn parse_scan_csv(content: &str, source: &str) -> Result<Vec<ParsedBank>> {
    let mut rdr = reader(content);
    let columns = Columns::new(rdr.headers()?);
    if !columns.has("bank") {
        return Err(parse_error(source, "missing column 'bank'"));
    }
    let is_histogram = columns.has("tof_min");
    if !is_histogram && !columns.has("tof") {
        return Err(parse_error(source, "expected 'tof_min,tof_max,counts' or 'tof,weight'"));
    }

    let mut rows: BTreeMap<usize, Vec<[f64; 4]>> = BTreeMap::new();
    let mut events: BTreeMap<usize, Vec<Event>> = BTreeMap::new();
    let mut geometry: BTreeMap<usize, BankGeometry> = BTreeMap::new();

    for record in rdr.records() {
        let record = record?;
        let bank = columns.value(&record, "bank", source)?;
        if bank < 0.0 || bank.fract() != 0.0 {
            return Err(parse_error(source, format!("invalid bank index {}", bank)));
        }
        let bank = bank as usize;

        if let (Some(l2), Some(polar)) = (
            columns.optional(&record, "l2", source)?,
            columns.optional(&record, "polar", source)?,
        ) {
            geometry.entry(bank).or_insert(BankGeometry::new(l2, polar));
        }

        if is_histogram {
            let lo = columns.value(&record, "tof_min", source)?;
            let hi = columns.value(&record, "tof_max", source)?;
            let counts = columns.value(&record, "counts", source)?;
            let error = columns
                .optional(&record, "error", source)?
                .unwrap_or_else(|| counts.abs().sqrt());
            rows.entry(bank).or_default().push([lo, hi, counts, error]);
        } else {
            let tof = columns.value(&record, "tof", source)?;
            let weight = columns.value(&record, "weight", source)?;
            events.entry(bank).or_default().push(Event::new(tof, weight));
        }
    }

    let mut banks = Vec::new();
    if is_histogram {
        for (index, mut bins) in rows {
            bins.sort_by(|a, b| a[0].total_cmp(&b[0]));
            let histogram = rows_to_histogram(&bins)
                .map_err(|reason| parse_error(source, format!("bank {}: {}", index, reason)))?;
            banks.push(ParsedBank {
                index,
                geometry: geometry.get(&index).copied(),
                data: BankData::Histogram(histogram),
            });
        }
    } else {
        for (index, list) in events {
            banks.push(ParsedBank {
                index,
                geometry: geometry.get(&index).copied(),
                data: BankData::Events(list),
            });
        }
    }

    if banks.is_empty() {
        return Err(parse_error(source, "no data rows"));
    }
    Ok(banks)
}

/// 相邻行的 bin 必须首尾相接
fn rows_to_histogram(bins: &[[f64; 4]]) -> std::result::Result<Histogram, String> {
    let mut edges = Vec::with_capacity(bins.len() + 1);
    edges.push(bins[0][0]);
    for (i, bin) in bins.iter().enumerate() {
        if i > 0 {
            let prev = bins[i - 1][1];
            if (bin[0] - prev).abs() > 1e-9 * prev.abs().max(1.0) {
                return Err(format!("gap between bins at tof {} and {}", prev, bin[0]));
            }
        }
        edges.push(bin[1]);
    }
    let y = bins.iter().map(|b| b[2]).collect();
    let e = bins.iter().map(|b| b[3]).collect();
    Histogram::new(edges, y, e).map_err(|e| e.to_string())
}

fn build_workspace(
    name: &str,
    parsed: Vec<ParsedBank>,
    table: Option<&[BankGeometry]>,
    options: &AlignAndFocusArgs,
) -> Result<Workspace> {
    if let Some(table) = table {
        if table.len() != parsed.len() {
            return Err(TotscatError::config(
                "AlignAndFocusArgs.L2/Polar",
                format!(
                    "{} banks in data but {} geometry entries",
                    parsed.len(),
                    table.len()
                ),
            ));
        }
    }

    let banks = parsed
        .into_iter()
        .enumerate()
        .map(|(position, bank)| {
            let geometry = table
                .map(|t| t[position])
                .or(bank.geometry)
                .ok_or_else(|| {
                    TotscatError::config(
                        "AlignAndFocusArgs.L2/Polar",
                        format!("no geometry for bank {} in '{}'", bank.index, name),
                    )
                })?;
            Ok(Bank {
                geometry,
                data: bank.data,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Workspace::new(name, Unit::TimeOfFlight, banks).with_l1(options.primary_flight_path))
}

/// 直方图重分箱到公共边界；保留事件时只裁剪到边界范围
fn place_on_common_binning(ws: &mut Workspace, edges: &[f64], preserve_events: bool) -> Result<()> {
    if preserve_events && ws.has_events() {
        let (lo, hi) = (edges[0], edges[edges.len() - 1]);
        let mut histogram_banks = false;
        for bank in &mut ws.banks {
            match &mut bank.data {
                BankData::Events(events) => events.retain(|ev| ev.x >= lo && ev.x < hi),
                BankData::Histogram(_) => histogram_banks = true,
            }
        }
        if !histogram_banks {
            return Ok(());
        }
    }
    rebin_to_edges(ws, edges)
}

/// 解析监视器 CSV
fn parse_monitor_csv(content: &str, source: &str) -> Result<MonitorSpectrum> {
    let mut rdr = reader(content);
    let columns = Columns::new(rdr.headers()?);

    let mut points: Vec<(f64, f64)> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        points.push((
            columns.value(&record, "wavelength", source)?,
            columns.value(&record, "counts", source)?,
        ));
    }
    if points.len() < 2 {
        return Err(parse_error(source, "monitor needs at least two points"));
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (wavelength, counts) = points.into_iter().unzip();
    Ok(MonitorSpectrum { wavelength, counts })
}
