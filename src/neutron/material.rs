//! # 样品材料
//!
//! 解析化学式并计算中子散射相关的材料常数。
//!
//! ## 常数定义（按原子浓度 cᵢ 加权）
//! - `<b>`      = Σ cᵢ bᵢ                     (fm)
//! - `<b²>`     = Σ cᵢ σ_tot,ᵢ / 4π · 100      (fm²)
//! - `σ_tot`    = Σ cᵢ σ_tot,ᵢ                 (barn / atom)
//! - `M`        = Σ nᵢ Mᵢ                      (g/mol / formula unit)
//!
//! ## 依赖关系
//! - 被 `models/workspace.rs`、`reduction/`、`inelastic/` 使用
//! - 使用 `neutron/scattering.rs` 数据库
//! - 使用 `models/geometry.rs` 计算样品体积

use crate::error::{Result, TotscatError};
use crate::models::geometry::SampleGeometry;
use crate::neutron::scattering::{self, NeutronData};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::LazyLock;

/// 阿伏伽德罗常数（1/mol）
pub const AVOGADRO: f64 = 6.02214076e23;

/// 中子质量（原子质量单位）
pub const NEUTRON_MASS_AMU: f64 = 1.00866491595;

static FORMULA_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][a-z]?)(\d+(?:\.\d+)?)?").expect("valid regex")
});

/// 化学式中的一种元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaAtom {
    pub symbol: String,
    /// 每个化学式单元中的原子数
    pub count: f64,
}

/// 由化学式定义的材料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// 原始化学式（如 "Si O2" 或 "SiO2"）
    pub formula: String,
    pub atoms: Vec<FormulaAtom>,
}

impl Material {
    /// 解析化学式
    ///
    /// 接受紧凑写法 `SiO2` 和空格/短横线分隔写法 `Si O2`、`Si1-O2`。
    pub fn from_formula(formula: &str) -> Result<Self> {
        let trimmed = formula.trim();
        if trimmed.is_empty() {
            return Err(TotscatError::MissingMaterial {
                workspace: "(empty formula)".to_string(),
            });
        }

        let mut atoms: Vec<FormulaAtom> = Vec::new();
        let mut cursor = 0;

        for caps in FORMULA_TOKEN.captures_iter(trimmed) {
            let whole = caps.get(0).expect("group 0 always present");

            // 记号之间只允许分隔符
            let gap = &trimmed[cursor..whole.start()];
            if !gap.chars().all(|c| c.is_whitespace() || c == '-') {
                return Err(TotscatError::ParseError {
                    format: "chemical formula".to_string(),
                    path: formula.to_string(),
                    reason: format!("unexpected '{}'", gap.trim()),
                });
            }
            cursor = whole.end();

            let symbol = caps[1].to_string();
            if scattering::get_neutron_data(&symbol).is_none() {
                return Err(TotscatError::UnknownElement(symbol));
            }
            let count = match caps.get(2) {
                Some(m) => m.as_str().parse::<f64>().map_err(|_| TotscatError::ParseError {
                    format: "chemical formula".to_string(),
                    path: formula.to_string(),
                    reason: format!("bad count '{}'", m.as_str()),
                })?,
                None => 1.0,
            };

            // 重复出现的元素合并
            match atoms.iter_mut().find(|a| a.symbol == symbol) {
                Some(existing) => existing.count += count,
                None => atoms.push(FormulaAtom { symbol, count }),
            }
        }

        let tail = &trimmed[cursor..];
        if atoms.is_empty() || !tail.chars().all(|c| c.is_whitespace() || c == '-') {
            return Err(TotscatError::ParseError {
                format: "chemical formula".to_string(),
                path: formula.to_string(),
                reason: "no element symbols recognized".to_string(),
            });
        }

        Ok(Self {
            formula: trimmed.to_string(),
            atoms,
        })
    }

    /// 材料名（即化学式）
    pub fn name(&self) -> &str {
        &self.formula
    }

    /// 每个化学式单元的原子总数
    pub fn atoms_per_formula_unit(&self) -> f64 {
        self.atoms.iter().map(|a| a.count).sum()
    }

    /// 相对分子质量 Σ nᵢ Mᵢ
    pub fn relative_molecular_mass(&self) -> f64 {
        self.weighted_sum(|d| d.mass)
    }

    /// 平均相干散射长度 <b>（fm）
    pub fn coh_scatter_length(&self) -> f64 {
        self.concentration_average(|d| d.coh_b)
    }

    /// <b²>（fm²）
    pub fn total_scatter_length_sqrd(&self) -> f64 {
        self.concentration_average(|d| d.tot_xs * 100.0 / (4.0 * PI))
    }

    /// 每原子平均总散射截面（barn）
    pub fn total_scatter_xsection(&self) -> f64 {
        self.concentration_average(|d| d.tot_xs)
    }

    /// 每原子平均吸收截面（barn）
    pub fn absorb_xsection(&self, wavelength: f64) -> f64 {
        self.concentration_average(|d| d.abs_xs_at(wavelength))
    }

    /// 每化学式单元的总散射截面（barn）
    pub fn formula_scatter_xsection(&self) -> f64 {
        self.weighted_sum(|d| d.tot_xs)
    }

    /// 每化学式单元的吸收截面（barn）
    pub fn formula_absorb_xsection(&self, wavelength: f64) -> f64 {
        self.weighted_sum(|d| d.abs_xs_at(wavelength))
    }

    /// Placzek 一阶自散射求和项 Σ cᵢ (σᵢ/4π)(m_n/Mᵢ)
    pub fn placzek_summation_term(&self) -> f64 {
        self.concentration_average(|d| d.tot_xs / (4.0 * PI) * NEUTRON_MASS_AMU / d.mass)
    }

    fn weighted_sum(&self, f: impl Fn(&NeutronData) -> f64) -> f64 {
        self.atoms
            .iter()
            .filter_map(|a| scattering::get_neutron_data(&a.symbol).map(|d| a.count * f(d)))
            .sum()
    }

    fn concentration_average(&self, f: impl Fn(&NeutronData) -> f64) -> f64 {
        let total = self.atoms_per_formula_unit();
        if total <= 0.0 {
            return 0.0;
        }
        self.weighted_sum(f) / total
    }
}

/// 挂在工作区上的样品信息（化学式、密度、填充率、几何）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMaterial {
    pub material: Material,
    /// 质量密度（g/cm³）
    pub mass_density: f64,
    pub packing_fraction: f64,
    pub geometry: Option<SampleGeometry>,
}

impl SampleMaterial {
    pub fn new(
        material: Material,
        mass_density: f64,
        packing_fraction: f64,
        geometry: Option<SampleGeometry>,
    ) -> Self {
        Self {
            material,
            mass_density,
            packing_fraction,
            geometry,
        }
    }

    /// 化学式单元数密度（1/cm³）
    pub fn number_density(&self) -> f64 {
        self.packing_fraction * self.mass_density / self.material.relative_molecular_mass()
            * AVOGADRO
    }

    /// 宏观散射截面 μ_s（1/cm）
    pub fn scattering_coefficient(&self) -> f64 {
        self.number_density() * self.material.formula_scatter_xsection() * 1e-24
    }

    /// 宏观吸收截面 μ_a(λ)（1/cm）
    pub fn absorption_coefficient(&self, wavelength: f64) -> f64 {
        self.number_density() * self.material.formula_absorb_xsection(wavelength) * 1e-24
    }

    /// 束流中的原子数
    pub fn number_atoms(&self) -> Result<f64> {
        let geometry = self.geometry.clone().unwrap_or_default();
        number_atoms(
            self.packing_fraction,
            self.mass_density,
            self.material.relative_molecular_mass(),
            &geometry,
        )
    }
}

/// 原子数 = 填充率 · 密度 / 摩尔质量 · N_A · 体积
pub fn number_atoms(
    packing_fraction: f64,
    mass_density: f64,
    molecular_mass: f64,
    geometry: &SampleGeometry,
) -> Result<f64> {
    let volume = geometry.volume()?;
    let number_density = packing_fraction * mass_density / molecular_mass * AVOGADRO;
    Ok(number_density * volume)
}
