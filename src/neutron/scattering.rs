//! # 中子散射长度数据库
//!
//! 提供元素的相干散射长度、总散射截面、吸收截面和原子质量。
//!
//! ## 单位
//! - 散射长度 b: fm
//! - 截面 σ: barn（吸收截面对应 2200 m/s，即 λ = 1.7982 Å）
//! - 质量: g/mol
//!
//! ## 数据来源
//! V. F. Sears, Neutron scattering lengths and cross sections,
//! Neutron News 3 (1992) 26-37
//!
//! ## 依赖关系
//! - 被 `neutron/material.rs` 调用计算材料常数
//! - 纯静态数据，无外部依赖

use std::collections::HashMap;
use std::sync::LazyLock;

/// 吸收截面的参考波长（Å）
pub const REFERENCE_WAVELENGTH: f64 = 1.7982;

/// 单个元素的中子数据
#[derive(Debug, Clone, Copy)]
pub struct NeutronData {
    /// 相干散射长度（fm）
    pub coh_b: f64,
    /// 总散射截面（barn）
    pub tot_xs: f64,
    /// 吸收截面（barn，2200 m/s）
    pub abs_xs: f64,
    /// 原子质量（g/mol）
    pub mass: f64,
}

impl NeutronData {
    const fn new(coh_b: f64, tot_xs: f64, abs_xs: f64, mass: f64) -> Self {
        Self {
            coh_b,
            tot_xs,
            abs_xs,
            mass,
        }
    }

    /// 指定波长下的吸收截面（1/v 定律）
    pub fn abs_xs_at(&self, wavelength: f64) -> f64 {
        self.abs_xs * wavelength / REFERENCE_WAVELENGTH
    }
}

/// 中子数据库
pub static NEUTRON_DATA: LazyLock<HashMap<&'static str, NeutronData>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // 轻元素
    m.insert("H", NeutronData::new(-3.7390, 82.02, 0.3326, 1.00794));
    m.insert("D", NeutronData::new(6.671, 7.64, 0.000519, 2.01410));
    m.insert("Li", NeutronData::new(-1.90, 1.37, 70.5, 6.941));
    m.insert("Be", NeutronData::new(7.79, 7.63, 0.0076, 9.01218));
    m.insert("B", NeutronData::new(5.30, 5.24, 767.0, 10.811));
    m.insert("C", NeutronData::new(6.6460, 5.551, 0.00350, 12.0107));
    m.insert("N", NeutronData::new(9.36, 11.51, 1.90, 14.0067));
    m.insert("O", NeutronData::new(5.803, 4.232, 0.00019, 15.9994));
    m.insert("F", NeutronData::new(5.654, 4.018, 0.0096, 18.9984));

    // 第三周期
    m.insert("Na", NeutronData::new(3.63, 3.28, 0.530, 22.98977));
    m.insert("Mg", NeutronData::new(5.375, 3.71, 0.063, 24.305));
    m.insert("Al", NeutronData::new(3.449, 1.503, 0.231, 26.98154));
    m.insert("Si", NeutronData::new(4.1491, 2.167, 0.171, 28.0855));
    m.insert("P", NeutronData::new(5.13, 3.312, 0.172, 30.97376));
    m.insert("S", NeutronData::new(2.847, 1.026, 0.53, 32.065));
    m.insert("Cl", NeutronData::new(9.5770, 16.8, 33.5, 35.453));

    // 第四周期
    m.insert("K", NeutronData::new(3.67, 1.96, 2.1, 39.0983));
    m.insert("Ca", NeutronData::new(4.70, 2.83, 0.43, 40.078));
    m.insert("Sc", NeutronData::new(12.29, 23.5, 27.5, 44.95591));
    m.insert("Ti", NeutronData::new(-3.438, 4.35, 6.09, 47.867));
    m.insert("V", NeutronData::new(-0.3824, 5.10, 5.08, 50.9415));
    m.insert("Cr", NeutronData::new(3.635, 3.49, 3.05, 51.9961));
    m.insert("Mn", NeutronData::new(-3.73, 2.15, 13.3, 54.93805));
    m.insert("Fe", NeutronData::new(9.45, 11.62, 2.56, 55.845));
    m.insert("Co", NeutronData::new(2.49, 5.6, 37.18, 58.93320));
    m.insert("Ni", NeutronData::new(10.3, 18.5, 4.49, 58.6934));
    m.insert("Cu", NeutronData::new(7.718, 8.03, 3.78, 63.546));
    m.insert("Zn", NeutronData::new(5.680, 4.131, 1.11, 65.38));
    m.insert("Ga", NeutronData::new(7.288, 6.83, 2.75, 69.723));
    m.insert("Ge", NeutronData::new(8.185, 8.60, 2.2, 72.63));
    m.insert("Se", NeutronData::new(7.970, 8.30, 11.7, 78.96));

    // 第五周期及更重
    m.insert("Sr", NeutronData::new(7.02, 6.25, 1.28, 87.62));
    m.insert("Y", NeutronData::new(7.75, 7.70, 1.28, 88.90585));
    m.insert("Zr", NeutronData::new(7.16, 6.46, 0.185, 91.224));
    m.insert("Nb", NeutronData::new(7.054, 6.255, 1.15, 92.90638));
    m.insert("Mo", NeutronData::new(6.715, 5.71, 2.48, 95.96));
    m.insert("Ag", NeutronData::new(5.922, 4.99, 63.3, 107.8682));
    m.insert("Sn", NeutronData::new(6.225, 4.892, 0.626, 118.710));
    m.insert("Te", NeutronData::new(5.80, 4.32, 4.7, 127.60));
    m.insert("Ba", NeutronData::new(5.07, 3.38, 1.1, 137.327));
    m.insert("La", NeutronData::new(8.24, 9.66, 8.97, 138.90547));
    m.insert("Ce", NeutronData::new(4.84, 2.94, 0.63, 140.116));
    m.insert("Hf", NeutronData::new(7.7, 10.2, 104.1, 178.49));
    m.insert("Ta", NeutronData::new(6.91, 6.01, 20.6, 180.94788));
    m.insert("W", NeutronData::new(4.86, 4.60, 18.3, 183.84));
    m.insert("Pt", NeutronData::new(9.60, 11.71, 10.3, 195.084));
    m.insert("Au", NeutronData::new(7.63, 7.75, 98.65, 196.96657));
    m.insert("Pb", NeutronData::new(9.405, 11.118, 0.171, 207.2));
    m.insert("Bi", NeutronData::new(8.532, 9.156, 0.0338, 208.98040));

    m
});

/// 获取元素的中子数据
pub fn get_neutron_data(element: &str) -> Option<&'static NeutronData> {
    NEUTRON_DATA.get(element)
}
