//! # 一阶 Placzek 自散射
//!
//! 对每个 bank（L2、2θ）和每个波长:
//!
//! ```text
//! P(λ) = 2·((f − 1)·φ₁ − f·ε₁ + f − 3) · sin²θ · Σ cᵢ (σᵢ/4π)(mₙ/Mᵢ)
//! f  = L1 / (L1 + L2)
//! φ₁ = λ·φ'(λ) / φ(λ)
//! ε₁ = x·eˣ / (1 − eˣ),  x = −λ / 1.44
//! ```
//!
//! 输出为波长单位、非分布、误差为零的直方图工作区。
//!
//! ## 依赖关系
//! - 被 `inelastic/driver.rs` 调用
//! - 使用 `inelastic/spectrum.rs`、`neutron/material.rs`

use crate::error::{Result, TotscatError};
use crate::inelastic::FittedSpectrum;
use crate::models::{Bank, BankGeometry, Histogram, Unit, Workspace};
use crate::neutron::SampleMaterial;

/// 探测器效率参考波长（Å）
const DETECTOR_LAMBDA: f64 = 1.44;

/// 探测器效率项 ε₁
pub fn detector_epsilon(wavelength: f64) -> f64 {
    let x = -wavelength / DETECTOR_LAMBDA;
    x * x.exp() / (1.0 - x.exp())
}

/// 单个 bank、单个波长的 Placzek 项
pub fn placzek_term(
    l1: f64,
    geometry: &BankGeometry,
    wavelength: f64,
    flux: f64,
    derivative: f64,
    summation: f64,
) -> f64 {
    let f = l1 / (l1 + geometry.l2);
    let phi1 = if flux != 0.0 {
        wavelength * derivative / flux
    } else {
        0.0
    };
    let eps1 = detector_epsilon(wavelength);
    let sin_theta = geometry.sin_theta();
    2.0 * ((f - 1.0) * phi1 - f * eps1 + f - 3.0) * sin_theta * sin_theta * summation
}

/// 计算一阶 Placzek 自散射工作区
///
/// `geometry` 给出每个 bank 的 L2 和 2θ，bank 数必须与母工作区一致。
pub fn placzek_self_scattering(
    spectrum: &FittedSpectrum,
    parent: &Workspace,
    material: &SampleMaterial,
    geometry: &[BankGeometry],
    l1: f64,
    out_name: &str,
) -> Result<Workspace> {
    if geometry.len() != parent.number_of_banks() {
        return Err(TotscatError::config(
            "AlignAndFocusArgs.L2/Polar",
            format!(
                "{} bank geometries given, '{}' has {} banks",
                geometry.len(),
                parent.name,
                parent.number_of_banks()
            ),
        ));
    }
    let summation = material.material.placzek_summation_term();

    let banks = geometry
        .iter()
        .map(|g| {
            let y: Vec<f64> = spectrum
                .wavelength
                .iter()
                .zip(spectrum.flux.iter().zip(&spectrum.derivative))
                .map(|(&lambda, (&flux, &derivative))| {
                    placzek_term(l1, g, lambda, flux, derivative, summation)
                })
                .collect();
            let e = vec![0.0; y.len()];
            Histogram::new(spectrum.edges.clone(), y, e).map(|h| Bank::histogram(*g, h))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Workspace::new(out_name, Unit::Wavelength, banks)
        .with_l1(l1)
        .with_sample(material.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_L1;
    use crate::neutron::Material;

    fn vanadium() -> SampleMaterial {
        SampleMaterial::new(Material::from_formula("V").unwrap(), 6.11, 1.0, None)
    }

    #[test]
    fn test_epsilon_limits() {
        // x → 0 时 x·eˣ/(1−eˣ) → −1
        assert!((detector_epsilon(1e-8) + 1.0).abs() < 1e-6);
        assert!(detector_epsilon(1.44) > -1.0);
    }

    #[test]
    fn test_flat_spectrum_value() {
        // φ' = 0 时 P = 2(−f·ε₁ + f − 3)·sin²θ·S
        let g = BankGeometry::new(2.0, 90.0);
        let s = vanadium().material.placzek_summation_term();
        let p = placzek_term(DEFAULT_L1, &g, 1.0, 10.0, 0.0, s);
        let f = DEFAULT_L1 / (DEFAULT_L1 + 2.0);
        let expected = 2.0 * (-f * detector_epsilon(1.0) + f - 3.0) * 0.5 * s;
        assert!((p - expected).abs() < 1e-15);
        assert!(p < 0.0);
    }

    #[test]
    fn test_workspace_shape() {
        let spectrum = FittedSpectrum {
            edges: vec![0.5, 1.0, 1.5],
            wavelength: vec![0.75, 1.25],
            flux: vec![2.0, 1.0],
            derivative: vec![-2.0, -1.0],
        };
        let h = Histogram::from_counts(vec![0.5, 1.0], vec![1.0]).unwrap();
        let geometry = [BankGeometry::new(2.0, 31.0), BankGeometry::new(1.5, 150.0)];
        let parent = Workspace::new(
            "van",
            Unit::MomentumTransfer,
            geometry.iter().map(|g| Bank::histogram(*g, h.clone())).collect(),
        );

        let out =
            placzek_self_scattering(&spectrum, &parent, &vanadium(), &geometry, DEFAULT_L1, "van_placzek")
                .unwrap();
        assert_eq!(out.unit, Unit::Wavelength);
        assert!(!out.distribution);
        assert_eq!(out.number_of_banks(), 2);
        assert!(out.sample_material().is_ok());
        // 高角 bank 的 sin²θ 更大
        let low = out.banks[0].as_histogram().unwrap().y[0].abs();
        let high = out.banks[1].as_histogram().unwrap().y[0].abs();
        assert!(high > low);

        assert!(placzek_self_scattering(
            &spectrum,
            &parent,
            &vanadium(),
            &geometry[..1],
            DEFAULT_L1,
            "x"
        )
        .is_err());
    }
}
