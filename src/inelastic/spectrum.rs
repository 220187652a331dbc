//! # 入射谱拟合
//!
//! 从束流监视器数据得到入射中子通量 φ(λ) 及其导数 φ'(λ):
//! 1. 按拟合分箱（LambdaBinningForFit）对监视器点取平均，得到样条节点
//! 2. `GaussConvCubicSpline` 先对节点做高斯平滑（σ = 2 个 bin）
//! 3. Fritsch–Carlson 单调三次 Hermite 样条插值
//! 4. 在计算分箱（LambdaBinningForCalc）的 bin 中心求值
//!
//! ## 依赖关系
//! - 被 `inelastic/driver.rs` 调用
//! - 使用 `models/binning.rs`

use crate::error::{Result, TotscatError};
use crate::inelastic::FitFamily;
use crate::models::Binning;

/// 高斯平滑宽度（以拟合 bin 计）
const GAUSS_SIGMA_BINS: f64 = 2.0;

/// 监视器测得的入射谱（点数据）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorSpectrum {
    /// 波长（Å）
    pub wavelength: Vec<f64>,
    pub counts: Vec<f64>,
}

/// 拟合后的入射谱，在计算分箱上求值
#[derive(Debug, Clone, PartialEq)]
pub struct FittedSpectrum {
    /// 计算分箱的边界
    pub edges: Vec<f64>,
    /// bin 中心处的波长
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
    /// dφ/dλ
    pub derivative: Vec<f64>,
}

/// 单调三次 Hermite 样条
#[derive(Debug, Clone)]
pub struct MonotoneSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Vec<f64>,
}

impl MonotoneSpline {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() < 2 || x.len() != y.len() {
            return Err(TotscatError::InvalidArgument(format!(
                "spline needs at least 2 knots with matching values (got {} x, {} y)",
                x.len(),
                y.len()
            )));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(TotscatError::InvalidArgument(
                "spline knots must be strictly increasing".to_string(),
            ));
        }
        let slopes = fritsch_carlson_slopes(&x, &y);
        Ok(Self { x, y, slopes })
    }

    fn segment(&self, x: f64) -> (usize, f64, f64) {
        let k = self.x.len();
        let i = (self.x.partition_point(|&v| v <= x).max(1) - 1).min(k - 2);
        let h = self.x[i + 1] - self.x[i];
        (i, h, (x - self.x[i]) / h)
    }

    /// 样条值，区间外取端点值
    pub fn value(&self, x: f64) -> f64 {
        let k = self.x.len();
        if x <= self.x[0] {
            return self.y[0];
        }
        if x >= self.x[k - 1] {
            return self.y[k - 1];
        }
        let (i, h, t) = self.segment(x);
        let h00 = (1.0 + 2.0 * t) * (1.0 - t) * (1.0 - t);
        let h10 = t * (1.0 - t) * (1.0 - t);
        let h01 = t * t * (3.0 - 2.0 * t);
        let h11 = t * t * (t - 1.0);
        h00 * self.y[i] + h10 * h * self.slopes[i] + h01 * self.y[i + 1] + h11 * h * self.slopes[i + 1]
    }

    /// 一阶导数，区间外为 0
    pub fn derivative(&self, x: f64) -> f64 {
        let k = self.x.len();
        if x < self.x[0] || x > self.x[k - 1] {
            return 0.0;
        }
        let (i, h, t) = self.segment(x);
        let d00 = 6.0 * t * t - 6.0 * t;
        let d10 = 3.0 * t * t - 4.0 * t + 1.0;
        let d01 = -6.0 * t * t + 6.0 * t;
        let d11 = 3.0 * t * t - 2.0 * t;
        (d00 * self.y[i] + d01 * self.y[i + 1]) / h + d10 * self.slopes[i] + d11 * self.slopes[i + 1]
    }
}

fn fritsch_carlson_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let k = x.len();
    let delta: Vec<f64> = (0..k - 1)
        .map(|i| (y[i + 1] - y[i]) / (x[i + 1] - x[i]))
        .collect();

    let mut m = vec![0.0; k];
    m[0] = delta[0];
    for i in 1..k - 1 {
        m[i] = if delta[i - 1].signum() != delta[i].signum() {
            0.0
        } else {
            0.5 * (delta[i - 1] + delta[i])
        };
    }
    m[k - 1] = delta[k - 2];

    for i in 0..k - 1 {
        if delta[i].abs() < 1e-30 {
            m[i] = 0.0;
            m[i + 1] = 0.0;
        } else {
            let alpha = m[i] / delta[i];
            let beta = m[i + 1] / delta[i];
            let phi = alpha * alpha + beta * beta;
            if phi > 9.0 {
                let tau = 3.0 / phi.sqrt();
                m[i] = tau * alpha * delta[i];
                m[i + 1] = tau * beta * delta[i];
            }
        }
    }
    m
}

/// 截断高斯核平滑（±3σ，边界处重新归一化）
fn gaussian_smooth(y: &[f64], sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil() as isize;
    let n = y.len() as isize;
    (0..n)
        .map(|i| {
            let (mut sum, mut weight) = (0.0, 0.0);
            for j in (i - radius).max(0)..=(i + radius).min(n - 1) {
                let d = (j - i) as f64 / sigma;
                let w = (-0.5 * d * d).exp();
                sum += w * y[j as usize];
                weight += w;
            }
            sum / weight
        })
        .collect()
}

/// 拟合入射谱并在计算分箱上求值
pub fn fit_incident_spectrum(
    monitor: &MonitorSpectrum,
    family: FitFamily,
    fit_binning: &Binning,
    calc_binning: &Binning,
) -> Result<FittedSpectrum> {
    let fit_edges = fit_binning.edges();
    let n = fit_edges.len() - 1;
    let mut sums = vec![0.0; n];
    let mut counts = vec![0usize; n];
    for (&lambda, &c) in monitor.wavelength.iter().zip(&monitor.counts) {
        if lambda < fit_edges[0] || lambda >= fit_edges[n] || !c.is_finite() {
            continue;
        }
        let bin = fit_edges.partition_point(|&x| x <= lambda) - 1;
        sums[bin] += c;
        counts[bin] += 1;
    }

    let (knots_x, mut knots_y): (Vec<f64>, Vec<f64>) = (0..n)
        .filter(|&i| counts[i] > 0)
        .map(|i| (0.5 * (fit_edges[i] + fit_edges[i + 1]), sums[i] / counts[i] as f64))
        .unzip();
    if knots_x.len() < 2 {
        return Err(TotscatError::InvalidArgument(format!(
            "incident spectrum has {} populated bins in {}, need at least 2",
            knots_x.len(),
            fit_binning
        )));
    }

    if family == FitFamily::GaussConvCubicSpline {
        knots_y = gaussian_smooth(&knots_y, GAUSS_SIGMA_BINS);
    }
    let spline = MonotoneSpline::new(knots_x, knots_y)?;

    let edges = calc_binning.edges();
    let wavelength: Vec<f64> = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
    let flux = wavelength.iter().map(|&x| spline.value(x)).collect();
    let derivative = wavelength.iter().map(|&x| spline.derivative(x)).collect();

    Ok(FittedSpectrum {
        edges,
        wavelength,
        flux,
        derivative,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spline_interpolates_knots_and_slopes() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let spline = MonotoneSpline::new(x, y).unwrap();
        assert!((spline.value(1.5) - 4.0).abs() < 1e-12);
        assert!((spline.derivative(1.5) - 2.0).abs() < 1e-12);
        assert_eq!(spline.value(-1.0), 1.0);
        assert_eq!(spline.derivative(10.0), 0.0);
    }

    #[test]
    fn test_spline_is_monotone() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![0.0, 0.1, 5.0, 5.1, 10.0];
        let spline = MonotoneSpline::new(x, y).unwrap();
        let samples: Vec<f64> = (0..=400).map(|i| spline.value(i as f64 * 0.01)).collect();
        assert!(samples.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }

    #[test]
    fn test_fit_maxwellian_like_spectrum() {
        let wavelength: Vec<f64> = (0..600).map(|i| 0.1 + 0.005 * i as f64).collect();
        let counts: Vec<f64> = wavelength.iter().map(|l| 1000.0 * (-l).exp()).collect();
        let monitor = MonitorSpectrum { wavelength, counts };
        let fit: Binning = "0.2,0.05,2.8".parse().unwrap();
        let calc: Binning = "0.8,0.1,2.2".parse().unwrap();

        for family in [FitFamily::CubicSpline, FitFamily::GaussConvCubicSpline] {
            let spectrum = fit_incident_spectrum(&monitor, family, &fit, &calc).unwrap();
            assert_eq!(spectrum.flux.len(), spectrum.edges.len() - 1);
            for (i, &l) in spectrum.wavelength.iter().enumerate() {
                let exact = 1000.0 * (-l).exp();
                assert!((spectrum.flux[i] - exact).abs() / exact < 0.02);
                assert!(spectrum.derivative[i] < 0.0);
            }
        }
    }

    #[test]
    fn test_empty_monitor() {
        let fit: Binning = "0.2,0.05,2.8".parse().unwrap();
        let result = fit_incident_spectrum(
            &MonitorSpectrum::default(),
            FitFamily::CubicSpline,
            &fit,
            &fit,
        );
        assert!(result.is_err());
    }
}
