//! # 钒 Bragg 峰剥除
//!
//! 钒为体心立方（a = 3.0274 Å），允许的反射满足 h² + k² + l² 为偶数。
//! 只剥除 d ≥ 0.5 Å 的反射（共 17 条），更短的反射在仪器分辨率下连成一片。
//! 对 bank d 范围内的每个峰:
//! - 峰窗口为 d ± 2%
//! - 在窗口两侧等宽的区域上用最小二乘拟合二次本底，落在其他峰窗口内的点不参与拟合
//! - 用拟合值替换窗口内的 y
//!
//! 事件数据先直方图化，这一步不可逆，之后只能做直方图运算。
//!
//! ## 依赖关系
//! - 被 `reduction/normalization.rs` 调用
//! - 使用 `reduction/rebin.rs`

use crate::error::Result;
use crate::models::{Histogram, Unit, Workspace};
use crate::reduction::rebin::{histogram_events, AUTO_HISTOGRAM_BINS};

/// 钒晶格常数（Å）
pub const VANADIUM_LATTICE: f64 = 3.0274;

/// 峰窗口相对半宽
pub const PEAK_HALF_WIDTH: f64 = 0.02;

/// 参与剥除的最短 d 间距（Å）
pub const MIN_PEAK_D: f64 = 0.5;

/// 每一侧拟合区域最少的点数
const MIN_FLANK_POINTS: usize = 3;

/// n 能否写成三个整数平方之和（n ≠ 4^a(8b+7)）
fn is_sum_of_three_squares(mut n: u64) -> bool {
    while n > 0 && n % 4 == 0 {
        n /= 4;
    }
    n % 8 != 7
}

/// 体心立方的 d 间距（降序），不小于 `d_min`
pub fn bcc_reflections(lattice: f64, d_min: f64) -> Vec<f64> {
    if !(d_min > 0.0) {
        return Vec::new();
    }
    let n_max = (lattice / d_min).powi(2).floor() as u64;
    (2..=n_max)
        .step_by(2)
        .filter(|&n| is_sum_of_three_squares(n))
        .map(|n| lattice / (n as f64).sqrt())
        .collect()
}

/// 剥除钒峰（原地）
pub fn strip_vanadium_peaks(ws: &mut Workspace) -> Result<()> {
    ws.require_unit("StripVanadiumPeaks", Unit::DSpacing)?;
    if ws.has_events() {
        histogram_events(ws, AUTO_HISTOGRAM_BINS)?;
    }

    let peaks = bcc_reflections(VANADIUM_LATTICE, MIN_PEAK_D);
    for bank in &mut ws.banks {
        if let Some(h) = bank.as_histogram_mut() {
            let d_min = h.edges[0];
            let d_max = h.edges[h.edges.len() - 1];
            for &d in &peaks {
                if d >= d_min && d < d_max {
                    strip_peak(h, d, &peaks);
                }
            }
        }
    }
    Ok(())
}

/// 用两侧二次本底替换单个峰窗口
fn strip_peak(h: &mut Histogram, center: f64, peaks: &[f64]) {
    let half = PEAK_HALF_WIDTH * center;
    let centers = h.centers();

    let in_window = |x: f64| (x - center).abs() <= half;
    let in_other_window = |x: f64| {
        peaks
            .iter()
            .any(|&p| p != center && (x - p).abs() <= PEAK_HALF_WIDTH * p)
    };
    let in_flank = |x: f64| {
        let dist = (x - center).abs();
        dist > half && dist <= 3.0 * half && !in_other_window(x)
    };

    let flank: Vec<(f64, f64)> = centers
        .iter()
        .zip(&h.y)
        .filter(|(x, y)| in_flank(**x) && y.is_finite())
        .map(|(x, y)| (x - center, *y))
        .collect();
    let below = flank.iter().filter(|(t, _)| *t < 0.0).count();
    if below < MIN_FLANK_POINTS || flank.len() - below < MIN_FLANK_POINTS {
        return;
    }
    let Some([c0, c1, c2]) = fit_quadratic(&flank) else {
        return;
    };

    for (i, &x) in centers.iter().enumerate() {
        if in_window(x) {
            let t = x - center;
            h.y[i] = c0 + c1 * t + c2 * t * t;
        }
    }
}

/// 最小二乘拟合 y = c0 + c1·x + c2·x²
pub fn fit_quadratic(points: &[(f64, f64)]) -> Option<[f64; 3]> {
    // 正规方程 M c = v，M[i][j] = Σ x^(i+j)
    let mut s = [0.0; 5];
    let mut v = [0.0; 3];
    for &(x, y) in points {
        let mut p = 1.0;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += p;
            if k < 3 {
                v[k] += p * y;
            }
            p *= x;
        }
    }
    let mut m = [
        [s[0], s[1], s[2], v[0]],
        [s[1], s[2], s[3], v[1]],
        [s[2], s[3], s[4], v[2]],
    ];

    // 带部分主元的高斯消元
    for col in 0..3 {
        let pivot = (col..3).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-300 {
            return None;
        }
        m.swap(col, pivot);
        for row in (col + 1)..3 {
            let f = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= f * m[col][k];
            }
        }
    }
    let mut c = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| m[row][k] * c[k]).sum();
        c[row] = (m[row][3] - tail) / m[row][row];
    }
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bank, BankGeometry};

    #[test]
    fn test_bcc_reflections() {
        let d = bcc_reflections(VANADIUM_LATTICE, 0.85);
        // (110), (200), (211), (220), (310), (222)
        assert_eq!(d.len(), 6);
        // N ≤ 30 的偶数中只有 28 不能写成三个平方数之和
        assert_eq!(bcc_reflections(VANADIUM_LATTICE, 0.55).len(), 14);
        assert!((d[0] - VANADIUM_LATTICE / 2.0_f64.sqrt()).abs() < 1e-12);
        assert!(d.windows(2).all(|w| w[0] > w[1]));

        let resolvable = bcc_reflections(VANADIUM_LATTICE, MIN_PEAK_D);
        assert_eq!(resolvable.len(), 17);
        assert!((resolvable[16] - VANADIUM_LATTICE / 6.0).abs() < 1e-12);
        assert!(bcc_reflections(VANADIUM_LATTICE, 0.0).is_empty());
    }

    #[test]
    fn test_strip_with_range_down_to_zero() {
        // 从 TOF≈0 转换来的 d 轴，起点远低于可分辨范围
        let d110 = VANADIUM_LATTICE / 2.0_f64.sqrt();
        let edges: Vec<f64> = (0..=200).map(|i| 2.6e-4 + 0.015 * i as f64).collect();
        let centers: Vec<f64> = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let background = |x: f64| 5.0 + x;
        let y: Vec<f64> = centers
            .iter()
            .map(|&x| background(x) + 50.0 * (-((x - d110) / 0.01).powi(2)).exp())
            .collect();

        let h = Histogram::from_counts(edges, y.clone()).unwrap();
        let mut ws = Workspace::new(
            "van",
            Unit::DSpacing,
            vec![Bank::histogram(BankGeometry::new(2.0, 150.0), h)],
        );
        strip_vanadium_peaks(&mut ws).unwrap();

        let h = ws.banks[0].as_histogram().unwrap();
        for (i, &x) in centers.iter().enumerate() {
            if x < 0.48 {
                assert_eq!(h.y[i], y[i]);
            }
        }
        let peak_bin = centers
            .iter()
            .position(|&x| (x - d110).abs() < 0.0075)
            .unwrap();
        assert!((h.y[peak_bin] - background(centers[peak_bin])).abs() < 1e-3);
    }

    #[test]
    fn test_fit_quadratic_exact() {
        let points: Vec<(f64, f64)> = (-5..=5)
            .map(|i| {
                let x = i as f64 * 0.1;
                (x, 2.0 - 3.0 * x + 0.5 * x * x)
            })
            .collect();
        let c = fit_quadratic(&points).unwrap();
        assert!((c[0] - 2.0).abs() < 1e-9);
        assert!((c[1] + 3.0).abs() < 1e-9);
        assert!((c[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_strip_removes_peak() {
        let d110 = VANADIUM_LATTICE / 2.0_f64.sqrt();
        let edges: Vec<f64> = (0..=400).map(|i| 1.8 + 0.001 * i as f64).collect();
        let centers: Vec<f64> = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let background = |x: f64| 10.0 + 2.0 * x;
        let y: Vec<f64> = centers
            .iter()
            .map(|&x| background(x) + 50.0 * (-((x - d110) / 0.005).powi(2)).exp())
            .collect();

        let h = Histogram::from_counts(edges, y).unwrap();
        let mut ws = Workspace::new(
            "van",
            Unit::DSpacing,
            vec![Bank::histogram(BankGeometry::new(2.0, 90.0), h)],
        );
        strip_vanadium_peaks(&mut ws).unwrap();

        let h = ws.banks[0].as_histogram().unwrap();
        let peak_bin = centers.iter().position(|&x| (x - d110).abs() < 0.0005).unwrap();
        assert!((h.y[peak_bin] - background(centers[peak_bin])).abs() < 0.5);
    }

    #[test]
    fn test_requires_d_spacing() {
        let h = Histogram::from_counts(vec![1.0, 2.0], vec![1.0]).unwrap();
        let mut ws = Workspace::new(
            "van",
            Unit::MomentumTransfer,
            vec![Bank::histogram(BankGeometry::new(2.0, 90.0), h)],
        );
        assert!(strip_vanadium_peaks(&mut ws).is_err());
    }
}
