//! # Butterworth 低通平滑
//!
//! 对每个谱做 FFT 滤波，传递函数 H(k) = 1 / (1 + (k/k_c)^(2·order))，
//! 其中 k_c = N / cutoff，N 为镜像延拓后的长度。镜像延拓避免两端的周期性跳变。
//! 平滑忽略 bin 宽度差异，只作用于 y。
//!
//! ## 依赖关系
//! - 被 `reduction/normalization.rs` 调用
//! - 使用 `rustfft` crate

use crate::error::{Result, TotscatError};
use crate::models::Workspace;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// 默认截止参数
pub const DEFAULT_CUTOFF: f64 = 20.0;
/// 默认阶数
pub const DEFAULT_ORDER: u32 = 2;

/// 对序列做 Butterworth 低通滤波
pub fn butterworth(y: &[f64], cutoff: f64, order: u32) -> Vec<f64> {
    let n = y.len();
    if n < 3 {
        return y.to_vec();
    }

    // 镜像延拓: y0..y(n-1), y(n-1)..y0
    let mut buffer: Vec<Complex<f64>> = y
        .iter()
        .chain(y.iter().rev())
        .map(|&v| Complex::new(v, 0.0))
        .collect();
    let len = buffer.len();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(len).process(&mut buffer);

    let k_c = len as f64 / cutoff;
    for (k, c) in buffer.iter_mut().enumerate() {
        let freq = k.min(len - k) as f64;
        *c *= 1.0 / (1.0 + (freq / k_c).powi(2 * order as i32));
    }

    planner.plan_fft_inverse(len).process(&mut buffer);
    buffer[..n].iter().map(|c| c.re / len as f64).collect()
}

/// 平滑工作区所有 bank（原地）
pub fn smooth_workspace(ws: &mut Workspace, cutoff: f64, order: u32) -> Result<()> {
    if !(cutoff > 0.0) || order == 0 {
        return Err(TotscatError::InvalidArgument(format!(
            "Butterworth parameters must be positive (got {},{})",
            cutoff, order
        )));
    }
    ws.require_histogram("FFTSmooth")?;
    for bank in &mut ws.banks {
        if let Some(h) = bank.as_histogram_mut() {
            h.y = butterworth(&h.y, cutoff, order);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bank, BankGeometry, Event, Histogram, Unit};

    #[test]
    fn test_constant_is_preserved() {
        let y = vec![5.0; 100];
        let smoothed = butterworth(&y, DEFAULT_CUTOFF, DEFAULT_ORDER);
        assert!(smoothed.iter().all(|v| (v - 5.0).abs() < 1e-9));
    }

    #[test]
    fn test_high_frequency_removed() {
        let y: Vec<f64> = (0..200)
            .map(|i| 10.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let smoothed = butterworth(&y, DEFAULT_CUTOFF, DEFAULT_ORDER);
        let max_dev = smoothed[40..160]
            .iter()
            .map(|v| (v - 10.0).abs())
            .fold(0.0, f64::max);
        assert!(max_dev < 0.05, "max deviation {}", max_dev);
    }

    #[test]
    fn test_event_data_rejected() {
        let mut ws = Workspace::new(
            "van",
            Unit::TimeOfFlight,
            vec![Bank::events(BankGeometry::new(2.0, 90.0), vec![Event::new(1.0, 1.0)])],
        );
        assert!(smooth_workspace(&mut ws, 20.0, 2).is_err());

        let h = Histogram::from_counts(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]).unwrap();
        let mut ws = Workspace::new(
            "van",
            Unit::TimeOfFlight,
            vec![Bank::histogram(BankGeometry::new(2.0, 90.0), h)],
        );
        assert!(smooth_workspace(&mut ws, 0.0, 2).is_err());
        assert!(smooth_workspace(&mut ws, 20.0, 2).is_ok());
    }
}
