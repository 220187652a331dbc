//! # 单位转换
//!
//! 在 TOF、波长、d 间距和 Q 之间转换工作区的自变量轴（弹性模式）。
//!
//! ## 公式
//! - λ = (h/mₙ) · t / (L1 + L2)
//! - d = λ / (2 sin θ)
//! - Q = 4π sin θ / λ
//!
//! 其中 θ 为散射角 2θ 的一半。Q 与 λ 成反比，转换后 bin 顺序反转。
//!
//! ## 强度语义
//! - 计数（非分布）数据：每个 bin 的计数原样映射
//! - 分布数据：按 y·w_old/w_new 重新归一化，保证 A→B→A 还原
//!
//! ## 依赖关系
//! - 被 `reduction/` 各阶段和 `inelastic/driver.rs` 调用
//! - 使用 `models/workspace.rs`

use crate::error::{Result, TotscatError};
use crate::models::{BankData, BankGeometry, Histogram, Unit, Workspace};

use std::f64::consts::PI;

/// h/mₙ，单位 Å·m/μs
pub const H_OVER_MN: f64 = 6.62607015e-34 / 1.67492749804e-27 * 1e4;

/// 单个 bank 的换算上下文
struct Converter {
    flight_path: f64,
    sin_theta: f64,
}

impl Converter {
    fn new(l1: f64, geometry: &BankGeometry) -> Self {
        Self {
            flight_path: l1 + geometry.l2,
            sin_theta: geometry.sin_theta(),
        }
    }

    fn to_wavelength(&self, x: f64, from: Unit) -> f64 {
        match from {
            Unit::TimeOfFlight => H_OVER_MN * x / self.flight_path,
            Unit::Wavelength => x,
            Unit::DSpacing => 2.0 * self.sin_theta * x,
            Unit::MomentumTransfer => 4.0 * PI * self.sin_theta / x,
        }
    }

    fn from_wavelength(&self, lambda: f64, to: Unit) -> f64 {
        match to {
            Unit::TimeOfFlight => lambda * self.flight_path / H_OVER_MN,
            Unit::Wavelength => lambda,
            Unit::DSpacing => lambda / (2.0 * self.sin_theta),
            Unit::MomentumTransfer => 4.0 * PI * self.sin_theta / lambda,
        }
    }

    fn convert(&self, x: f64, from: Unit, to: Unit) -> f64 {
        self.from_wavelength(self.to_wavelength(x, from), to)
    }
}

/// Q 与 λ/TOF/d 反向单调
fn reverses_order(from: Unit, to: Unit) -> bool {
    (from == Unit::MomentumTransfer) != (to == Unit::MomentumTransfer)
}

/// 转换工作区单位（原地修改）
pub fn convert_units(ws: &mut Workspace, target: Unit) -> Result<()> {
    let from = ws.unit;
    if from == target {
        return Ok(());
    }

    let needs_angle = matches!(from, Unit::DSpacing | Unit::MomentumTransfer)
        || matches!(target, Unit::DSpacing | Unit::MomentumTransfer);

    let l1 = ws.l1;
    let distribution = ws.distribution;
    let name = ws.name.clone();

    for (index, bank) in ws.banks.iter_mut().enumerate() {
        if needs_angle && bank.geometry.sin_theta() <= 0.0 {
            return Err(TotscatError::InvalidArgument(format!(
                "bank {} of '{}' has polar angle {}°, cannot convert {} -> {}",
                index, name, bank.geometry.polar, from, target
            )));
        }
        let converter = Converter::new(l1, &bank.geometry);

        match &mut bank.data {
            BankData::Histogram(h) => {
                *h = convert_histogram(h, &converter, from, target, distribution).map_err(
                    |reason| {
                        TotscatError::InvalidArgument(format!(
                            "bank {} of '{}': {}",
                            index, name, reason
                        ))
                    },
                )?;
            }
            BankData::Events(events) => {
                for ev in events.iter_mut() {
                    ev.x = converter.convert(ev.x, from, target);
                }
                events.retain(|ev| ev.x.is_finite());
            }
        }
    }

    ws.unit = target;
    Ok(())
}

fn convert_histogram(
    h: &Histogram,
    converter: &Converter,
    from: Unit,
    to: Unit,
    distribution: bool,
) -> std::result::Result<Histogram, String> {
    let old_widths = h.widths();

    let mut edges: Vec<f64> = h
        .edges
        .iter()
        .map(|&x| converter.convert(x, from, to))
        .collect();

    // 分布数据先还原为每 bin 计数
    let mut y: Vec<f64> = h.y.clone();
    let mut e: Vec<f64> = h.e.clone();
    if distribution {
        for i in 0..y.len() {
            y[i] *= old_widths[i];
            e[i] *= old_widths[i];
        }
    }

    if reverses_order(from, to) {
        edges.reverse();
        y.reverse();
        e.reverse();
    }

    // Q = 0 之类的边界会映射到无穷远，裁掉两端无效的 bin
    let first = edges.iter().position(|x| x.is_finite() && *x > 0.0);
    let last = edges.iter().rposition(|x| x.is_finite());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) if l > f => (f, l),
        _ => return Err(format!("no finite bins after {} -> {}", from, to)),
    };
    let edges = edges[first..=last].to_vec();
    let mut y = y[first..last].to_vec();
    let mut e = e[first..last].to_vec();

    if distribution {
        for (i, w) in edges.windows(2).map(|w| w[1] - w[0]).enumerate() {
            y[i] /= w;
            e[i] /= w;
        }
    }

    Histogram::new(edges, y, e).map_err(|err| err.to_string())
}

/// 设置分布状态：需要时在 计数 与 计数/bin 宽度 之间转换
///
/// 二元运算之前调用，确保两个操作数的强度语义一致。
pub fn set_distribution(ws: &mut Workspace, distribution: bool) -> Result<()> {
    if ws.distribution == distribution {
        return Ok(());
    }
    ws.require_histogram("ConvertToDistribution")?;

    for bank in &mut ws.banks {
        if let Some(h) = bank.as_histogram_mut() {
            let widths = h.widths();
            for (i, w) in widths.iter().enumerate() {
                if distribution {
                    h.y[i] /= w;
                    h.e[i] /= w;
                } else {
                    h.y[i] *= w;
                    h.e[i] *= w;
                }
            }
        }
    }

    ws.distribution = distribution;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bank, Event};

    const UNITS: [Unit; 4] = [
        Unit::TimeOfFlight,
        Unit::Wavelength,
        Unit::DSpacing,
        Unit::MomentumTransfer,
    ];

    fn tof_workspace(distribution: bool) -> Workspace {
        let edges: Vec<f64> = (0..=40).map(|i| 1000.0 + 250.0 * i as f64).collect();
        let y: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.3).sin() * 20.0).collect();
        let banks = [(2.0, 31.0), (1.5, 65.0), (2.3, 150.0)]
            .iter()
            .map(|&(l2, polar)| {
                Bank::histogram(
                    BankGeometry::new(l2, polar),
                    Histogram::from_counts(edges.clone(), y.clone()).unwrap(),
                )
            })
            .collect();
        let mut ws = Workspace::new("ws", Unit::TimeOfFlight, banks);
        if distribution {
            set_distribution(&mut ws, true).unwrap();
        }
        ws
    }

    fn assert_close(a: &Workspace, b: &Workspace) {
        for (ba, bb) in a.banks.iter().zip(&b.banks) {
            let (ha, hb) = (ba.as_histogram().unwrap(), bb.as_histogram().unwrap());
            assert_eq!(ha.len(), hb.len());
            for (x, y) in ha.edges.iter().zip(&hb.edges) {
                assert!((x - y).abs() <= 1e-6 * x.abs().max(1e-12), "{} vs {}", x, y);
            }
            for (x, y) in ha.y.iter().zip(&hb.y) {
                assert!((x - y).abs() <= 1e-6 * x.abs().max(1e-12), "{} vs {}", x, y);
            }
            for (x, y) in ha.e.iter().zip(&hb.e) {
                assert!((x - y).abs() <= 1e-6 * x.abs().max(1e-12), "{} vs {}", x, y);
            }
        }
    }

    #[test]
    fn test_round_trip_all_unit_pairs() {
        for distribution in [false, true] {
            let base = tof_workspace(distribution);
            for &u1 in &UNITS {
                let mut start = base.clone();
                convert_units(&mut start, u1).unwrap();
                for &u2 in &UNITS {
                    let mut ws = start.clone();
                    convert_units(&mut ws, u2).unwrap();
                    convert_units(&mut ws, u1).unwrap();
                    assert_eq!(ws.unit, u1);
                    assert_close(&ws, &start);
                }
            }
        }
    }

    #[test]
    fn test_known_values() {
        // 90° bank, L1 + L2 = 20 m, t = 10000 μs -> λ ≈ 1.978 Å
        let h = Histogram::from_counts(vec![10000.0, 10001.0], vec![1.0]).unwrap();
        let mut ws = Workspace::new(
            "ws",
            Unit::TimeOfFlight,
            vec![Bank::histogram(BankGeometry::new(0.5, 90.0), h)],
        );
        convert_units(&mut ws, Unit::Wavelength).unwrap();
        let lambda = ws.banks[0].as_histogram().unwrap().edges[0];
        assert!((lambda - 1.978017).abs() < 1e-4);

        convert_units(&mut ws, Unit::DSpacing).unwrap();
        let d = ws.banks[0].as_histogram().unwrap().edges[0];
        assert!((d - lambda / (2.0 * (PI / 4.0).sin())).abs() < 1e-9);

        convert_units(&mut ws, Unit::MomentumTransfer).unwrap();
        let h = ws.banks[0].as_histogram().unwrap();
        // Q = 2π/d，且顺序反转
        assert!((h.edges[1] - 2.0 * PI / d).abs() < 1e-9);
        assert!(h.edges[0] < h.edges[1]);
    }

    #[test]
    fn test_counts_are_preserved() {
        let mut ws = tof_workspace(false);
        let before = ws.total_intensity();
        convert_units(&mut ws, Unit::MomentumTransfer).unwrap();
        assert!((ws.total_intensity() - before).abs() < 1e-9 * before);

        let mut dist = tof_workspace(true);
        let before = dist.total_intensity();
        convert_units(&mut dist, Unit::DSpacing).unwrap();
        assert!((dist.total_intensity() - before).abs() < 1e-9 * before);
    }

    #[test]
    fn test_events_convert() {
        let mut ws = Workspace::new(
            "ev",
            Unit::TimeOfFlight,
            vec![Bank::events(
                BankGeometry::new(0.5, 90.0),
                vec![Event::new(10000.0, 1.0), Event::new(5000.0, 2.0)],
            )],
        );
        convert_units(&mut ws, Unit::Wavelength).unwrap();
        convert_units(&mut ws, Unit::TimeOfFlight).unwrap();
        match &ws.banks[0].data {
            BankData::Events(ev) => {
                assert!((ev[0].x - 10000.0).abs() < 1e-6);
                assert!((ev[1].x - 5000.0).abs() < 1e-6);
            }
            _ => panic!("expected events"),
        }
        assert!(set_distribution(&mut ws, true).is_err());
    }

    #[test]
    fn test_zero_q_edge_is_trimmed() {
        let h = Histogram::from_counts(vec![0.0, 1.0, 2.0, 3.0], vec![5.0, 6.0, 7.0]).unwrap();
        let mut ws = Workspace::new(
            "q",
            Unit::MomentumTransfer,
            vec![Bank::histogram(BankGeometry::new(2.0, 90.0), h)],
        );
        convert_units(&mut ws, Unit::Wavelength).unwrap();
        let h = ws.banks[0].as_histogram().unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.y, vec![7.0, 6.0]);
    }

    #[test]
    fn test_set_distribution_round_trip() {
        let mut ws = tof_workspace(false);
        let original = ws.clone();
        set_distribution(&mut ws, true).unwrap();
        assert!(ws.distribution);
        set_distribution(&mut ws, true).unwrap();
        set_distribution(&mut ws, false).unwrap();
        assert_close(&ws, &original);
    }
}
