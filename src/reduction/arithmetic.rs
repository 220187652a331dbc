//! # 工作区二元运算
//!
//! `minus`、`divide`、`plus` 和标量 `scale`。
//!
//! 两个操作数必须满足:
//! - 相同的单位与分布状态（否则 InvalidUnitState）
//! - 相同的 bank 数和 bin 边界（否则 BinMismatch）
//!
//! bin 边界容差: 每个边界绝对误差 ≤ 1e-4，且边界之和的相对误差 ≤ 1e-7。
//! 误差按平方和传播；除数为零的 bin 结果为 0 ± 0。
//!
//! ## 依赖关系
//! - 被 `reduction/`、`inelastic/driver.rs`、`io/loader.rs` 调用
//! - 使用 `reduction/rebin.rs` 把事件填到对方的 bin 上

use crate::error::{Result, TotscatError};
use crate::models::{Bank, BankData, Event, Histogram, Workspace};
use crate::reduction::rebin::histogram_event_list;

/// 单个边界的绝对容差
pub const EDGE_TOLERANCE: f64 = 1e-4;

/// 边界之和的相对容差
pub const EDGE_SUM_TOLERANCE: f64 = 1e-7;

fn mismatch(lhs: &Workspace, rhs: &Workspace, reason: String) -> TotscatError {
    TotscatError::BinMismatch {
        lhs: lhs.name.clone(),
        rhs: rhs.name.clone(),
        reason,
    }
}

/// 检查单位和分布状态一致
fn check_state(operation: &str, lhs: &Workspace, rhs: &Workspace) -> Result<()> {
    if lhs.unit != rhs.unit {
        return Err(TotscatError::InvalidUnitState {
            operation: operation.to_string(),
            workspace: rhs.name.clone(),
            expected: lhs.unit.to_string(),
            actual: rhs.unit.to_string(),
        });
    }
    if lhs.distribution != rhs.distribution {
        let state = |d: bool| (if d { "distribution" } else { "counts" }).to_string();
        return Err(TotscatError::InvalidUnitState {
            operation: operation.to_string(),
            workspace: rhs.name.clone(),
            expected: state(lhs.distribution),
            actual: state(rhs.distribution),
        });
    }
    if lhs.number_of_banks() != rhs.number_of_banks() {
        return Err(mismatch(
            lhs,
            rhs,
            format!(
                "bank count {} vs {}",
                lhs.number_of_banks(),
                rhs.number_of_banks()
            ),
        ));
    }
    Ok(())
}

/// 比较两组 bin 边界
fn edges_match(a: &[f64], b: &[f64]) -> std::result::Result<(), String> {
    if a.len() != b.len() {
        return Err(format!("{} edges vs {}", a.len(), b.len()));
    }
    if let Some(i) = a
        .iter()
        .zip(b)
        .position(|(x, y)| (x - y).abs() > EDGE_TOLERANCE)
    {
        return Err(format!("edge {} differs: {} vs {}", i, a[i], b[i]));
    }
    let (sa, sb) = (a.iter().sum::<f64>(), b.iter().sum::<f64>());
    if (sa - sb).abs() > EDGE_SUM_TOLERANCE * sa.abs().max(sb.abs()) {
        return Err(format!("edge sums differ: {} vs {}", sa, sb));
    }
    Ok(())
}

/// 检查两个工作区能否逐 bin 运算
pub fn check_bins(lhs: &Workspace, rhs: &Workspace) -> Result<()> {
    if lhs.number_of_banks() != rhs.number_of_banks() {
        return Err(mismatch(
            lhs,
            rhs,
            format!(
                "bank count {} vs {}",
                lhs.number_of_banks(),
                rhs.number_of_banks()
            ),
        ));
    }
    for (index, (a, b)) in lhs.banks.iter().zip(&rhs.banks).enumerate() {
        if let (Some(ha), Some(hb)) = (a.as_histogram(), b.as_histogram()) {
            edges_match(&ha.edges, &hb.edges)
                .map_err(|reason| mismatch(lhs, rhs, format!("bank {}: {}", index, reason)))?;
        }
    }
    Ok(())
}

/// 逐 bin 组合两个直方图
fn combine(
    a: &Histogram,
    b: &Histogram,
    op: impl Fn(f64, f64, f64, f64) -> (f64, f64),
) -> Histogram {
    let (y, e) = (0..a.len())
        .map(|i| op(a.y[i], a.e[i], b.y[i], b.e[i]))
        .unzip();
    Histogram {
        edges: a.edges.clone(),
        y,
        e,
    }
}

fn subtract(ya: f64, ea: f64, yb: f64, eb: f64) -> (f64, f64) {
    (ya - yb, ea.hypot(eb))
}

fn add(ya: f64, ea: f64, yb: f64, eb: f64) -> (f64, f64) {
    (ya + yb, ea.hypot(eb))
}

fn quotient(ya: f64, ea: f64, yb: f64, eb: f64) -> (f64, f64) {
    if yb == 0.0 {
        return (0.0, 0.0);
    }
    let y = ya / yb;
    let e = (ea / yb).hypot(ya * eb / (yb * yb));
    (y, e)
}

/// 事件对直方图运算时，把事件填到直方图的 bin 上
fn as_histogram_like(bank: &Bank, other: &Histogram) -> Histogram {
    match &bank.data {
        BankData::Histogram(h) => h.clone(),
        BankData::Events(events) => histogram_event_list(events, &other.edges),
    }
}

/// lhs + rhs（或 lhs - rhs），事件对事件时直接拼接事件
fn additive(
    operation: &str,
    lhs: &Workspace,
    rhs: &Workspace,
    out_name: &str,
    sign: f64,
) -> Result<Workspace> {
    check_state(operation, lhs, rhs)?;
    check_bins(lhs, rhs)?;

    let mut out = lhs.renamed(out_name);
    for (index, (bank, other)) in out.banks.iter_mut().zip(&rhs.banks).enumerate() {
        let data = match (&bank.data, &other.data) {
            (BankData::Events(a), BankData::Events(b)) => {
                let mut events = a.clone();
                events.extend(b.iter().map(|ev| Event {
                    weight: sign * ev.weight,
                    ..*ev
                }));
                BankData::Events(events)
            }
            (BankData::Histogram(a), _) => {
                let b = as_histogram_like(other, a);
                BankData::Histogram(if sign < 0.0 {
                    combine(a, &b, subtract)
                } else {
                    combine(a, &b, add)
                })
            }
            (BankData::Events(_), BankData::Histogram(b)) => {
                let a = as_histogram_like(bank, b);
                edges_match(&a.edges, &b.edges).map_err(|reason| {
                    mismatch(lhs, rhs, format!("bank {}: {}", index, reason))
                })?;
                BankData::Histogram(if sign < 0.0 {
                    combine(&a, b, subtract)
                } else {
                    combine(&a, b, add)
                })
            }
        };
        bank.data = data;
    }
    Ok(out)
}

/// out = lhs - rhs
pub fn minus(lhs: &Workspace, rhs: &Workspace, out_name: &str) -> Result<Workspace> {
    additive("Minus", lhs, rhs, out_name, -1.0)
}

/// out = lhs + rhs（多个 scan 求和用）
pub fn plus(lhs: &Workspace, rhs: &Workspace, out_name: &str) -> Result<Workspace> {
    additive("Plus", lhs, rhs, out_name, 1.0)
}

/// out = lhs / rhs
///
/// rhs 必须是直方图。lhs 为事件时，每个事件的权重除以其所在 bin 的值，
/// 落在 rhs 范围外或除数为零的事件被丢弃。
pub fn divide(lhs: &Workspace, rhs: &Workspace, out_name: &str) -> Result<Workspace> {
    check_state("Divide", lhs, rhs)?;
    rhs.require_histogram("Divide (denominator)")?;
    check_bins(lhs, rhs)?;

    let mut out = lhs.renamed(out_name);
    for (bank, other) in out.banks.iter_mut().zip(&rhs.banks) {
        let Some(b) = other.as_histogram() else {
            continue;
        };
        let data = match &bank.data {
            BankData::Histogram(a) => BankData::Histogram(combine(a, b, quotient)),
            BankData::Events(events) => BankData::Events(divide_events(events, b)),
        };
        bank.data = data;
    }
    Ok(out)
}

fn divide_events(events: &[Event], denominator: &Histogram) -> Vec<Event> {
    let edges = &denominator.edges;
    let last = edges.len() - 1;
    events
        .iter()
        .filter(|ev| ev.x >= edges[0] && ev.x < edges[last])
        .filter_map(|ev| {
            let bin = edges.partition_point(|&x| x <= ev.x) - 1;
            let (yb, eb) = (denominator.y[bin], denominator.e[bin]);
            if yb == 0.0 {
                return None;
            }
            let (weight, error) = quotient(ev.weight, ev.error_sq.sqrt(), yb, eb);
            Some(Event {
                x: ev.x,
                weight,
                error_sq: error * error,
            })
        })
        .collect()
}

/// 原地乘以常数（误差同比缩放）
pub fn scale(ws: &mut Workspace, factor: f64) {
    for bank in &mut ws.banks {
        match &mut bank.data {
            BankData::Histogram(h) => {
                h.y.iter_mut().for_each(|y| *y *= factor);
                h.e.iter_mut().for_each(|e| *e *= factor.abs());
            }
            BankData::Events(events) => {
                for ev in events.iter_mut() {
                    ev.weight *= factor;
                    ev.error_sq *= factor * factor;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BankGeometry, Unit};

    fn workspace(name: &str, edges: Vec<f64>, y: Vec<f64>) -> Workspace {
        let h = Histogram::from_counts(edges, y).unwrap();
        Workspace::new(
            name,
            Unit::MomentumTransfer,
            vec![Bank::histogram(BankGeometry::new(2.0, 90.0), h)],
        )
    }

    #[test]
    fn test_minus_propagates_errors() {
        let a = workspace("a", vec![0.0, 1.0, 2.0], vec![16.0, 9.0]);
        let b = workspace("b", vec![0.0, 1.0, 2.0], vec![9.0, 16.0]);
        let out = minus(&a, &b, "a_minus_b").unwrap();
        let h = out.banks[0].as_histogram().unwrap();
        assert_eq!(out.name, "a_minus_b");
        assert_eq!(h.y, vec![7.0, -7.0]);
        assert!((h.e[0] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_divide_by_zero_bin() {
        let a = workspace("a", vec![0.0, 1.0, 2.0], vec![4.0, 4.0]);
        let b = workspace("b", vec![0.0, 1.0, 2.0], vec![2.0, 0.0]);
        let out = divide(&a, &b, "ratio").unwrap();
        let h = out.banks[0].as_histogram().unwrap();
        assert_eq!(h.y, vec![2.0, 0.0]);
        assert_eq!(h.e[1], 0.0);
        // (2/2)² + (4·√2/4)² = 1 + 2
        assert!((h.e[0] - 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_bins_always_fail() {
        let a = workspace("a", vec![0.0, 1.0, 2.0], vec![1.0, 1.0]);
        let shifted = workspace("b", vec![0.0, 1.001, 2.0], vec![1.0, 1.0]);
        let shorter = workspace("c", vec![0.0, 1.0], vec![1.0]);

        for rhs in [&shifted, &shorter] {
            assert!(matches!(minus(&a, rhs, "x"), Err(TotscatError::BinMismatch { .. })));
            assert!(matches!(divide(&a, rhs, "x"), Err(TotscatError::BinMismatch { .. })));
        }

        let mut two_banks = a.clone();
        two_banks.banks.push(a.banks[0].clone());
        assert!(matches!(minus(&a, &two_banks, "x"), Err(TotscatError::BinMismatch { .. })));
    }

    #[test]
    fn test_within_tolerance_is_accepted() {
        let a = workspace("a", vec![0.0, 1.0, 2.0], vec![1.0, 1.0]);
        let b = workspace("b", vec![0.0, 1.0 + 1e-9, 2.0], vec![1.0, 1.0]);
        assert!(minus(&a, &b, "x").is_ok());
    }

    #[test]
    fn test_unit_state_mismatch() {
        let a = workspace("a", vec![0.0, 1.0, 2.0], vec![1.0, 1.0]);
        let mut b = a.renamed("b");
        b.unit = Unit::Wavelength;
        assert!(matches!(
            divide(&a, &b, "x"),
            Err(TotscatError::InvalidUnitState { .. })
        ));
        let mut c = a.renamed("c");
        c.distribution = true;
        assert!(matches!(
            minus(&a, &c, "x"),
            Err(TotscatError::InvalidUnitState { .. })
        ));
    }

    #[test]
    fn test_event_minus_appends_negated() {
        let geometry = BankGeometry::new(2.0, 90.0);
        let a = Workspace::new(
            "a",
            Unit::TimeOfFlight,
            vec![Bank::events(geometry, vec![Event::new(1.0, 2.0)])],
        );
        let b = a.renamed("b");
        let out = minus(&a, &b, "a").unwrap();
        assert!(out.has_events());
        assert_eq!(out.total_intensity(), 0.0);
    }

    #[test]
    fn test_scale() {
        let mut a = workspace("a", vec![0.0, 1.0, 2.0], vec![4.0, 9.0]);
        scale(&mut a, -2.0);
        let h = a.banks[0].as_histogram().unwrap();
        assert_eq!(h.y, vec![-8.0, -18.0]);
        assert_eq!(h.e, vec![4.0, 6.0]);
    }
}
