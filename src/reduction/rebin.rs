//! # 重分箱与直方图化
//!
//! - `rebin`: 按比例重叠把计数重新分配到新的 bin 边界（误差按 e²·frac 累加）
//! - `histogram_events`: 事件列表 → 直方图（不可逆）
//! - `crop_to_data`: 把每个 bank 裁剪到其有效数据范围
//!
//! 分布数据先还原为计数再重分箱，之后恢复分布状态。
//!
//! ## 依赖关系
//! - 被 `reduction/`、`inelastic/`、`io/` 调用
//! - 使用 `reduction/units.rs` 切换分布状态

use crate::error::{Result, TotscatError};
use crate::models::{BankData, Binning, Event, Histogram, Workspace};
use crate::reduction::units::set_distribution;

/// 事件自动直方图化时的 bin 数
pub const AUTO_HISTOGRAM_BINS: usize = 2000;

/// 把直方图计数重新分配到新的 bin 边界
pub fn rebin_histogram(old: &Histogram, new_edges: &[f64]) -> Histogram {
    let n = new_edges.len() - 1;
    let mut y = vec![0.0; n];
    let mut e2 = vec![0.0; n];

    let mut j = 0;
    for i in 0..old.len() {
        let (lo, hi) = (old.edges[i], old.edges[i + 1]);
        let width = hi - lo;

        while j < n && new_edges[j + 1] <= lo {
            j += 1;
        }
        let mut k = j;
        while k < n && new_edges[k] < hi {
            let overlap = hi.min(new_edges[k + 1]) - lo.max(new_edges[k]);
            if overlap > 0.0 {
                let frac = overlap / width;
                y[k] += old.y[i] * frac;
                e2[k] += old.e[i] * old.e[i] * frac;
            }
            k += 1;
        }
    }

    Histogram {
        edges: new_edges.to_vec(),
        y,
        e: e2.into_iter().map(f64::sqrt).collect(),
    }
}

/// 把事件填入给定的 bin 边界
pub fn histogram_event_list(events: &[Event], edges: &[f64]) -> Histogram {
    let n = edges.len() - 1;
    let mut y = vec![0.0; n];
    let mut e2 = vec![0.0; n];

    for ev in events {
        if ev.x < edges[0] || ev.x >= edges[n] {
            continue;
        }
        let bin = edges.partition_point(|&x| x <= ev.x) - 1;
        y[bin] += ev.weight;
        e2[bin] += ev.error_sq;
    }

    Histogram {
        edges: edges.to_vec(),
        y,
        e: e2.into_iter().map(f64::sqrt).collect(),
    }
}

/// 按重分箱参数重分箱所有 bank（事件数据会被直方图化）
pub fn rebin(ws: &mut Workspace, binning: &Binning) -> Result<()> {
    let edges = binning.edges();
    rebin_to_edges(ws, &edges)
}

/// 重分箱到给定边界
pub fn rebin_to_edges(ws: &mut Workspace, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(TotscatError::InvalidArgument(
            "rebin needs at least two edges".to_string(),
        ));
    }

    let was_distribution = ws.distribution;
    set_distribution(ws, false)?;

    for bank in &mut ws.banks {
        let rebinned = match &bank.data {
            BankData::Histogram(h) => rebin_histogram(h, edges),
            BankData::Events(events) => histogram_event_list(events, edges),
        };
        bank.data = BankData::Histogram(rebinned);
    }

    set_distribution(ws, was_distribution)
}

/// 事件 bank 直方图化，边界取该 bank 事件范围内的对数（或线性）分箱
pub fn histogram_events(ws: &mut Workspace, bins: usize) -> Result<()> {
    let bins = bins.max(1);
    for bank in &mut ws.banks {
        let BankData::Events(events) = &bank.data else {
            continue;
        };

        let (min, max) = events
            .iter()
            .map(|ev| ev.x)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
        if !min.is_finite() || !max.is_finite() {
            return Err(TotscatError::EventData {
                operation: "histogram of empty event list".to_string(),
                workspace: ws.name.clone(),
            });
        }

        // 最大值放进最后一个 bin
        let max = if max > min { max * (1.0 + 1e-9) } else { min + 1.0 };
        let edges: Vec<f64> = if min > 0.0 {
            let ratio = (max / min).ln() / bins as f64;
            (0..=bins).map(|i| min * (ratio * i as f64).exp()).collect()
        } else {
            let step = (max - min) / bins as f64;
            (0..=bins).map(|i| min + step * i as f64).collect()
        };

        bank.data = BankData::Histogram(histogram_event_list(events, &edges));
    }
    Ok(())
}

/// 每个 bank 中 y 有限且非零的 x 范围
pub fn data_ranges(ws: &Workspace) -> Result<Vec<Option<(f64, f64)>>> {
    Ok(ws
        .histograms("data range")?
        .iter()
        .map(|h| {
            let valid = |i: &usize| h.y[*i].is_finite() && h.y[*i] != 0.0;
            let first = (0..h.len()).find(valid)?;
            let last = (0..h.len()).rev().find(valid)?;
            Some((h.edges[first], h.edges[last + 1]))
        })
        .collect())
}

/// 把每个 bank 裁剪到各自的有效数据范围（CropWorkspaceRagged）
pub fn crop_to_data(ws: &mut Workspace) -> Result<Vec<Option<(f64, f64)>>> {
    let ranges = data_ranges(ws)?;
    for (bank, range) in ws.banks.iter_mut().zip(&ranges) {
        let (Some(h), Some((lo, hi))) = (bank.as_histogram_mut(), range) else {
            continue;
        };
        let first = h.edges.iter().position(|x| x >= lo).unwrap_or(0);
        let last = h.edges.iter().rposition(|x| x <= hi).unwrap_or(h.edges.len() - 1);
        if last > first {
            h.edges = h.edges[first..=last].to_vec();
            h.y = h.y[first..last].to_vec();
            h.e = h.e[first..last].to_vec();
        }
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bank, BankGeometry, Unit};

    fn geometry() -> BankGeometry {
        BankGeometry::new(2.0, 90.0)
    }

    #[test]
    fn test_rebin_conserves_counts() {
        let old = Histogram::from_counts(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![4.0; 4]).unwrap();
        let new = rebin_histogram(&old, &[0.0, 2.0, 4.0]);
        assert_eq!(new.y, vec![8.0, 8.0]);
        // e² = 4 + 4
        assert!((new.e[0] - 8.0_f64.sqrt()).abs() < 1e-12);

        let split = rebin_histogram(&old, &[0.5, 1.5, 3.5]);
        assert!((split.y[0] - 4.0).abs() < 1e-12);
        assert!((split.y[1] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_rebin_distribution_workspace() {
        let h = Histogram::from_counts(vec![0.0, 1.0, 3.0], vec![2.0, 4.0]).unwrap();
        let mut ws = Workspace::new("d", Unit::MomentumTransfer, vec![Bank::histogram(geometry(), h)]);
        set_distribution(&mut ws, true).unwrap();

        rebin(&mut ws, &Binning::linear(0.0, 1.5, 3.0).unwrap()).unwrap();
        assert!(ws.distribution);
        let h = ws.banks[0].as_histogram().unwrap();
        // 计数: [2 + 4·0.25, 4·0.75] = [3, 3]，宽度 1.5
        assert!((h.y[0] - 2.0).abs() < 1e-12);
        assert!((h.y[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_events_to_histogram() {
        let events = vec![Event::new(1.5, 1.0), Event::new(1.7, 2.0), Event::new(2.5, 1.0)];
        let mut ws = Workspace::new("ev", Unit::TimeOfFlight, vec![Bank::events(geometry(), events)]);
        rebin(&mut ws, &Binning::linear(1.0, 1.0, 3.0).unwrap()).unwrap();
        assert!(!ws.has_events());
        assert_eq!(ws.banks[0].as_histogram().unwrap().y, vec![3.0, 1.0]);
    }

    #[test]
    fn test_histogram_events_keeps_all_weight() {
        let events: Vec<Event> = (1..=100).map(|i| Event::new(i as f64, 1.0)).collect();
        let mut ws = Workspace::new("ev", Unit::DSpacing, vec![Bank::events(geometry(), events)]);
        histogram_events(&mut ws, 50).unwrap();
        let h = ws.banks[0].as_histogram().unwrap();
        assert_eq!(h.len(), 50);
        assert!((h.y.iter().sum::<f64>() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_crop_to_data() {
        let h = Histogram::from_counts(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![0.0, 1.0, 2.0, 0.0, 0.0],
        )
        .unwrap();
        let mut ws = Workspace::new("c", Unit::TimeOfFlight, vec![Bank::histogram(geometry(), h)]);
        let ranges = crop_to_data(&mut ws).unwrap();
        assert_eq!(ranges[0], Some((1.0, 3.0)));
        assert_eq!(ws.banks[0].as_histogram().unwrap().edges, vec![1.0, 2.0, 3.0]);
    }
}
