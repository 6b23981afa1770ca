//! # Map 统计
//!
//! - `MapCounts`: 网格范围、最小/最大/平均值、网格角点对应的分辨率
//! - `Histogram` / `MapHistograms`: 等宽直方图，两个半图共用同一取值范围
//!   并计算直方图相关系数
//!
//! ## 依赖关系
//! - 被 `manager/map_model_manager.rs`, `maps/export.rs`, `commands/` 使用
//! - 使用 `maps/grid.rs`, `models/symmetry.rs`

use crate::maps::grid::GridAccessor;
use crate::models::symmetry::{mat_vec, norm, transpose, CrystalSymmetry};

use ndarray::Array3;
use serde::Serialize;

/// 默认直方图格数
pub const DEFAULT_N_SLOTS: usize = 20;

/// 网格计数与取值范围
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapCounts {
    pub origin: [i64; 3],
    pub last: [i64; 3],
    pub focus: [usize; 3],
    pub all: [usize; 3],
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// 网格能表示的最高分辨率（Å）
    pub d_min_corner: f64,
}

impl MapCounts {
    pub fn new(data: &Array3<f64>, accessor: &GridAccessor, crystal_symmetry: &CrystalSymmetry) -> Self {
        let (min, max, sum) = data.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v),
        );
        let n = data.len().max(1) as f64;
        MapCounts {
            origin: accessor.origin,
            last: accessor.last(),
            focus: accessor.focus,
            all: accessor.all,
            min,
            max,
            mean: sum / n,
            d_min_corner: d_min_corner(accessor.all, crystal_symmetry),
        }
    }
}

/// 倒易网格角点 (n/2) 对应的 d 间距
pub fn d_min_corner(all: [usize; 3], crystal_symmetry: &CrystalSymmetry) -> f64 {
    let h = [
        (all[0] / 2) as f64,
        (all[1] / 2) as f64,
        (all[2] / 2) as f64,
    ];
    let ft = transpose(crystal_symmetry.unit_cell.fractionalization_matrix());
    let s = norm(mat_vec(&ft, h));
    if s > 0.0 {
        1.0 / s
    } else {
        f64::INFINITY
    }
}

/// 等宽直方图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub data_min: f64,
    pub data_max: f64,
    pub slots: Vec<usize>,
}

impl Histogram {
    /// 以数据自身的范围建立直方图
    pub fn new<'a>(data: impl IntoIterator<Item = &'a f64> + Clone, n_slots: usize) -> Self {
        let (lo, hi) = data
            .clone()
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self::with_range(data, lo, hi, n_slots)
    }

    /// 在给定范围内建立直方图，范围外的值不计入
    pub fn with_range<'a>(
        data: impl IntoIterator<Item = &'a f64>,
        data_min: f64,
        data_max: f64,
        n_slots: usize,
    ) -> Self {
        let n_slots = n_slots.max(1);
        let mut slots = vec![0usize; n_slots];
        let width = (data_max - data_min) / n_slots as f64;
        for &v in data {
            if !(v >= data_min && v <= data_max) {
                continue;
            }
            let i = if width > 0.0 {
                (((v - data_min) / width) as usize).min(n_slots - 1)
            } else {
                0
            };
            slots[i] += 1;
        }
        Histogram {
            data_min,
            data_max,
            slots,
        }
    }

    pub fn slot_width(&self) -> f64 {
        (self.data_max - self.data_min) / self.slots.len() as f64
    }

    pub fn n_counted(&self) -> usize {
        self.slots.iter().sum()
    }
}

/// 两组数的线性相关系数，方差为零时返回 None
pub fn linear_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// map 与半图的直方图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapHistograms {
    pub h_map: Histogram,
    pub h_half_map_1: Option<Histogram>,
    pub h_half_map_2: Option<Histogram>,
    pub half_map_histogram_cc: Option<f64>,
}

impl MapHistograms {
    pub fn new(
        data: &Array3<f64>,
        half_maps: Option<(&Array3<f64>, &Array3<f64>)>,
        n_slots: usize,
    ) -> Self {
        let h_map = Histogram::new(data.iter(), n_slots);
        let Some((d1, d2)) = half_maps else {
            return MapHistograms {
                h_map,
                h_half_map_1: None,
                h_half_map_2: None,
                half_map_histogram_cc: None,
            };
        };

        let lo = d1.iter().chain(d2.iter()).copied().fold(f64::INFINITY, f64::min);
        let hi = d1.iter().chain(d2.iter()).copied().fold(f64::NEG_INFINITY, f64::max);
        let h1 = Histogram::with_range(d1.iter(), lo, hi, n_slots);
        let h2 = Histogram::with_range(d2.iter(), lo, hi, n_slots);
        let s1: Vec<f64> = h1.slots.iter().map(|&c| c as f64).collect();
        let s2: Vec<f64> = h2.slots.iter().map(|&c| c as f64).collect();
        let cc = linear_correlation(&s1, &s2);

        MapHistograms {
            h_map,
            h_half_map_1: Some(h1),
            h_half_map_2: Some(h2),
            half_map_histogram_cc: cc,
        }
    }
}
