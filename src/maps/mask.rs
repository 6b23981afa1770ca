//! # Mask 构建
//!
//! 生成与模板 map 同网格的 mask（值域 [0, 1]）：
//! - 原子周围：距任一原子不超过半径的格点为 1
//! - 边缘：距盒子边缘一定距离以内为 0，随后软化
//! - 密度：平滑后取最高的 `1 - solvent_content` 部分
//!
//! 软化为可分离高斯平滑（sigma = 半径 / 2，截断于 3 sigma），结果截断到 [0, 1]。
//!
//! ## 依赖关系
//! - 被 `manager/base.rs` 使用
//! - 使用 `maps/map_manager.rs`, `models/structure.rs`, `ndarray`

use crate::error::{MapModelError, Result};
use crate::maps::map_manager::MapManager;
use crate::models::symmetry::{norm, sub};
use crate::models::Model;

use ndarray::{Array3, Axis};
use tracing::debug;

/// 默认溶剂含量
pub const DEFAULT_SOLVENT_CONTENT: f64 = 0.5;

/// 由格点间距估计的分辨率：2 倍最大格点间距
pub fn d_min_from_map(map: &MapManager) -> f64 {
    let all = map.all();
    let lengths = map.crystal_symmetry().unit_cell.lengths();
    (0..3)
        .map(|i| lengths[i] / all[i] as f64)
        .fold(0.0, f64::max)
        * 2.0
}

// ─────────────────────────────────────────────────────────────
// 平滑
// ─────────────────────────────────────────────────────────────

/// 可分离高斯平滑，`sigma` 以格点为单位
///
/// 不 wrapping 时边界外视为 0。
pub fn gaussian_smooth(data: &Array3<f64>, sigma: [f64; 3], wrapping: bool) -> Array3<f64> {
    let mut result = data.clone();
    for (axis, &s) in sigma.iter().enumerate() {
        if s <= 0.0 {
            continue;
        }
        let half = (3.0 * s).ceil() as i64;
        let kernel: Vec<f64> = (-half..=half)
            .map(|d| (-(d * d) as f64 / (2.0 * s * s)).exp())
            .collect();
        let total: f64 = kernel.iter().sum();
        let kernel: Vec<f64> = kernel.iter().map(|w| w / total).collect();

        let source = result.clone();
        let n = source.len_of(Axis(axis)) as i64;
        for (mut out_lane, in_lane) in result
            .lanes_mut(Axis(axis))
            .into_iter()
            .zip(source.lanes(Axis(axis)))
        {
            for i in 0..n {
                let mut acc = 0.0;
                for (w, d) in kernel.iter().zip(-half..=half) {
                    let j = i + d;
                    let j = if wrapping {
                        j.rem_euclid(n)
                    } else if j < 0 || j >= n {
                        continue;
                    } else {
                        j
                    };
                    acc += w * in_lane[j as usize];
                }
                out_lane[i as usize] = acc;
            }
        }
    }
    result
}

/// 软化 mask：按半径做高斯平滑后截断到 [0, 1]
pub fn soft_mask(mask: &MapManager, soft_mask_radius: f64) -> Result<MapManager> {
    if soft_mask_radius <= 0.0 {
        return Err(MapModelError::InvalidArgument(format!(
            "soft mask radius must be positive, got {}",
            soft_mask_radius
        )));
    }
    let px = mask.pixel_sizes();
    let sigma = [
        soft_mask_radius / 2.0 / px[0],
        soft_mask_radius / 2.0 / px[1],
        soft_mask_radius / 2.0 / px[2],
    ];
    let all = mask.all();
    if let Some(i) = (0..3).find(|&i| !(3.0 * sigma[i] <= all[i] as f64)) {
        return Err(MapModelError::Configuration(format!(
            "soft mask radius {} is too large for {} grid points on axis {}",
            soft_mask_radius, all[i], i
        )));
    }
    let smoothed = gaussian_smooth(mask.map_data(), sigma, mask.wrapping())
        .mapv(|v| v.clamp(0.0, 1.0));
    let mut soft = mask.customized_copy(smoothed)?;
    soft.set_is_mask(true);
    Ok(soft)
}

// ─────────────────────────────────────────────────────────────
// mask 构建
// ─────────────────────────────────────────────────────────────

/// 原子周围的 mask
///
/// 使用模型当前坐标；wrapping 时越出盒子的球体周期折回。
pub fn create_mask_around_atoms(
    template: &MapManager,
    model: &Model,
    mask_atoms_atom_radius: f64,
) -> Result<MapManager> {
    if !(mask_atoms_atom_radius > 0.0) || !mask_atoms_atom_radius.is_finite() {
        return Err(MapModelError::InvalidArgument(format!(
            "mask atom radius must be finite and positive, got {}",
            mask_atoms_atom_radius
        )));
    }
    let accessor = template.accessor();
    let period = template.unit_cell_grid();
    let wrapping = template.wrapping();
    let radius_frac = template
        .unit_cell_crystal_symmetry()
        .unit_cell
        .fractional_radius(mask_atoms_atom_radius);
    let radius_grid = [
        radius_frac[0] * period[0] as f64,
        radius_frac[1] * period[1] as f64,
        radius_frac[2] * period[2] as f64,
    ];
    // 格点恰在球面上时计入
    let cutoff = mask_atoms_atom_radius + 1e-8;
    let map_first = template.origin();
    let map_last = accessor.last();

    let mut data = Array3::<f64>::zeros(template.map_data().dim());
    for site in model.sites_cart() {
        let center = template.cart_to_grid_units(site);
        // 扫描范围：wrapping 时为中心一个晶胞内的像，否则为 map 本身
        let bounds = |i: usize| -> (f64, f64) {
            if wrapping {
                (center[i] - period[i] as f64, center[i] + period[i] as f64)
            } else {
                (map_first[i] as f64, (map_last[i] - 1) as f64)
            }
        };
        let lo: Vec<i64> = (0..3)
            .map(|i| (center[i] - radius_grid[i]).floor().max(bounds(i).0.floor()) as i64)
            .collect();
        let hi: Vec<i64> = (0..3)
            .map(|i| (center[i] + radius_grid[i]).ceil().min(bounds(i).1.ceil()) as i64)
            .collect();
        for gx in lo[0]..=hi[0] {
            for gy in lo[1]..=hi[1] {
                for gz in lo[2]..=hi[2] {
                    let index = [gx, gy, gz];
                    let local = if accessor.contains(index) {
                        accessor.local(index)
                    } else if wrapping {
                        match accessor.wrap(index, period) {
                            Some(l) => l,
                            None => continue,
                        }
                    } else {
                        continue;
                    };
                    let point = template.grid_units_to_cart([gx as f64, gy as f64, gz as f64]);
                    if norm(sub(point, site)) <= cutoff {
                        data[[local[0], local[1], local[2]]] = 1.0;
                    }
                }
            }
        }
    }

    let mut mask = template.customized_copy(data)?;
    mask.set_is_mask(true);
    debug!(
        n_atoms = model.n_atoms(),
        radius = mask_atoms_atom_radius,
        "created mask around atoms"
    );
    Ok(mask)
}

/// 盒子边缘的软 mask
pub fn create_mask_around_edges(template: &MapManager, soft_mask_radius: f64) -> Result<MapManager> {
    if soft_mask_radius <= 0.0 {
        return Err(MapModelError::InvalidArgument(format!(
            "soft mask radius must be positive, got {}",
            soft_mask_radius
        )));
    }
    let px = template.pixel_sizes();
    let all = template.all();
    let border: Vec<f64> = (0..3).map(|i| (soft_mask_radius / px[i]).ceil()).collect();
    if let Some(i) = (0..3).find(|&i| !(2.0 * border[i] < all[i] as f64)) {
        return Err(MapModelError::Configuration(format!(
            "soft mask radius {} leaves no interior: border of {} grid points on an axis of {}",
            soft_mask_radius, border[i], all[i]
        )));
    }
    let border: Vec<usize> = border.iter().map(|&b| b as usize).collect();

    let inside = |i: usize, axis: usize| i >= border[axis] && i + border[axis] < all[axis];
    let data = Array3::from_shape_fn(template.map_data().dim(), |(i, j, k)| {
        if inside(i, 0) && inside(j, 1) && inside(k, 2) {
            1.0
        } else {
            0.0
        }
    });

    let mut hard = template.customized_copy(data)?;
    hard.set_is_mask(true);
    // 边缘 mask 不折回
    hard.set_wrapping(false);
    let mut soft = soft_mask(&hard, soft_mask_radius)?;
    soft.set_wrapping(template.wrapping());
    Ok(soft)
}

/// 密度 mask：平滑后保留密度最高的 `1 - solvent_content` 部分
pub fn create_mask_around_density(
    template: &MapManager,
    solvent_content: Option<f64>,
) -> Result<MapManager> {
    let solvent_content = solvent_content.unwrap_or(DEFAULT_SOLVENT_CONTENT);
    if !(0.0..1.0).contains(&solvent_content) {
        return Err(MapModelError::InvalidArgument(format!(
            "solvent content must be in [0, 1), got {}",
            solvent_content
        )));
    }

    let d_min = d_min_from_map(template);
    let px = template.pixel_sizes();
    let sigma = [
        d_min / 2.0 / px[0],
        d_min / 2.0 / px[1],
        d_min / 2.0 / px[2],
    ];
    let smoothed = gaussian_smooth(template.map_data(), sigma, template.wrapping());

    let mut values: Vec<f64> = smoothed.iter().copied().collect();
    values.sort_by(|a, b| b.total_cmp(a));
    let n_keep = (((1.0 - solvent_content) * values.len() as f64).round() as usize)
        .clamp(1, values.len());
    let threshold = values[n_keep - 1];

    let data = smoothed.mapv(|v| if v >= threshold { 1.0 } else { 0.0 });
    let mut mask = template.customized_copy(data)?;
    mask.set_is_mask(true);
    debug!(solvent_content, threshold, "created mask around density");
    Ok(mask)
}

// ─────────────────────────────────────────────────────────────
// 应用 mask
// ─────────────────────────────────────────────────────────────

/// mask > 0.5 区域内的平均值，区域为空时返回 None
pub fn mean_inside(map_data: &Array3<f64>, mask_data: &Array3<f64>) -> Option<f64> {
    let (sum, count) = map_data
        .iter()
        .zip(mask_data.iter())
        .filter(|(_, &m)| m > 0.5)
        .fold((0.0, 0usize), |(s, c), (&v, _)| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// 对 map 施加 mask
///
/// 硬切为逐点相乘；`set_outside_to_mean_inside` 时外部平滑过渡到 mask 内均值。
pub fn apply_mask(map: &mut MapManager, mask: &MapManager, set_outside_to_mean_inside: bool) -> Result<()> {
    if map.map_data().dim() != mask.map_data().dim() {
        return Err(MapModelError::incompatible(
            "map and mask",
            format!(
                "map shape {:?} differs from mask shape {:?}",
                map.map_data().dim(),
                mask.map_data().dim()
            ),
        ));
    }
    let new_data = if set_outside_to_mean_inside {
        let mean = mean_inside(map.map_data(), mask.map_data()).unwrap_or(0.0);
        ndarray::Zip::from(map.map_data())
            .and(mask.map_data())
            .map_collect(|&v, &m| v * m + mean * (1.0 - m))
    } else {
        map.map_data() * mask.map_data()
    };
    map.set_map_data(new_data)
}
