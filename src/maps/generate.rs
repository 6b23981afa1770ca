//! # 合成模型与密度图
//!
//! 生成测试与演示用的数据：
//! - `generate_model`: α 螺旋主链 (N, CA, C, O)，放入 P1 盒子
//! - `generate_map`: 原子处的周期性高斯密度（不经过 FFT）
//!
//! 高斯宽度 sigma² = B / (8π²) + (0.3 d_min)²，截断于 3 sigma。
//!
//! ## 依赖关系
//! - 被 `manager/map_model_manager.rs`, `commands/` 使用
//! - 使用 `maps/boxing.rs`, `maps/map_manager.rs`, `models/`

use crate::error::{MapModelError, Result};
use crate::maps::boxing::shift_and_box_model;
use crate::maps::map_manager::MapManager;
use crate::models::symmetry::{norm, sub, Vec3};
use crate::models::{Atom, Model};

use ndarray::Array3;
use std::f64::consts::PI;
use tracing::debug;

/// 螺旋每残基转角（度）
const HELIX_TURN_DEG: f64 = 100.0;

/// 螺旋每残基上升（Å）
const HELIX_RISE: f64 = 1.5;

/// 主链原子: (名称, 元素, 半径, 相位偏移(度), 轴向偏移)
const BACKBONE: [(&str, &str, f64, f64, f64); 4] = [
    ("N", "N", 1.55, -28.0, -0.85),
    ("CA", "C", 2.30, 0.0, 0.0),
    ("C", "C", 1.60, 28.0, 0.75),
    ("O", "O", 2.05, 40.0, 1.95),
];

/// 生成参数
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// 残基数
    pub n_residues: usize,
    /// 起始残基号
    pub start_res: i32,
    /// 所有原子的 B 因子
    pub b_iso: f64,
    /// 模型盒子的缓冲层（Å）
    pub box_buffer: f64,
    /// 分辨率（Å）
    pub d_min: f64,
    /// 完整晶胞网格，None 时按分辨率选择
    pub gridding: Option<[usize; 3]>,
    /// 生成的 map 的原点
    pub origin_shift_grid_units: Option<[i64; 3]>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            n_residues: 10,
            start_res: 1,
            b_iso: 30.0,
            box_buffer: 5.0,
            d_min: 3.0,
            gridding: None,
            origin_shift_grid_units: None,
        }
    }
}

/// 生成 α 螺旋主链模型，并放入 P1 盒子
pub fn generate_model(n_residues: usize, start_res: i32, b_iso: f64, box_buffer: f64) -> Result<Model> {
    if n_residues == 0 {
        return Err(MapModelError::InvalidArgument(
            "number of residues must be positive".to_string(),
        ));
    }
    let mut atoms = Vec::with_capacity(n_residues * BACKBONE.len());
    for i in 0..n_residues {
        let turn = i as f64 * HELIX_TURN_DEG;
        let rise = i as f64 * HELIX_RISE;
        let resseq = start_res + i as i32;
        for &(name, element, radius, phase, dz) in BACKBONE.iter() {
            let angle = (turn + phase).to_radians();
            let xyz = [radius * angle.cos(), radius * angle.sin(), rise + dz];
            atoms.push(
                Atom::new(name, element, xyz)
                    .with_residue("ALA", "A", resseq)
                    .with_b_iso(b_iso),
            );
        }
    }

    // 盒子即新模型的原始框架，不保留平移记录
    let boxed = shift_and_box_model(&Model::new(atoms), box_buffer)?;
    let cs = boxed
        .crystal_symmetry()
        .cloned()
        .ok_or_else(|| MapModelError::Other("boxed model has no symmetry".to_string()))?;
    Ok(Model::new(boxed.atoms().to_vec())
        .with_crystal_symmetry(cs.clone())
        .with_unit_cell_crystal_symmetry(cs))
}

/// 按分辨率选择网格：间距不超过 d_min / 3，向上取偶数
pub fn default_gridding(cell_lengths: Vec3, d_min: f64) -> [usize; 3] {
    let spacing = d_min / 3.0;
    let mut n = [0usize; 3];
    for i in 0..3 {
        let raw = (cell_lengths[i] / spacing).ceil().max(2.0) as usize;
        n[i] = raw + raw % 2;
    }
    n
}

/// 元素的电子数，作为高斯峰的权重
fn scattering_weight(element: &str) -> f64 {
    match element.trim().to_ascii_uppercase().as_str() {
        "H" => 1.0,
        "C" => 6.0,
        "N" => 7.0,
        "O" => 8.0,
        "S" => 16.0,
        "P" => 15.0,
        _ => 6.0,
    }
}

/// 由模型计算周期性高斯密度图
///
/// 模型坐标位于完整晶胞框架中；`origin_shift_grid_units` 给定时，
/// 结果 map 的第一个格点为该网格索引。
pub fn generate_map(
    model: &Model,
    d_min: f64,
    gridding: Option<[usize; 3]>,
    origin_shift_grid_units: Option<[i64; 3]>,
) -> Result<MapManager> {
    if !(d_min > 0.0) {
        return Err(MapModelError::InvalidArgument(format!(
            "resolution must be positive, got {}",
            d_min
        )));
    }
    let cs = model
        .unit_cell_crystal_symmetry()
        .or_else(|| model.crystal_symmetry())
        .cloned()
        .ok_or_else(|| MapModelError::MissingResource("model has no crystal symmetry".to_string()))?;
    let n = gridding.unwrap_or_else(|| default_gridding(cs.unit_cell.lengths(), d_min));

    let template = MapManager::full_cell(Array3::zeros((n[0], n[1], n[2])), cs.clone())?;
    let mut cell_density = Array3::<f64>::zeros((n[0], n[1], n[2]));
    let resolution_term = (0.3 * d_min) * (0.3 * d_min);

    for atom in model.atoms() {
        let sigma2 = atom.b_iso.max(0.0) / (8.0 * PI * PI) + resolution_term;
        let sigma = sigma2.sqrt();
        let cutoff = 3.0 * sigma;
        let amplitude = atom.occupancy * scattering_weight(&atom.element) / (2.0 * PI * sigma2).powf(1.5);

        let center = template.cart_to_grid_units(atom.xyz);
        let frac_radius = cs.unit_cell.fractional_radius(cutoff);
        let lo: Vec<i64> = (0..3)
            .map(|i| (center[i] - frac_radius[i] * n[i] as f64).floor() as i64)
            .collect();
        let hi: Vec<i64> = (0..3)
            .map(|i| (center[i] + frac_radius[i] * n[i] as f64).ceil() as i64)
            .collect();

        for gx in lo[0]..=hi[0] {
            for gy in lo[1]..=hi[1] {
                for gz in lo[2]..=hi[2] {
                    let point = template.grid_units_to_cart([gx as f64, gy as f64, gz as f64]);
                    let r = norm(sub(point, atom.xyz));
                    if r > cutoff {
                        continue;
                    }
                    let local = [
                        gx.rem_euclid(n[0] as i64) as usize,
                        gy.rem_euclid(n[1] as i64) as usize,
                        gz.rem_euclid(n[2] as i64) as usize,
                    ];
                    cell_density[[local[0], local[1], local[2]]] +=
                        amplitude * (-r * r / (2.0 * sigma2)).exp();
                }
            }
        }
    }

    let origin = origin_shift_grid_units.unwrap_or([0, 0, 0]);
    let data = Array3::from_shape_fn((n[0], n[1], n[2]), |(i, j, k)| {
        let g = [origin[0] + i as i64, origin[1] + j as i64, origin[2] + k as i64];
        cell_density[[
            g[0].rem_euclid(n[0] as i64) as usize,
            g[1].rem_euclid(n[1] as i64) as usize,
            g[2].rem_euclid(n[2] as i64) as usize,
        ]]
    });

    debug!(gridding = ?n, origin = ?origin, n_atoms = model.n_atoms(), "generated map");
    Ok(MapManager::new(data, origin, n, cs)?.with_wrapping(true))
}

/// 生成模型和对应的密度图
pub fn generate(options: &GenerateOptions) -> Result<(Model, MapManager)> {
    let model = generate_model(
        options.n_residues,
        options.start_res,
        options.b_iso,
        options.box_buffer,
    )?;
    let map = generate_map(
        &model,
        options.d_min,
        options.gridding,
        options.origin_shift_grid_units,
    )?;
    Ok((model, map))
}
