//! # 盒子构建
//!
//! - `AroundModel`: 在 map 中截取包围模型（加缓冲层）的网格盒子，
//!   把原点移到零，并把模型平移到同一框架
//! - `shift_and_box_model`: 只针对模型，生成包围原子的 P1 盒子
//!
//! ## 依赖关系
//! - 被 `manager/map_model_manager.rs`, `manager/r_model.rs`, `maps/generate.rs` 使用
//! - 使用 `maps/map_manager.rs`, `models/`

use crate::error::{MapModelError, Result};
use crate::maps::map_manager::MapManager;
use crate::models::symmetry::{sub, CrystalSymmetry, UnitCell, Vec3};
use crate::models::Model;

use tracing::{debug, warn};

/// 盒子被 map 边界截断时的警告
pub const CLIPPED_BOX_WARNING: &str =
    "WARNING: box around model extends beyond the map and was clipped";

/// 接近整数的网格坐标取整，避免浮点误差多取一个格点
fn snap(x: f64) -> f64 {
    if (x - x.round()).abs() < 1e-6 {
        x.round()
    } else {
        x
    }
}

/// 笛卡尔包围盒的 8 个角转为网格闭区间
fn grid_range(map: &MapManager, lo: Vec3, hi: Vec3) -> ([i64; 3], [i64; 3]) {
    let mut gmin = [f64::INFINITY; 3];
    let mut gmax = [f64::NEG_INFINITY; 3];
    for corner in 0..8 {
        let site = [
            if corner & 1 == 0 { lo[0] } else { hi[0] },
            if corner & 2 == 0 { lo[1] } else { hi[1] },
            if corner & 4 == 0 { lo[2] } else { hi[2] },
        ];
        let g = map.cart_to_grid_units(site);
        for i in 0..3 {
            gmin[i] = gmin[i].min(g[i]);
            gmax[i] = gmax[i].max(g[i]);
        }
    }
    let first = [
        snap(gmin[0]).floor() as i64,
        snap(gmin[1]).floor() as i64,
        snap(gmin[2]).floor() as i64,
    ];
    let last = [
        snap(gmax[0]).ceil() as i64,
        snap(gmax[1]).ceil() as i64,
        snap(gmax[2]).ceil() as i64,
    ];
    (first, last)
}

/// wrapping 时盒子不受 map 范围截断，每个轴最多覆盖一个晶胞
fn check_wrapped_extent(map: &MapManager, first: [i64; 3], last: [i64; 3]) -> Result<()> {
    let ucg = map.unit_cell_grid();
    for i in 0..3 {
        let extent = last[i].checked_sub(first[i]).and_then(|d| d.checked_add(1));
        match extent {
            Some(n) if n <= ucg[i] as i64 => {}
            _ => {
                return Err(MapModelError::Configuration(format!(
                    "wrapped box on axis {} spans grid {}..={}, more than the unit cell gridding {}",
                    i, first[i], last[i], ucg[i]
                )))
            }
        }
    }
    Ok(())
}

/// 围绕模型截取的盒子
#[derive(Debug, Clone)]
pub struct AroundModel {
    map_manager: MapManager,
    model: Model,
    source_origin: [i64; 3],
    source_all: [usize; 3],
    gridding_first: [i64; 3],
    gridding_last: [i64; 3],
    wrapping: bool,
    warning_message: Option<String>,
}

impl AroundModel {
    /// 构建盒子
    ///
    /// `wrapping` 为 None 时沿用 map 的设置。不 wrapping 时盒子被截断到 map 范围内。
    pub fn new(map: &MapManager, model: &Model, box_cushion: f64, wrapping: Option<bool>) -> Result<Self> {
        if !(box_cushion >= 0.0) || !box_cushion.is_finite() {
            return Err(MapModelError::InvalidArgument(format!(
                "box cushion must be finite and non-negative, got {}",
                box_cushion
            )));
        }
        if let Some(reason) = map.model_mismatch(model, false) {
            return Err(MapModelError::incompatible("map and model", reason));
        }
        let (lo, hi) = model
            .bounding_box()
            .ok_or_else(|| MapModelError::MissingResource("model has no atoms to box around".to_string()))?;
        let lo = sub(lo, [box_cushion; 3]);
        let hi = [hi[0] + box_cushion, hi[1] + box_cushion, hi[2] + box_cushion];

        let wrapping = wrapping.unwrap_or_else(|| map.wrapping());
        let (mut first, mut last) = grid_range(map, lo, hi);

        let mut warning_message = None;
        if !wrapping {
            let map_first = map.origin();
            let map_last = map.accessor().last();
            let mut clipped = false;
            for i in 0..3 {
                if first[i] < map_first[i] {
                    first[i] = map_first[i];
                    clipped = true;
                }
                if last[i] > map_last[i] - 1 {
                    last[i] = map_last[i] - 1;
                    clipped = true;
                }
            }
            if clipped {
                warn!(first = ?first, last = ?last, "{}", CLIPPED_BOX_WARNING);
                warning_message = Some(CLIPPED_BOX_WARNING.to_string());
            }
            if (0..3).any(|i| first[i] > last[i]) {
                return Err(MapModelError::incompatible(
                    "map and model",
                    "model lies entirely outside the map",
                ));
            }
        } else {
            check_wrapped_extent(map, first, last)?;
        }

        let mut boxed = map.extract_box(first, last, wrapping);
        boxed.shift_origin([0, 0, 0]);

        let delta = map.grid_units_to_cart([-first[0] as f64, -first[1] as f64, -first[2] as f64]);
        let mut boxed_model = model.clone();
        boxed_model.shift_model_and_set_crystal_symmetry(delta, Some(boxed.crystal_symmetry()));
        boxed_model.set_unit_cell_crystal_symmetry(boxed.unit_cell_crystal_symmetry().clone());
        boxed_model.set_shift_cart(boxed.shift_cart());

        debug!(
            first = ?first,
            last = ?last,
            shift_cart = %boxed.shift_cart(),
            "boxed map around model"
        );

        Ok(AroundModel {
            map_manager: boxed,
            model: boxed_model,
            source_origin: map.origin(),
            source_all: map.all(),
            gridding_first: first,
            gridding_last: last,
            wrapping,
            warning_message,
        })
    }

    /// 对另一张与源 map 相似的 map 截取同一盒子
    pub fn apply_to_map(&self, other: &MapManager) -> Result<MapManager> {
        if other.origin() != self.source_origin || other.all() != self.source_all {
            return Err(MapModelError::incompatible(
                "box and map",
                format!(
                    "map with origin {:?} and gridding {:?} differs from boxed map origin {:?} and gridding {:?}",
                    other.origin(),
                    other.all(),
                    self.source_origin,
                    self.source_all
                ),
            ));
        }
        let mut boxed = other.extract_box(self.gridding_first, self.gridding_last, self.wrapping);
        boxed.shift_origin([0, 0, 0]);
        Ok(boxed)
    }

    pub fn map_manager(&self) -> &MapManager {
        &self.map_manager
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_parts(self) -> (MapManager, Model) {
        (self.map_manager, self.model)
    }

    /// 盒子在源 map 网格中的闭区间
    pub fn gridding_first(&self) -> [i64; 3] {
        self.gridding_first
    }

    pub fn gridding_last(&self) -> [i64; 3] {
        self.gridding_last
    }

    pub fn warning_message(&self) -> Option<&str> {
        self.warning_message.as_deref()
    }
}

/// 把模型平移到 P1 盒子中：最小坐标减缓冲层落在原点，盒子边长为范围加两倍缓冲层
pub fn shift_and_box_model(model: &Model, box_cushion: f64) -> Result<Model> {
    let (lo, hi) = model
        .bounding_box()
        .ok_or_else(|| MapModelError::MissingResource("model has no atoms to box".to_string()))?;
    let extent = sub(hi, lo);
    let lengths = [
        extent[0] + 2.0 * box_cushion,
        extent[1] + 2.0 * box_cushion,
        extent[2] + 2.0 * box_cushion,
    ];
    if lengths.iter().any(|&l| l <= 0.0) {
        return Err(MapModelError::InvalidArgument(format!(
            "box around model has non-positive edge: {:?}",
            lengths
        )));
    }

    let cs = CrystalSymmetry::p1(UnitCell::orthorhombic(lengths[0], lengths[1], lengths[2]));
    let shift = [
        box_cushion - lo[0],
        box_cushion - lo[1],
        box_cushion - lo[2],
    ];
    let mut boxed = model.clone();
    boxed.shift_model_and_set_crystal_symmetry(shift, Some(cs.clone()));
    boxed.set_unit_cell_crystal_symmetry(cs);
    Ok(boxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::symmetry::approx_equal;
    use crate::models::Atom;
    use ndarray::Array3;

    fn full_map() -> MapManager {
        let cs = CrystalSymmetry::p1(UnitCell::orthorhombic(40.0, 40.0, 40.0));
        let data = Array3::from_shape_fn((40, 40, 40), |(i, j, k)| (i * 10000 + j * 100 + k) as f64);
        MapManager::full_cell(data, cs).unwrap()
    }

    fn model_at(sites: &[Vec3]) -> Model {
        Model::new(sites.iter().map(|&s| Atom::new("CA", "C", s)).collect())
    }

    #[test]
    fn test_box_around_model() {
        let map = full_map();
        let model = model_at(&[[20.0, 20.0, 20.0], [22.0, 21.0, 20.0]]);
        let bx = AroundModel::new(&map, &model, 3.0, None).unwrap();

        assert_eq!(bx.gridding_first(), [17, 17, 17]);
        assert_eq!(bx.gridding_last(), [25, 24, 23]);
        assert!(bx.warning_message().is_none());

        let boxed = bx.map_manager();
        assert!(boxed.origin_is_zero());
        assert_eq!(boxed.all(), [9, 8, 7]);
        assert_eq!(boxed.map_data()[[0, 0, 0]], map.map_data()[[17, 17, 17]]);
        assert!(approx_equal(boxed.shift_cart().shift_cart, [-17.0, -17.0, -17.0], 1e-8));

        let boxed_model = bx.model();
        assert!(approx_equal(boxed_model.atoms()[0].xyz, [3.0, 3.0, 3.0], 1e-8));
        assert!(boxed_model
            .crystal_symmetry()
            .unwrap()
            .is_similar_symmetry(&boxed.crystal_symmetry()));
        assert!(boxed.is_compatible_model(boxed_model, true));

        let original = boxed_model.sites_cart_in_original_frame();
        assert!(approx_equal(original[1], [22.0, 21.0, 20.0], 1e-8));
    }

    #[test]
    fn test_box_clipped_without_wrapping() {
        let map = full_map();
        let model = model_at(&[[1.0, 1.0, 1.0]]);
        let bx = AroundModel::new(&map, &model, 3.0, Some(false)).unwrap();
        assert_eq!(bx.gridding_first(), [0, 0, 0]);
        assert_eq!(bx.warning_message(), Some(CLIPPED_BOX_WARNING));
    }

    #[test]
    fn test_box_wraps_on_full_cell() {
        let map = full_map();
        let model = model_at(&[[1.0, 1.0, 1.0]]);
        let bx = AroundModel::new(&map, &model, 3.0, Some(true)).unwrap();
        assert_eq!(bx.gridding_first(), [-2, -2, -2]);
        assert!(bx.warning_message().is_none());
        assert_eq!(bx.map_manager().map_data()[[0, 0, 0]], map.map_data()[[38, 38, 38]]);
    }

    #[test]
    fn test_wrapped_box_larger_than_cell_is_rejected() {
        let map = full_map();
        let model = model_at(&[[20.0, 20.0, 20.0]]);

        let err = AroundModel::new(&map, &model, 1e20, Some(true)).unwrap_err();
        assert!(matches!(err, MapModelError::Configuration(_)));
        let err = AroundModel::new(&map, &model, 25.0, Some(true)).unwrap_err();
        assert!(matches!(err, MapModelError::Configuration(_)));
        let err = AroundModel::new(&map, &model, f64::INFINITY, Some(true)).unwrap_err();
        assert!(matches!(err, MapModelError::InvalidArgument(_)));

        // 不 wrapping 时同样的缓冲层只会被截断到整张 map
        let bx = AroundModel::new(&map, &model, 1e20, Some(false)).unwrap();
        assert_eq!(bx.map_manager().all(), [40, 40, 40]);
        assert_eq!(bx.warning_message(), Some(CLIPPED_BOX_WARNING));
    }

    #[test]
    fn test_apply_to_other_map() {
        let map = full_map();
        let other = map
            .customized_copy(map.map_data().mapv(|v| -v))
            .unwrap();
        let model = model_at(&[[10.0, 12.0, 14.0]]);
        let bx = AroundModel::new(&map, &model, 2.0, None).unwrap();
        let boxed_other = bx.apply_to_map(&other).unwrap();
        assert!(boxed_other.is_similar(bx.map_manager()));
        assert_eq!(boxed_other.map_data()[[1, 1, 1]], -bx.map_manager().map_data()[[1, 1, 1]]);
    }

    #[test]
    fn test_shift_and_box_model() {
        let model = model_at(&[[-5.0, 2.0, 10.0], [5.0, 4.0, 12.0]]);
        let boxed = shift_and_box_model(&model, 5.0).unwrap();
        let cell = boxed.crystal_symmetry().unwrap().unit_cell.lengths();
        assert!(approx_equal(cell, [20.0, 12.0, 12.0], 1e-12));
        assert!(approx_equal(boxed.atoms()[0].xyz, [5.0, 5.0, 5.0], 1e-12));
        let shift = boxed.shift_cart().unwrap();
        assert!(approx_equal(shift.shift_cart, [10.0, 3.0, -5.0], 1e-12));
        assert!(shift_and_box_model(&model_at(&[[0.0; 3]]), 0.0).is_err());
    }
}
