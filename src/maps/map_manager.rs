//! # MapManager：单张密度图的外观层
//!
//! 持有一个三维标量格点、它的两个坐标框架（完整晶胞 / 当前盒子）、
//! 原点平移记录、wrapping 标志、mask 标记以及可选的 NCS 对象。
//!
//! ## 坐标约定
//! - 数组元素 `[i, j, k]` 对应网格索引 `origin + (i, j, k)`
//! - 网格索引 `g` 的笛卡尔位置为 `orthogonalize(g / unit_cell_grid)`
//! - `origin_shift_grid_units` 为当前索引 0 在原始网格中的位置偏移，
//!   `shift_cart = grid_units_to_cart(-origin_shift_grid_units)`
//!
//! ## 依赖关系
//! - 被 `maps/boxing.rs`, `maps/mask.rs`, `manager/` 使用
//! - 使用 `maps/grid.rs`, `models/`

use crate::error::{MapModelError, Result};
use crate::maps::grid::{extract_block, GridAccessor};
use crate::models::symmetry::{approx_equal, CrystalSymmetry, Vec3};
use crate::models::{Model, NcsObject, ShiftTracker, SHIFT_TOLERANCE};

use ndarray::Array3;
use std::fmt;
use tracing::{debug, warn};

/// 非完整晶胞 map 上强制 wrapping 时的警告
pub const WRAPPING_WARNING: &str = "WARNING: wrapping set to True, but map is not full size";

/// 原点平移信息（网格单位）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftInfo {
    /// 平移前的 origin_shift_grid_units
    pub current_origin_shift_grid_units: [i64; 3],
    /// 要施加到坐标上的网格平移 (desired - origin)
    pub shift_to_apply: [i64; 3],
    /// 平移后的 origin_shift_grid_units
    pub new_origin_shift_grid_units: [i64; 3],
}

/// 单张密度图
#[derive(Debug, Clone)]
pub struct MapManager {
    data: Array3<f64>,
    origin: [i64; 3],
    unit_cell_grid: [usize; 3],
    unit_cell_crystal_symmetry: CrystalSymmetry,
    origin_shift_grid_units: [i64; 3],
    wrapping: bool,
    is_mask: bool,
    ncs_object: Option<NcsObject>,
    warning_message: Option<String>,
}

impl MapManager {
    /// 创建 map
    ///
    /// `unit_cell_grid` 为完整晶胞的网格数，`unit_cell_crystal_symmetry` 为完整晶胞对称性。
    pub fn new(
        data: Array3<f64>,
        origin: [i64; 3],
        unit_cell_grid: [usize; 3],
        unit_cell_crystal_symmetry: CrystalSymmetry,
    ) -> Result<Self> {
        let (nx, ny, nz) = data.dim();
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(MapModelError::InvalidArgument(format!(
                "map data has an empty dimension: ({}, {}, {})",
                nx, ny, nz
            )));
        }
        if unit_cell_grid.iter().any(|&n| n == 0) {
            return Err(MapModelError::InvalidArgument(format!(
                "unit cell gridding must be positive: {:?}",
                unit_cell_grid
            )));
        }
        if unit_cell_crystal_symmetry.unit_cell.volume() <= 0.0 {
            return Err(MapModelError::InvalidArgument(format!(
                "degenerate unit cell {}",
                unit_cell_crystal_symmetry.unit_cell
            )));
        }

        Ok(MapManager {
            data,
            origin,
            unit_cell_grid,
            unit_cell_crystal_symmetry,
            origin_shift_grid_units: [0; 3],
            wrapping: false,
            is_mask: false,
            ncs_object: None,
            warning_message: None,
        })
    }

    /// 覆盖完整晶胞、原点为零的 map
    pub fn full_cell(data: Array3<f64>, unit_cell_crystal_symmetry: CrystalSymmetry) -> Result<Self> {
        let (nx, ny, nz) = data.dim();
        Self::new(data, [0; 3], [nx, ny, nz], unit_cell_crystal_symmetry)
    }

    pub fn with_wrapping(mut self, wrapping: bool) -> Self {
        self.set_wrapping(wrapping);
        self
    }

    pub fn as_mask(mut self) -> Self {
        self.is_mask = true;
        self
    }

    // ─────────────────────────────────────────────────────────────
    // 数据
    // ─────────────────────────────────────────────────────────────

    pub fn map_data(&self) -> &Array3<f64> {
        &self.data
    }

    /// 替换格点数据，形状必须不变
    pub fn set_map_data(&mut self, data: Array3<f64>) -> Result<()> {
        if data.dim() != self.data.dim() {
            return Err(MapModelError::InvalidArgument(format!(
                "new map data shape {:?} differs from existing {:?}",
                data.dim(),
                self.data.dim()
            )));
        }
        self.data = data;
        Ok(())
    }

    /// 所有格点设为同一值
    pub fn initialize_map_data(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// 相同元数据、不同数据的副本
    pub fn customized_copy(&self, data: Array3<f64>) -> Result<MapManager> {
        if data.dim() != self.data.dim() {
            return Err(MapModelError::InvalidArgument(format!(
                "customized copy shape {:?} differs from existing {:?}",
                data.dim(),
                self.data.dim()
            )));
        }
        Ok(self.with_metadata_of_self(data))
    }

    fn with_metadata_of_self(&self, data: Array3<f64>) -> MapManager {
        MapManager {
            data,
            origin: self.origin,
            unit_cell_grid: self.unit_cell_grid,
            unit_cell_crystal_symmetry: self.unit_cell_crystal_symmetry.clone(),
            origin_shift_grid_units: self.origin_shift_grid_units,
            wrapping: self.wrapping,
            is_mask: self.is_mask,
            ncs_object: self.ncs_object.clone(),
            warning_message: None,
        }
    }

    /// 截取网格闭区间 `[first, last]` 为新 map，原点为 `first`
    ///
    /// `wrapping` 为 true 时越界部分周期折回，否则填 0。新 map 不再 wrapping。
    pub fn extract_box(&self, first: [i64; 3], last: [i64; 3], wrapping: bool) -> MapManager {
        let period = if wrapping {
            Some(self.unit_cell_grid)
        } else {
            None
        };
        let data = extract_block(&self.data, &self.accessor(), first, last, period);
        let mut boxed = self.with_metadata_of_self(data);
        boxed.origin = first;
        boxed.wrapping = false;
        boxed
    }

    // ─────────────────────────────────────────────────────────────
    // 网格
    // ─────────────────────────────────────────────────────────────

    pub fn accessor(&self) -> GridAccessor {
        let (nx, ny, nz) = self.data.dim();
        GridAccessor::new(self.origin, [nx, ny, nz])
    }

    pub fn origin(&self) -> [i64; 3] {
        self.origin
    }

    pub fn all(&self) -> [usize; 3] {
        self.accessor().all
    }

    pub fn origin_is_zero(&self) -> bool {
        self.origin == [0, 0, 0]
    }

    pub fn unit_cell_grid(&self) -> [usize; 3] {
        self.unit_cell_grid
    }

    /// map 是否覆盖一个完整晶胞
    pub fn is_full_size(&self) -> bool {
        self.all() == self.unit_cell_grid
    }

    /// 各轴格点间距（Å）
    pub fn pixel_sizes(&self) -> Vec3 {
        let lengths = self.unit_cell_crystal_symmetry.unit_cell.lengths();
        [
            lengths[0] / self.unit_cell_grid[0] as f64,
            lengths[1] / self.unit_cell_grid[1] as f64,
            lengths[2] / self.unit_cell_grid[2] as f64,
        ]
    }

    /// 网格单位转笛卡尔坐标
    pub fn grid_units_to_cart(&self, grid_units: [f64; 3]) -> Vec3 {
        let n = self.unit_cell_grid;
        self.unit_cell_crystal_symmetry.unit_cell.orthogonalize([
            grid_units[0] / n[0] as f64,
            grid_units[1] / n[1] as f64,
            grid_units[2] / n[2] as f64,
        ])
    }

    /// 笛卡尔坐标转（连续的）网格单位
    pub fn cart_to_grid_units(&self, site: Vec3) -> [f64; 3] {
        let n = self.unit_cell_grid;
        let frac = self.unit_cell_crystal_symmetry.unit_cell.fractionalize(site);
        [
            frac[0] * n[0] as f64,
            frac[1] * n[1] as f64,
            frac[2] * n[2] as f64,
        ]
    }

    /// 数组下标对应的笛卡尔位置
    pub fn site_of_local_index(&self, local: [usize; 3]) -> Vec3 {
        self.grid_units_to_cart([
            (self.origin[0] + local[0] as i64) as f64,
            (self.origin[1] + local[1] as i64) as f64,
            (self.origin[2] + local[2] as i64) as f64,
        ])
    }

    // ─────────────────────────────────────────────────────────────
    // 对称性
    // ─────────────────────────────────────────────────────────────

    /// 完整晶胞对称性
    pub fn unit_cell_crystal_symmetry(&self) -> &CrystalSymmetry {
        &self.unit_cell_crystal_symmetry
    }

    /// 当前持有部分的对称性：完整晶胞时与完整对称性相同，否则为盒子的 P1 晶胞
    pub fn crystal_symmetry(&self) -> CrystalSymmetry {
        if self.is_full_size() {
            return self.unit_cell_crystal_symmetry.clone();
        }
        let all = self.all();
        let n = self.unit_cell_grid;
        let cell = self.unit_cell_crystal_symmetry.unit_cell.scaled([
            all[0] as f64 / n[0] as f64,
            all[1] as f64 / n[1] as f64,
            all[2] as f64 / n[2] as f64,
        ]);
        CrystalSymmetry::p1(cell)
    }

    // ─────────────────────────────────────────────────────────────
    // wrapping / mask / 警告
    // ─────────────────────────────────────────────────────────────

    pub fn wrapping(&self) -> bool {
        self.wrapping
    }

    /// 设置 wrapping；非完整晶胞上设为 true 只记录警告，不报错
    pub fn set_wrapping(&mut self, wrapping: bool) {
        self.wrapping = wrapping;
        if wrapping && !self.is_full_size() {
            warn!(all = ?self.all(), unit_cell_grid = ?self.unit_cell_grid, "{}", WRAPPING_WARNING);
            self.warning_message = Some(WRAPPING_WARNING.to_string());
        }
    }

    pub fn is_mask(&self) -> bool {
        self.is_mask
    }

    pub fn set_is_mask(&mut self, is_mask: bool) {
        self.is_mask = is_mask;
    }

    pub fn warning_message(&self) -> Option<&str> {
        self.warning_message.as_deref()
    }

    // ─────────────────────────────────────────────────────────────
    // 平移
    // ─────────────────────────────────────────────────────────────

    pub fn origin_shift_grid_units(&self) -> [i64; 3] {
        self.origin_shift_grid_units
    }

    /// 自原始框架以来的累计笛卡尔平移
    pub fn shift_cart(&self) -> ShiftTracker {
        ShiftTracker::from_grid_units(self.origin_shift_grid_units, |g| self.grid_units_to_cart(g))
    }

    /// 计算把原点移到 `desired_origin` 所需的平移
    pub fn shift_info(&self, desired_origin: [i64; 3]) -> ShiftInfo {
        let current = self.origin_shift_grid_units;
        let mut shift_to_apply = [0i64; 3];
        let mut new_shift = [0i64; 3];
        for i in 0..3 {
            shift_to_apply[i] = desired_origin[i] - self.origin[i];
            new_shift[i] = current[i] + self.origin[i] - desired_origin[i];
        }
        ShiftInfo {
            current_origin_shift_grid_units: current,
            shift_to_apply,
            new_origin_shift_grid_units: new_shift,
        }
    }

    /// 就地把原点移到 `desired_origin`，同时平移所附 NCS
    pub fn shift_origin(&mut self, desired_origin: [i64; 3]) {
        let info = self.shift_info(desired_origin);
        let g = info.shift_to_apply;
        let shift_to_apply_cart = self.grid_units_to_cart([g[0] as f64, g[1] as f64, g[2] as f64]);

        self.origin = desired_origin;
        self.origin_shift_grid_units = info.new_origin_shift_grid_units;
        if let Some(ncs) = self.ncs_object.take() {
            self.ncs_object = Some(ncs.coordinate_offset(shift_to_apply_cart));
        }
        debug!(
            origin = ?desired_origin,
            origin_shift_grid_units = ?self.origin_shift_grid_units,
            "map origin shifted"
        );
    }

    /// 重新定义当前原点在原始 map 中的位置和/或完整晶胞网格
    ///
    /// 改变网格时按比例缩放晶胞，保持格点间距不变。
    pub fn set_original_origin_and_gridding(
        &mut self,
        original_origin: Option<[i64; 3]>,
        gridding: Option<[usize; 3]>,
    ) -> Result<()> {
        if let Some(g) = gridding {
            if g.iter().any(|&n| n == 0) {
                return Err(MapModelError::InvalidArgument(format!(
                    "gridding must be positive: {:?}",
                    g
                )));
            }
            let n = self.unit_cell_grid;
            let cell = self.unit_cell_crystal_symmetry.unit_cell.scaled([
                g[0] as f64 / n[0] as f64,
                g[1] as f64 / n[1] as f64,
                g[2] as f64 / n[2] as f64,
            ]);
            self.unit_cell_crystal_symmetry = CrystalSymmetry::new(
                cell,
                self.unit_cell_crystal_symmetry.space_group.clone(),
            );
            self.unit_cell_grid = g;
        }
        if let Some(o) = original_origin {
            self.origin_shift_grid_units = [
                o[0] - self.origin[0],
                o[1] - self.origin[1],
                o[2] - self.origin[2],
            ];
        }
        let shift = self.shift_cart();
        if let Some(ncs) = self.ncs_object.as_mut() {
            ncs.set_shift_cart(shift);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // NCS
    // ─────────────────────────────────────────────────────────────

    pub fn ncs_object(&self) -> Option<&NcsObject> {
        self.ncs_object.as_ref()
    }

    /// 附加 NCS 对象
    ///
    /// 无平移记录的 NCS 视为位于原始框架，会先平移到当前工作框架；
    /// 已有平移记录的必须与本 map 一致。
    pub fn set_ncs_object(&mut self, ncs: NcsObject) -> Result<()> {
        let map_shift = self.shift_cart();
        let ncs = match ncs.shift_cart() {
            None => ncs.coordinate_offset(map_shift.shift_cart),
            Some(shift) if shift.approx_eq(&map_shift, SHIFT_TOLERANCE) => ncs,
            Some(shift) => {
                return Err(MapModelError::incompatible(
                    "map and NCS object",
                    format!(
                        "NCS shift_cart {} does not match map shift_cart {}",
                        shift, map_shift
                    ),
                ))
            }
        };
        self.ncs_object = Some(ncs);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 一致性检查
    // ─────────────────────────────────────────────────────────────

    /// 与另一张 map 不一致之处；一致时返回 None
    pub fn similarity_mismatch(&self, other: &MapManager) -> Option<String> {
        if self.origin != other.origin {
            return Some(format!(
                "origin {:?} differs from {:?}",
                self.origin, other.origin
            ));
        }
        if self.all() != other.all() {
            return Some(format!(
                "gridding {:?} differs from {:?}",
                self.all(),
                other.all()
            ));
        }
        if self.unit_cell_grid != other.unit_cell_grid {
            return Some(format!(
                "unit cell gridding {:?} differs from {:?}",
                self.unit_cell_grid, other.unit_cell_grid
            ));
        }
        if !self
            .unit_cell_crystal_symmetry
            .is_similar_symmetry(&other.unit_cell_crystal_symmetry)
        {
            return Some(format!(
                "unit_cell_crystal_symmetry {} differs from {}",
                self.unit_cell_crystal_symmetry, other.unit_cell_crystal_symmetry
            ));
        }
        if !self.crystal_symmetry().is_similar_symmetry(&other.crystal_symmetry()) {
            return Some(format!(
                "crystal_symmetry {} differs from {}",
                self.crystal_symmetry(),
                other.crystal_symmetry()
            ));
        }
        if self.origin_shift_grid_units != other.origin_shift_grid_units {
            return Some(format!(
                "origin_shift_grid_units {:?} differs from {:?}",
                self.origin_shift_grid_units, other.origin_shift_grid_units
            ));
        }
        None
    }

    /// 网格与对称性是否一致
    pub fn is_similar(&self, other: &MapManager) -> bool {
        self.similarity_mismatch(other).is_none()
    }

    /// 与 model 不兼容之处；兼容时返回 None
    pub fn model_mismatch(
        &self,
        model: &Model,
        require_match_unit_cell_crystal_symmetry: bool,
    ) -> Option<String> {
        match model.unit_cell_crystal_symmetry() {
            Some(model_uc) => {
                if !model_uc.is_similar_symmetry(&self.unit_cell_crystal_symmetry) {
                    return Some(format!(
                        "model unit_cell_crystal_symmetry {} differs from map unit_cell_crystal_symmetry {}",
                        model_uc, self.unit_cell_crystal_symmetry
                    ));
                }
            }
            None if require_match_unit_cell_crystal_symmetry => {
                return Some("model has no unit_cell_crystal_symmetry".to_string());
            }
            None => {}
        }

        if let Some(model_cs) = model.crystal_symmetry() {
            let map_cs = self.crystal_symmetry();
            if !model_cs.is_similar_symmetry(&map_cs)
                && !model_cs.is_similar_symmetry(&self.unit_cell_crystal_symmetry)
            {
                return Some(format!(
                    "model crystal_symmetry {} matches neither map crystal_symmetry {} nor unit_cell_crystal_symmetry {}",
                    model_cs, map_cs, self.unit_cell_crystal_symmetry
                ));
            }
        }

        if let Some(model_shift) = model.shift_cart() {
            let map_shift = self.shift_cart();
            if !approx_equal(model_shift.shift_cart, map_shift.shift_cart, SHIFT_TOLERANCE) {
                return Some(format!(
                    "model shift_cart {} differs from map shift_cart {}",
                    model_shift, map_shift
                ));
            }
        }
        None
    }

    pub fn is_compatible_model(
        &self,
        model: &Model,
        require_match_unit_cell_crystal_symmetry: bool,
    ) -> bool {
        self.model_mismatch(model, require_match_unit_cell_crystal_symmetry)
            .is_none()
    }

    /// 用本 map 的对称性和平移覆盖 model 的记录（不移动坐标）
    pub fn set_model_symmetries_and_shift_cart_to_match_map(&self, model: &mut Model) {
        model.set_unit_cell_crystal_symmetry(self.unit_cell_crystal_symmetry.clone());
        model.set_crystal_symmetry(self.crystal_symmetry());
        model.set_shift_cart(self.shift_cart());
    }
}

impl fmt::Display for MapManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let acc = self.accessor();
        write!(
            f,
            "MapManager: origin {:?}, all {:?}, unit cell grid {:?}, shift_cart {}, wrapping {}",
            acc.origin,
            acc.all,
            self.unit_cell_grid,
            self.shift_cart(),
            self.wrapping
        )?;
        if self.is_mask {
            write!(f, ", mask")?;
        }
        Ok(())
    }
}
